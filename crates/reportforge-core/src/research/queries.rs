//! Query expansion for a research topic.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::{ChatMessage, TextCompletion};

/// Hard cap on the number of search queries per topic.
pub const MAX_QUERIES: usize = 7;

const QUERY_PROMPT: &str = "You are an expert researcher. Generate 5-7 diverse search queries \
that will comprehensively research the given topic.\n\n\
Include queries that cover:\n\
1. Basic definitions and overview\n\
2. Recent developments and trends\n\
3. Key statistics and data\n\
4. Expert opinions and analysis\n\
5. Practical applications or implications\n\
6. Comparative analysis\n\
7. Future outlook\n\n\
Return only the queries, one per line, without numbering.";

/// Expands a single topic into a bounded, diversified set of search queries.
pub struct QueryPlanner {
    llm: Arc<dyn TextCompletion>,
}

impl QueryPlanner {
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        Self { llm }
    }

    /// Produce 1..=7 queries, always containing the raw topic.
    ///
    /// Expansion failure is never surfaced; the minimal viable query set is
    /// the topic alone.
    pub async fn plan(&self, topic: &str) -> Vec<String> {
        let messages = [
            ChatMessage::system(QUERY_PROMPT),
            ChatMessage::user(format!(
                "Generate comprehensive search queries for researching: {topic}"
            )),
        ];

        match self.llm.complete(&messages).await {
            Ok(response) => {
                let queries = assemble_query_set(topic, &response);
                debug!(count = queries.len(), "query expansion complete");
                queries
            }
            Err(err) => {
                warn!(error = %err, "query expansion failed, falling back to topic only");
                vec![topic.to_string()]
            }
        }
    }
}

/// Split an expansion response into queries, insert the topic if missing,
/// drop exact duplicates, and cap at [`MAX_QUERIES`].
fn assemble_query_set(topic: &str, response: &str) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !queries.iter().any(|existing| existing == line) {
            queries.push(line.to_string());
        }
    }

    if !queries.iter().any(|existing| existing == topic) {
        queries.insert(0, topic.to_string());
    }

    queries.truncate(MAX_QUERIES);
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserts_topic_at_front_when_missing() {
        let queries = assemble_query_set("rust async", "query one\nquery two");
        assert_eq!(queries[0], "rust async");
        assert_eq!(queries.len(), 3);
    }

    #[test]
    fn keeps_topic_position_when_present() {
        let queries = assemble_query_set("rust async", "query one\nrust async\nquery two");
        assert_eq!(queries, vec!["query one", "rust async", "query two"]);
    }

    #[test]
    fn caps_at_seven_preserving_first_appearance() {
        let response = (1..=9)
            .map(|i| format!("query {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let queries = assemble_query_set("query 1", &response);
        assert_eq!(queries.len(), MAX_QUERIES);
        assert_eq!(queries[0], "query 1");
        assert_eq!(queries[6], "query 7");
    }

    #[test]
    fn drops_blank_lines_and_duplicates() {
        let queries = assemble_query_set("t", "a\n\n  \na\nb");
        assert_eq!(queries, vec!["t", "a", "b"]);
    }

    #[test]
    fn unusable_response_degrades_to_topic() {
        let queries = assemble_query_set("t", "\n  \n");
        assert_eq!(queries, vec!["t"]);
    }
}
