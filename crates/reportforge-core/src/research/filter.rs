//! Dedup and relevance ranking over merged search results.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::{ChatMessage, TextCompletion};
use crate::research::record::ResultRecord;

/// Ranking is only worth an LLM round trip above this many candidates.
pub const RANK_THRESHOLD: usize = 10;

/// Snippet characters included per candidate in the ranking prompt.
const RANK_SNIPPET_LIMIT: usize = 200;

const RANK_PROMPT: &str = "You are evaluating search results for relevance to a research topic.\n\n\
Rate each result on a scale of 1-10 for relevance, considering:\n\
- How directly related the content is to the topic\n\
- Quality and credibility of the source\n\
- Uniqueness of information provided\n\n\
Return only a list of numbers (the rankings) separated by commas, in the same order as the results.";

/// Collapse records sharing a non-empty URL, keeping first occurrences.
///
/// Records with an empty URL are never deduplicated against each other; each
/// one is always kept.
pub fn dedupe(records: Vec<ResultRecord>) -> Vec<ResultRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| record.url.is_empty() || seen.insert(record.url.clone()))
        .collect()
}

/// Orders records by estimated relevance via an external scoring call,
/// falling back to the input order when anything about the response is off.
pub struct RelevanceRanker {
    llm: Arc<dyn TextCompletion>,
}

impl RelevanceRanker {
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        Self { llm }
    }

    /// Rank `records` against `topic`, attaching scores and sorting
    /// descending. Ties keep their original relative order (stable sort).
    ///
    /// Any scoring failure — call error, unparsable numbers, or a count that
    /// does not match the input — returns the records unchanged.
    pub async fn rank(&self, records: Vec<ResultRecord>, topic: &str) -> Vec<ResultRecord> {
        let summary = candidate_summary(&records);
        let messages = [
            ChatMessage::system(RANK_PROMPT),
            ChatMessage::user(format!(
                "Topic: {topic}\n\nResults to rank:\n{summary}\n\nProvide relevance scores (1-10) for each result:"
            )),
        ];

        let response = match self.llm.complete(&messages).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "relevance scoring failed, keeping original order");
                return records;
            }
        };

        match parse_scores(&response, records.len()) {
            Some(scores) => {
                debug!(count = scores.len(), "relevance scores applied");
                apply_scores(records, &scores)
            }
            None => {
                warn!("relevance scores unusable, keeping original order");
                records
            }
        }
    }
}

fn candidate_summary(records: &[ResultRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let snippet: String = record.snippet.chars().take(RANK_SNIPPET_LIMIT).collect();
            format!(
                "Result {}:\nTitle: {}\nSnippet: {}",
                index + 1,
                record.title,
                snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Parse a comma-separated score list; `None` unless every entry parses and
/// the count matches `expected` exactly. Scores are treated as ordinal, so no
/// range validation is applied.
fn parse_scores(response: &str, expected: usize) -> Option<Vec<f64>> {
    let parsed: Result<Vec<f64>, _> = response
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<f64>)
        .collect();

    match parsed {
        Ok(scores) if scores.len() == expected => Some(scores),
        _ => None,
    }
}

fn apply_scores(records: Vec<ResultRecord>, scores: &[f64]) -> Vec<ResultRecord> {
    let mut scored: Vec<ResultRecord> = records
        .into_iter()
        .zip(scores)
        .map(|(mut record, score)| {
            record.relevance_score = Some(*score);
            record
        })
        .collect();

    scored.sort_by(|a, b| {
        let left = b.relevance_score.unwrap_or(f64::MIN);
        let right = a.relevance_score.unwrap_or(f64::MIN);
        left.partial_cmp(&right).unwrap_or(Ordering::Equal)
    });

    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReportError;
    use crate::research::record::SourceId;
    use async_trait::async_trait;

    fn record(title: &str, url: &str) -> ResultRecord {
        ResultRecord::new(SourceId::Web, title, url, "snippet")
    }

    struct FixedCompletion(Result<String, ()>);

    #[async_trait]
    impl TextCompletion for FixedCompletion {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ReportError> {
            self.0
                .clone()
                .map_err(|_| ReportError::ExternalCall("down".into()))
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let records = vec![
            record("first", "https://a"),
            record("second", "https://b"),
            record("dup", "https://a"),
        ];
        let deduped = dedupe(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
        assert_eq!(deduped[1].title, "second");
    }

    #[test]
    fn dedupe_never_removes_empty_urls() {
        let records = vec![record("a", ""), record("b", ""), record("c", "")];
        assert_eq!(dedupe(records).len(), 3);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let records = vec![
            record("a", "https://a"),
            record("b", ""),
            record("c", "https://a"),
            record("d", ""),
        ];
        let once = dedupe(records);
        let titles: Vec<_> = once.iter().map(|r| r.title.clone()).collect();
        let twice = dedupe(once.clone());
        let titles_twice: Vec<_> = twice.iter().map(|r| r.title.clone()).collect();
        assert_eq!(titles, titles_twice);
    }

    #[test]
    fn parse_scores_rejects_count_mismatch() {
        assert!(parse_scores("1, 2, 3", 4).is_none());
        assert!(parse_scores("1, 2, 3, 4, 5", 4).is_none());
        assert_eq!(parse_scores("1, 2, 3, 4", 4).unwrap().len(), 4);
    }

    #[test]
    fn parse_scores_rejects_garbage() {
        assert!(parse_scores("high, medium, low", 3).is_none());
        assert!(parse_scores("", 0).is_some());
    }

    #[test]
    fn parse_scores_accepts_out_of_range_floats() {
        let scores = parse_scores("-3.5, 42, 0.1", 3).unwrap();
        assert_eq!(scores, vec![-3.5, 42.0, 0.1]);
    }

    #[tokio::test]
    async fn rank_sorts_descending_by_score() {
        let ranker = RelevanceRanker::new(Arc::new(FixedCompletion(Ok("2, 9, 5".into()))));
        let records = vec![
            record("low", "https://a"),
            record("high", "https://b"),
            record("mid", "https://c"),
        ];

        let ranked = ranker.rank(records, "topic").await;
        let titles: Vec<_> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["high", "mid", "low"]);
        assert_eq!(ranked[0].relevance_score, Some(9.0));
    }

    #[tokio::test]
    async fn rank_ties_keep_original_relative_order() {
        let ranker = RelevanceRanker::new(Arc::new(FixedCompletion(Ok("5, 5, 7".into()))));
        let records = vec![
            record("first-five", "https://a"),
            record("second-five", "https://b"),
            record("seven", "https://c"),
        ];

        let ranked = ranker.rank(records, "topic").await;
        let titles: Vec<_> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["seven", "first-five", "second-five"]);
    }

    #[tokio::test]
    async fn rank_mismatched_count_returns_input_unchanged() {
        let ranker = RelevanceRanker::new(Arc::new(FixedCompletion(Ok("1, 2".into()))));
        let records = vec![
            record("a", "https://a"),
            record("b", "https://b"),
            record("c", "https://c"),
        ];

        let ranked = ranker.rank(records, "topic").await;
        let titles: Vec<_> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert!(ranked.iter().all(|r| r.relevance_score.is_none()));
    }

    #[tokio::test]
    async fn rank_call_failure_returns_input_unchanged() {
        let ranker = RelevanceRanker::new(Arc::new(FixedCompletion(Err(()))));
        let records = vec![record("a", "https://a"), record("b", "https://b")];

        let ranked = ranker.rank(records, "topic").await;
        let titles: Vec<_> = ranked.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }
}
