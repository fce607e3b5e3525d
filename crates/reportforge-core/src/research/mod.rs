//! Research aggregation core: query planning, bounded fan-out, dedup,
//! relevance ranking, and synthesis.

mod filter;
mod queries;
mod record;
mod scheduler;
mod sources;

use std::sync::Arc;

use tracing::{info, instrument};

use crate::ReportError;
use crate::config::ResearchConfig;
use crate::llm::{ChatMessage, TextCompletion};

pub use filter::{RANK_THRESHOLD, RelevanceRanker, dedupe};
pub use queries::{MAX_QUERIES, QueryPlanner};
pub use record::{ResearchAggregate, ResultRecord, SourceId, count_sources};
pub use scheduler::fan_out;
pub use sources::{
    ArxivSource, SourceAdapter, WEB_API_KEY_ENV, WEB_ENGINE_ID_ENV, WebSearchCredentials,
    WebSearchSource, WikipediaSource, active_sources,
};

/// Ranked results fed into the synthesis prompt are capped at this many.
const SYNTHESIS_RESULT_LIMIT: usize = 15;

const SYNTHESIS_PROMPT: &str = "You are a research analyst synthesizing information from multiple sources.\n\n\
Create a comprehensive but concise synthesis that:\n\
1. Identifies the main themes and findings\n\
2. Notes areas of consensus and disagreement\n\
3. Highlights the most important insights\n\
4. Identifies gaps where more research might be needed\n\
5. Maintains objectivity and cites the general types of sources used\n\n\
Keep the synthesis focused and well-structured.";

/// Drives one research run end to end and assembles the aggregate.
pub struct ResearchEngine {
    llm: Arc<dyn TextCompletion>,
    sources: Vec<Arc<dyn SourceAdapter>>,
    settings: ResearchConfig,
}

impl ResearchEngine {
    pub fn new(
        llm: Arc<dyn TextCompletion>,
        sources: Vec<Arc<dyn SourceAdapter>>,
        settings: ResearchConfig,
    ) -> Self {
        Self {
            llm,
            sources,
            settings,
        }
    }

    /// Research a topic: plan queries, fan out across sources, dedupe, rank
    /// when the candidate pool is large enough, and synthesize.
    ///
    /// Everything up to synthesis degrades gracefully; a synthesis failure is
    /// the one fatal path, since the aggregate is useless without it.
    #[instrument(name = "research.run", skip(self))]
    pub async fn run(&self, topic: &str) -> Result<ResearchAggregate, ReportError> {
        let queries = QueryPlanner::new(Arc::clone(&self.llm)).plan(topic).await;

        let merged = fan_out(
            &queries,
            &self.sources,
            self.settings.concurrent_requests,
            self.settings.max_results_per_source,
        )
        .await;

        let deduped = dedupe(merged);

        let mut results = if deduped.len() > RANK_THRESHOLD {
            RelevanceRanker::new(Arc::clone(&self.llm))
                .rank(deduped, topic)
                .await
        } else {
            deduped
        };
        results.truncate(self.settings.max_sources_per_query);

        let source_counts = count_sources(&results);
        let synthesis = self.synthesize(topic, &results).await?;

        info!(
            query_count = queries.len(),
            result_count = results.len(),
            "research aggregate assembled"
        );

        Ok(ResearchAggregate {
            topic: topic.to_string(),
            queries,
            results,
            source_counts,
            synthesis,
        })
    }

    async fn synthesize(
        &self,
        topic: &str,
        results: &[ResultRecord],
    ) -> Result<String, ReportError> {
        let research_content = results
            .iter()
            .take(SYNTHESIS_RESULT_LIMIT)
            .map(|record| {
                format!(
                    "Source: {}\nTitle: {}\nContent: {}",
                    record.source, record.title, record.snippet
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let messages = [
            ChatMessage::system(SYNTHESIS_PROMPT),
            ChatMessage::user(format!(
                "Synthesize this research on '{topic}':\n\n{research_content}"
            )),
        ];

        self.llm
            .complete(&messages)
            .await
            .map_err(|err| ReportError::Synthesis(err.to_string()))
    }
}
