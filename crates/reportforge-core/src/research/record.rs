//! Result records shared by every search backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of the search backend a record came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Web,
    Arxiv,
    Wikipedia,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Web => "web",
            SourceId::Arxiv => "arxiv",
            SourceId::Wikipedia => "wikipedia",
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hit from one source.
///
/// The `url` doubles as the dedup identity; adapters may leave it empty when
/// the backend has no canonical link, in which case the record is never
/// deduplicated against anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: SourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl ResultRecord {
    pub fn new(
        source: SourceId,
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            source,
            relevance_score: None,
        }
    }
}

/// Final output of the research core, consumed read-only by the downstream
/// planning, visualization, and generation stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchAggregate {
    pub topic: String,
    pub queries: Vec<String>,
    pub results: Vec<ResultRecord>,
    pub source_counts: BTreeMap<SourceId, usize>,
    pub synthesis: String,
}

impl ResearchAggregate {
    pub fn source_count(&self) -> usize {
        self.results.len()
    }
}

/// Count ranked results per source.
pub fn count_sources(records: &[ResultRecord]) -> BTreeMap<SourceId, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.source).or_insert(0) += 1;
    }
    counts
}
