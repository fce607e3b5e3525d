//! Search backends normalized behind one adapter trait.
//!
//! Adapters never propagate errors: network or parse failures degrade to an
//! empty result list so one flaky backend cannot poison a research run.

mod arxiv;
mod web;
mod wikipedia;

use std::sync::Arc;

use async_trait::async_trait;

use crate::research::record::{ResultRecord, SourceId};
use crate::security::optional_env;

pub use arxiv::ArxivSource;
pub use web::{WebSearchCredentials, WebSearchSource};
pub use wikipedia::WikipediaSource;

/// Uniform search capability over heterogeneous backends.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> SourceId;

    /// Search the backend. Must not fail: adapters swallow their own errors
    /// and return an empty list instead.
    async fn search(&self, query: &str, max_results: usize) -> Vec<ResultRecord>;
}

/// Environment variables holding the web search credentials.
pub const WEB_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const WEB_ENGINE_ID_ENV: &str = "GOOGLE_CSE_ID";

/// Build the active adapter list for one pipeline run.
///
/// The web adapter is only included when both credentials are present in the
/// environment; its absence is not an error. The arXiv and Wikipedia
/// adapters are always available.
pub fn active_sources(http: &reqwest::Client) -> Vec<Arc<dyn SourceAdapter>> {
    let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if let Some(credentials) = web_credentials_from_env() {
        sources.push(Arc::new(WebSearchSource::new(http.clone(), credentials)));
    }

    sources.push(Arc::new(ArxivSource::new(http.clone())));
    sources.push(Arc::new(WikipediaSource::new(http.clone())));

    sources
}

fn web_credentials_from_env() -> Option<WebSearchCredentials> {
    let api_key = optional_env(WEB_API_KEY_ENV)?;
    let engine_id = optional_env(WEB_ENGINE_ID_ENV)?;
    Some(WebSearchCredentials { api_key, engine_id })
}
