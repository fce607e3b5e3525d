//! Google Custom Search adapter.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::ReportError;
use crate::research::record::{ResultRecord, SourceId};
use crate::security::SecretValue;

use super::SourceAdapter;

const SEARCH_URL: &str = "https://customsearch.googleapis.com/customsearch/v1";

/// Credentials for the Custom Search API, resolved from the environment and
/// injected at construction time.
pub struct WebSearchCredentials {
    pub api_key: SecretValue,
    pub engine_id: SecretValue,
}

pub struct WebSearchSource {
    client: reqwest::Client,
    credentials: WebSearchCredentials,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl WebSearchSource {
    pub fn new(client: reqwest::Client, credentials: WebSearchCredentials) -> Self {
        Self {
            client,
            credentials,
            base_url: SEARCH_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<ResultRecord>, ReportError> {
        // The API rejects num above 10.
        let count = max_results.min(10).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.credentials.api_key.expose()),
                ("cx", self.credentials.engine_id.expose()),
                ("q", query),
                ("num", count.as_str()),
            ])
            .send()
            .await
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ReportError::ExternalCall(format!(
                "web search returned status {}",
                response.status()
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;

        Ok(parsed
            .items
            .into_iter()
            .map(|item| ResultRecord::new(SourceId::Web, item.title, item.link, item.snippet))
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for WebSearchSource {
    fn id(&self) -> SourceId {
        SourceId::Web
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<ResultRecord> {
        match self.fetch(query, max_results).await {
            Ok(records) => records,
            Err(err) => {
                warn!(source = %self.id(), %query, error = %err, "search failed");
                Vec::new()
            }
        }
    }
}
