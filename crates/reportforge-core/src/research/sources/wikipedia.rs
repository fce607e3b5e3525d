//! Wikipedia adapter: opensearch for candidate titles, then one summary
//! lookup per title.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ReportError;
use crate::research::record::{ResultRecord, SourceId};

use super::SourceAdapter;

const API_URL: &str = "https://en.wikipedia.org/w/api.php";
const SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

pub struct WikipediaSource {
    client: reqwest::Client,
    api_url: String,
    summary_url: String,
}

#[derive(Deserialize, Default)]
struct PageSummary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Deserialize)]
struct ContentUrls {
    desktop: Option<DesktopUrls>,
}

#[derive(Deserialize)]
struct DesktopUrls {
    page: Option<String>,
}

impl WikipediaSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: API_URL.to_string(),
            summary_url: SUMMARY_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, url: &str) -> Self {
        let base = url.trim_end_matches('/');
        self.api_url = format!("{base}/w/api.php");
        self.summary_url = format!("{base}/api/rest_v1/page/summary");
        self
    }

    /// Step 1: resolve the query to a bounded list of candidate page titles.
    async fn lookup_titles(&self, query: &str, limit: usize) -> Result<Vec<String>, ReportError> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "opensearch"),
                ("search", query),
                ("limit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ReportError::ExternalCall(format!(
                "opensearch returned status {}",
                response.status()
            )));
        }

        // Opensearch replies with a positional array:
        // [query, [titles], [descriptions], [urls]]
        let body: Value = response
            .json()
            .await
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;

        let titles = body
            .get(1)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(titles)
    }

    /// Step 2: fetch the summary for one candidate title.
    async fn fetch_summary(&self, title: &str) -> Result<ResultRecord, ReportError> {
        let url = format!("{}/{}", self.summary_url, urlencoding::encode(title));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ReportError::ExternalCall(format!(
                "summary lookup for {title:?} returned status {}",
                response.status()
            )));
        }

        let summary: PageSummary = response
            .json()
            .await
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;

        let page_url = summary
            .content_urls
            .and_then(|urls| urls.desktop)
            .and_then(|desktop| desktop.page)
            .unwrap_or_default();

        let record_title = if summary.title.is_empty() {
            title.to_string()
        } else {
            summary.title
        };

        Ok(ResultRecord::new(
            SourceId::Wikipedia,
            record_title,
            page_url,
            summary.extract,
        ))
    }
}

#[async_trait]
impl SourceAdapter for WikipediaSource {
    fn id(&self) -> SourceId {
        SourceId::Wikipedia
    }

    async fn search(&self, query: &str, max_results: usize) -> Vec<ResultRecord> {
        let titles = match self.lookup_titles(query, max_results).await {
            Ok(titles) => titles,
            Err(err) => {
                warn!(source = %self.id(), %query, error = %err, "search failed");
                return Vec::new();
            }
        };

        // Per-candidate failures are skipped without aborting the search.
        let mut records = Vec::new();
        for title in titles.iter().take(max_results) {
            match self.fetch_summary(title).await {
                Ok(record) => records.push(record),
                Err(err) => {
                    debug!(source = %self.id(), %title, error = %err, "skipping candidate");
                }
            }
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_opensearch(server: &MockServer, titles: &[&str]) {
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("action", "opensearch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                "query",
                titles,
                titles.iter().map(|_| "").collect::<Vec<_>>(),
                titles.iter().map(|_| "").collect::<Vec<_>>()
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn resolves_titles_then_fetches_summaries() {
        let server = MockServer::start().await;
        mount_opensearch(&server, &["Quantum computing"]).await;

        Mock::given(method("GET"))
            .and(path("/api/rest_v1/page/summary/Quantum%20computing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Quantum computing",
                "extract": "Computation using quantum effects.",
                "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Quantum_computing"}}
            })))
            .mount(&server)
            .await;

        let source = WikipediaSource::new(reqwest::Client::new()).with_base_url(&server.uri());
        let records = source.search("quantum computing", 3).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Quantum computing");
        assert_eq!(records[0].url, "https://en.wikipedia.org/wiki/Quantum_computing");
        assert_eq!(records[0].source, SourceId::Wikipedia);
    }

    #[tokio::test]
    async fn failed_candidate_is_skipped_not_fatal() {
        let server = MockServer::start().await;
        mount_opensearch(&server, &["Good", "Bad"]).await;

        Mock::given(method("GET"))
            .and(path("/api/rest_v1/page/summary/Good"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Good",
                "extract": "Fine article.",
                "content_urls": {"desktop": {"page": "https://en.wikipedia.org/wiki/Good"}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/rest_v1/page/summary/Bad"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = WikipediaSource::new(reqwest::Client::new()).with_base_url(&server.uri());
        let records = source.search("anything", 3).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Good");
    }

    #[tokio::test]
    async fn opensearch_failure_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let source = WikipediaSource::new(reqwest::Client::new()).with_base_url(&server.uri());
        assert!(source.search("anything", 3).await.is_empty());
    }
}
