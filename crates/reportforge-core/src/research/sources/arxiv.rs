//! arXiv Atom feed adapter.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use tracing::warn;

use crate::ReportError;
use crate::research::record::{ResultRecord, SourceId};

use super::SourceAdapter;

const QUERY_URL: &str = "http://export.arxiv.org/api/query";

/// Abstracts are cut to this many characters before an ellipsis marker.
const SNIPPET_LIMIT: usize = 300;

pub struct ArxivSource {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: QUERY_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn fetch(&self, query: &str, max_results: usize) -> Result<Vec<ResultRecord>, ReportError> {
        let search_expression = format!("all:{query}");
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search_query", search_expression.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "relevance"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ReportError::ExternalCall(format!(
                "arXiv API returned status {}",
                response.status()
            )));
        }

        let content = response
            .text()
            .await
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;

        parse_feed(&content)
    }
}

#[async_trait]
impl SourceAdapter for ArxivSource {
    fn id(&self) -> SourceId {
        SourceId::Arxiv
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

/// Parse an Atom feed into result records: one per `<entry>`, taking the
/// entry's title, id link, and truncated summary.
fn parse_feed(xml_content: &str) -> Result<Vec<ResultRecord>, ReportError> {
    let mut reader = Reader::from_str(xml_content);
    reader.trim_text(true);

    let mut records = Vec::new();
    let mut in_entry = false;
    let mut current_tag: Option<String> = None;
    let mut title = String::new();
    let mut url = String::new();
    let mut summary = String::new();
    let mut buffer = Vec::new();

    loop {
        match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(ref e)) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match tag_name.as_str() {
                    "entry" => {
                        in_entry = true;
                        title.clear();
                        url.clear();
                        summary.clear();
                    }
                    "id" | "title" | "summary" if in_entry => {
                        current_tag = Some(tag_name);
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_entry {
                    if let Some(ref tag) = current_tag {
                        let text = e
                            .unescape()
                            .map_err(|err| ReportError::ExternalCall(err.to_string()))?
                            .to_string();
                        match tag.as_str() {
                            "id" => url = text,
                            "title" => title = text,
                            "summary" => summary = text,
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let tag_name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag_name == "entry" {
                    in_entry = false;
                    if !title.is_empty() && !summary.is_empty() {
                        records.push(ResultRecord::new(
                            SourceId::Arxiv,
                            title.trim(),
                            url.trim(),
                            truncate_snippet(summary.trim()),
                        ));
                    }
                } else if Some(tag_name.as_str()) == current_tag.as_deref() {
                    current_tag = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ReportError::ExternalCall(err.to_string())),
            _ => {}
        }

        buffer.clear();
    }

    Ok(records)
}

fn truncate_snippet(summary: &str) -> String {
    let truncated: String = summary.chars().take(SNIPPET_LIMIT).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/2301.00001v1</id>
    <title>Quantum Error Correction Advances</title>
    <summary>A study of surface codes and their thresholds.</summary>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2301.00002v1</id>
    <title>Topological Qubits</title>
    <summary>Braiding anyons for fault tolerance.</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_from_feed() {
        let records = parse_feed(FEED).expect("feed parses");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Quantum Error Correction Advances");
        assert_eq!(records[0].url, "http://arxiv.org/abs/2301.00001v1");
        assert!(records[0].snippet.ends_with("..."));
        assert_eq!(records[0].source, SourceId::Arxiv);
    }

    #[test]
    fn long_summary_is_truncated_with_ellipsis() {
        let feed = format!(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><id>http://arxiv.org/abs/1</id><title>T</title><summary>{}</summary></entry></feed>"#,
            "x".repeat(400)
        );
        let records = parse_feed(&feed).unwrap();
        assert_eq!(records[0].snippet.chars().count(), SNIPPET_LIMIT + 3);
        assert!(records[0].snippet.ends_with("..."));
    }

    #[test]
    fn feed_title_outside_entries_is_ignored() {
        let records = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Ignored</title></feed>"#,
        )
        .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn http_failure_degrades_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = ArxivSource::new(reqwest::Client::new()).with_base_url(&server.uri());
        assert!(source.search("quantum", 5).await.is_empty());
    }

    #[tokio::test]
    async fn sends_all_prefixed_search_expression() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("search_query", "all:quantum"))
            .and(query_param("max_results", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
            .mount(&server)
            .await;

        let source = ArxivSource::new(reqwest::Client::new()).with_base_url(&server.uri());
        let records = source.search("quantum", 5).await;
        assert_eq!(records.len(), 2);
    }
}
