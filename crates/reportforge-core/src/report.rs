//! Persistence of a finished report run: markdown, HTML, data exports, and
//! chart artifacts under one timestamped directory.

use std::path::{Path, PathBuf};

use chrono::Utc;
use pulldown_cmark::{Options, Parser, html};
use tracing::{info, instrument};

use crate::ReportError;
use crate::charts::ChartSet;
use crate::generate::DraftReport;
use crate::research::ResearchAggregate;

const HTML_STYLE: &str = "body { font-family: Georgia, 'Times New Roman', serif; max-width: 52rem; \
margin: 2rem auto; padding: 0 1rem; line-height: 1.6; color: #1a1a1a; } \
h1, h2, h3 { font-family: Helvetica, Arial, sans-serif; } \
h1 { border-bottom: 2px solid #ddd; padding-bottom: 0.3rem; } \
img { max-width: 100%; } \
em { color: #555; } \
code { background: #f4f4f4; padding: 0.1rem 0.3rem; border-radius: 3px; }";

/// Everything written for one report run.
#[derive(Debug, Clone)]
pub struct PersistedReport {
    pub output_dir: PathBuf,
    pub markdown_path: PathBuf,
    pub html_path: PathBuf,
}

/// Write the report bundle under `base_dir/report_<timestamp>/`.
///
/// The bundle holds `final_report.md`, `final_report.html`,
/// `research_data.json`, `metadata.json`, and a `charts/` directory with
/// every rendered chart copied in. The markdown references charts by the
/// relative `charts/` path, so the bundle is self-contained.
#[instrument(name = "report.persist", skip(draft, research, charts))]
pub fn persist_report(
    draft: &DraftReport,
    research: &ResearchAggregate,
    charts: &ChartSet,
    base_dir: &Path,
) -> Result<PersistedReport, ReportError> {
    let output_dir = base_dir.join(format!("report_{}", Utc::now().format("%Y%m%d_%H%M%S")));
    std::fs::create_dir_all(&output_dir)
        .map_err(|err| ReportError::artifact(output_dir.clone(), err))?;

    let markdown_path = output_dir.join("final_report.md");
    std::fs::write(&markdown_path, &draft.markdown)
        .map_err(|err| ReportError::artifact(markdown_path.clone(), err))?;

    let html_path = output_dir.join("final_report.html");
    let html = render_html(&draft.metadata.topic, &draft.markdown);
    std::fs::write(&html_path, html).map_err(|err| ReportError::artifact(html_path.clone(), err))?;

    write_json(&output_dir.join("research_data.json"), research)?;
    write_json(&output_dir.join("metadata.json"), &draft.metadata)?;

    if !charts.is_empty() {
        let charts_dir = output_dir.join("charts");
        std::fs::create_dir_all(&charts_dir)
            .map_err(|err| ReportError::artifact(charts_dir.clone(), err))?;
        for chart in &charts.charts {
            let Some(file_name) = chart.file_path.file_name() else {
                continue;
            };
            let destination = charts_dir.join(file_name);
            std::fs::copy(&chart.file_path, &destination)
                .map_err(|err| ReportError::artifact(destination.clone(), err))?;
        }
    }

    info!(dir = %output_dir.display(), "report bundle written");

    Ok(PersistedReport {
        output_dir,
        markdown_path,
        html_path,
    })
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|err| ReportError::ExternalCall(err.to_string()))?;
    std::fs::write(path, body).map_err(|err| ReportError::artifact(path.to_path_buf(), err))
}

fn render_html(title: &str, markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut body = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title}</title>\n<style>{HTML_STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::RenderedChart;
    use crate::generate::ReportMetadata;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn draft() -> DraftReport {
        DraftReport {
            markdown: "# Topic\n\nSome **bold** prose.\n".to_string(),
            metadata: ReportMetadata {
                topic: "Topic".into(),
                style: "professional".into(),
                generated_at: Utc::now(),
                section_count: 1,
                chart_count: 0,
                source_count: 0,
                word_count: 4,
                reading_time_minutes: 1,
            },
        }
    }

    fn research() -> ResearchAggregate {
        ResearchAggregate {
            topic: "Topic".into(),
            queries: vec!["Topic".into()],
            results: Vec::new(),
            source_counts: BTreeMap::new(),
            synthesis: "synthesis".into(),
        }
    }

    #[test]
    fn writes_the_full_bundle() {
        let base = tempdir().unwrap();
        let persisted =
            persist_report(&draft(), &research(), &ChartSet::default(), base.path()).unwrap();

        assert!(persisted.markdown_path.exists());
        assert!(persisted.html_path.exists());
        assert!(persisted.output_dir.join("research_data.json").exists());
        assert!(persisted.output_dir.join("metadata.json").exists());

        let html = std::fs::read_to_string(&persisted.html_path).unwrap();
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<title>Topic</title>"));

        let meta: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(persisted.output_dir.join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta["style"], "professional");
    }

    #[test]
    fn copies_chart_artifacts_into_the_bundle() {
        let base = tempdir().unwrap();
        let staging = tempdir().unwrap();

        let chart_file = staging.path().join("chart_01_demo.json");
        std::fs::write(&chart_file, b"{}").unwrap();
        let charts = ChartSet {
            charts: vec![RenderedChart {
                title: "Demo".into(),
                description: String::new(),
                section: String::new(),
                chart_type: "bar".into(),
                file_path: chart_file,
            }],
        };

        let persisted = persist_report(&draft(), &research(), &charts, base.path()).unwrap();
        assert!(persisted.output_dir.join("charts/chart_01_demo.json").exists());
    }
}
