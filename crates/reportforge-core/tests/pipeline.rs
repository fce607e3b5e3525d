//! End-to-end pipeline runs with faked LLM and source adapters.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reportforge_core::research::{ResultRecord, SourceAdapter, SourceId};
use reportforge_core::{
    ChatMessage, JsonSpecRenderer, ReportError, ReportPipeline, ResearchConfig, SessionOptions,
    TextCompletion,
};
use tempfile::TempDir;

/// Routes each completion call on the system prompt so one fake can stand in
/// for every stage of the pipeline.
struct StageScriptedLlm {
    fail_synthesis: bool,
}

#[async_trait]
impl TextCompletion for StageScriptedLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ReportError> {
        let system = &messages[0].content;
        if system.contains("search queries") {
            Ok("Wind Energy\nwind turbine efficiency".to_string())
        } else if system.contains("relevance") {
            Err(ReportError::ExternalCall("ranker should not run".into()))
        } else if system.contains("report outlines") {
            Ok(r#"[
                {"title": "Introduction", "description": "Overview of wind energy", "key_points": ["history"], "estimated_words": 150},
                {"title": "Turbine Capacity", "description": "Capacity trends", "key_points": ["growth"], "estimated_words": 250}
            ]"#
            .to_string())
        } else if system.contains("visualization expert") {
            Ok(r#"[
                {"chart_type": "bar", "title": "Turbine Capacity Growth", "description": "Installed capacity by year", "section": "Turbine Capacity", "priority": "High"}
            ]"#
            .to_string())
        } else if system.contains("extracting chart data") {
            Ok(r#"{"labels": ["2023", "2024"], "values": [90.0, 117.0], "x_label": "Year", "y_label": "GW"}"#.to_string())
        } else if system.contains("report writer") {
            Ok("The wind sector keeps expanding across all major markets.".to_string())
        } else if self.fail_synthesis {
            Err(ReportError::ExternalCall("synthesis provider down".into()))
        } else {
            Ok("Wind power adoption is accelerating worldwide.".to_string())
        }
    }
}

struct FakeSource {
    id: SourceId,
}

#[async_trait]
impl SourceAdapter for FakeSource {
    fn id(&self) -> SourceId {
        self.id
    }

    async fn search(&self, query: &str, _max_results: usize) -> Vec<ResultRecord> {
        (0..2)
            .map(|index| {
                ResultRecord::new(
                    self.id,
                    format!("{} result {index} for {query}", self.id),
                    format!("https://example.com/{}/{}/{index}", self.id, query),
                    "Wind farms keep growing.",
                )
            })
            .collect()
    }
}

fn pipeline(fail_synthesis: bool, output_base: PathBuf) -> ReportPipeline {
    let sources: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(FakeSource { id: SourceId::Web }),
        Arc::new(FakeSource {
            id: SourceId::Wikipedia,
        }),
    ];

    ReportPipeline::from_parts(
        Arc::new(StageScriptedLlm { fail_synthesis }),
        sources,
        Arc::new(JsonSpecRenderer::new("academic")),
        ResearchConfig::default(),
        8,
        output_base,
    )
}

fn isolate_logs(temp: &TempDir) {
    unsafe {
        std::env::set_var("REPORTFORGE_LOG_DIR", temp.path().join("logs"));
        std::env::set_var("REPORTFORGE_LOG_RETENTION_DAYS", "0");
    }
}

#[tokio::test]
async fn full_run_writes_a_complete_bundle() {
    let temp = TempDir::new().unwrap();
    isolate_logs(&temp);

    let outcome = pipeline(false, temp.path().join("outputs"))
        .run(SessionOptions::new("Wind Energy").with_session_id("pipeline-test"))
        .await
        .expect("session completes");

    assert_eq!(outcome.session_id, "pipeline-test");
    let output_dir = outcome.output_dir.expect("output dir recorded");
    assert!(output_dir.exists());

    let markdown = std::fs::read_to_string(output_dir.join("final_report.md")).unwrap();
    assert!(markdown.starts_with("# Wind Energy"));
    assert!(markdown.contains("## Turbine Capacity"));
    assert!(markdown.contains("(charts/chart_01_turbine_capacity_growth.json)"));

    assert!(output_dir.join("final_report.html").exists());
    assert!(output_dir.join("research_data.json").exists());
    assert!(
        output_dir
            .join("charts/chart_01_turbine_capacity_growth.json")
            .exists()
    );

    let metadata: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output_dir.join("metadata.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(metadata["topic"], "Wind Energy");
    assert_eq!(metadata["section_count"], 2);
    assert_eq!(metadata["chart_count"], 1);
    // 2 queries x 2 sources x 2 records, all URLs distinct.
    assert_eq!(metadata["source_count"], 8);

    let research: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(output_dir.join("research_data.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(research["queries"].as_array().unwrap().len(), 2);
    assert_eq!(research["results"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn fatal_research_failure_surfaces_as_an_error() {
    let temp = TempDir::new().unwrap();
    isolate_logs(&temp);

    let err = pipeline(true, temp.path().join("outputs"))
        .run(SessionOptions::new("Wind Energy"))
        .await
        .expect_err("synthesis failure aborts the run");

    assert!(err.to_string().contains("research stage failed"));
}
