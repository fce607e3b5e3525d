//! Chart generation: turn planned visualizations into rendered artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::ReportError;
use crate::llm::{ChatMessage, TextCompletion};
use crate::outline::{ChartPlan, ReportPlan};

const CHART_DATA_PROMPT: &str = "You are a data analyst extracting chart data from research.\n\n\
Based on the chart description and research context, produce plausible data for the chart.\n\n\
Return a JSON object with:\n\
- \"labels\": Array of category or x-axis labels (4-8 entries)\n\
- \"values\": Array of numeric values, one per label\n\
- \"x_label\": X-axis label\n\
- \"y_label\": Y-axis label\n\n\
The data should be consistent with the research context. Return only valid JSON.";

/// Data series backing a single chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
}

impl ChartData {
    fn is_plottable(&self) -> bool {
        !self.labels.is_empty() && self.labels.len() == self.values.len()
    }
}

/// A chart that was rendered to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedChart {
    pub title: String,
    pub description: String,
    pub section: String,
    pub chart_type: String,
    pub file_path: PathBuf,
}

/// The full set of charts produced for one report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartSet {
    pub charts: Vec<RenderedChart>,
}

impl ChartSet {
    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }
}

/// Renders one chart to a file. The stage never looks inside the artifact.
pub trait ChartRenderer: Send + Sync {
    fn render(
        &self,
        plan: &ChartPlan,
        data: &ChartData,
        output_path: &Path,
    ) -> Result<(), ReportError>;

    fn file_extension(&self) -> &'static str;
}

/// Writes each chart as a self-describing JSON spec, renderable by any
/// external plotting frontend.
pub struct JsonSpecRenderer {
    style: String,
}

impl JsonSpecRenderer {
    pub fn new(style: impl Into<String>) -> Self {
        Self {
            style: style.into(),
        }
    }
}

impl ChartRenderer for JsonSpecRenderer {
    fn render(
        &self,
        plan: &ChartPlan,
        data: &ChartData,
        output_path: &Path,
    ) -> Result<(), ReportError> {
        let spec = json!({
            "chart_type": plan.chart_type,
            "title": plan.title,
            "description": plan.description,
            "style": self.style,
            "data": {
                "labels": data.labels,
                "values": data.values,
                "x_label": data.x_label,
                "y_label": data.y_label,
            },
        });

        let body = serde_json::to_vec_pretty(&spec)
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;
        std::fs::write(output_path, body)
            .map_err(|err| ReportError::artifact(output_path.to_path_buf(), err))
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }
}

/// Runs the visualization stage: data generation per planned chart, then
/// rendering into `charts_dir`.
pub struct ChartStage {
    llm: Arc<dyn TextCompletion>,
    renderer: Arc<dyn ChartRenderer>,
    max_charts: usize,
}

impl ChartStage {
    pub fn new(
        llm: Arc<dyn TextCompletion>,
        renderer: Arc<dyn ChartRenderer>,
        max_charts: usize,
    ) -> Self {
        Self {
            llm,
            renderer,
            max_charts,
        }
    }

    /// Render the planned charts into `charts_dir`.
    ///
    /// Each chart degrades independently: a failed data generation or render
    /// skips that chart and moves on. An empty set is a valid outcome.
    #[instrument(name = "charts.generate", skip(self, plan))]
    pub async fn generate(&self, plan: &ReportPlan, charts_dir: &Path) -> ChartSet {
        if plan.charts.is_empty() {
            return ChartSet::default();
        }

        if let Err(err) = std::fs::create_dir_all(charts_dir) {
            warn!(dir = %charts_dir.display(), error = %err, "cannot create charts directory, skipping visualization");
            return ChartSet::default();
        }

        let mut charts = Vec::new();
        for (index, chart_plan) in plan.charts.iter().take(self.max_charts).enumerate() {
            match self.render_one(plan, chart_plan, charts_dir, index).await {
                Ok(chart) => charts.push(chart),
                Err(err) => {
                    warn!(title = %chart_plan.title, error = %err, "chart skipped");
                }
            }
        }

        debug!(
            rendered = charts.len(),
            planned = plan.charts.len(),
            "visualization stage finished"
        );

        ChartSet { charts }
    }

    async fn render_one(
        &self,
        plan: &ReportPlan,
        chart_plan: &ChartPlan,
        charts_dir: &Path,
        index: usize,
    ) -> Result<RenderedChart, ReportError> {
        let data = self.generate_data(plan, chart_plan).await?;

        let file_name = format!(
            "chart_{:02}_{}.{}",
            index + 1,
            slugify(&chart_plan.title),
            self.renderer.file_extension()
        );
        let output_path = charts_dir.join(file_name);

        self.renderer.render(chart_plan, &data, &output_path)?;

        Ok(RenderedChart {
            title: chart_plan.title.clone(),
            description: chart_plan.description.clone(),
            section: chart_plan.section.clone(),
            chart_type: chart_plan.chart_type.clone(),
            file_path: output_path,
        })
    }

    async fn generate_data(
        &self,
        plan: &ReportPlan,
        chart_plan: &ChartPlan,
    ) -> Result<ChartData, ReportError> {
        let messages = [
            ChatMessage::system(CHART_DATA_PROMPT),
            ChatMessage::user(format!(
                "Topic: {}\n\nChart: {} ({})\nDescription: {}\n\nGenerate the chart data:",
                plan.topic, chart_plan.title, chart_plan.chart_type, chart_plan.description
            )),
        ];

        let response = self.llm.complete(&messages).await?;

        let data: ChartData = serde_json::from_str(strip_fences(&response)).map_err(|err| {
            ReportError::ExternalCall(format!("chart data response unusable: {err}"))
        })?;

        if !data.is_plottable() {
            return Err(ReportError::ExternalCall(
                "chart data labels and values do not line up".to_string(),
            ));
        }

        Ok(data)
    }
}

fn strip_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Lowercase alphanumeric slug for chart file names.
fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() { "chart".to_string() } else { slug }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    fn plan_with_charts(charts: Vec<ChartPlan>) -> ReportPlan {
        ReportPlan {
            topic: "Renewables".into(),
            outline: Vec::new(),
            charts,
        }
    }

    fn chart_plan(title: &str) -> ChartPlan {
        ChartPlan {
            chart_type: "bar".into(),
            title: title.into(),
            description: "capacity by year".into(),
            section: "Analysis".into(),
            priority: "High".into(),
        }
    }

    struct FixedCompletion(String);

    #[async_trait]
    impl TextCompletion for FixedCompletion {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, ReportError> {
            Ok(self.0.clone())
        }
    }

    fn valid_data_json() -> String {
        r#"{"labels": ["2022", "2023"], "values": [10.0, 14.5], "x_label": "Year", "y_label": "GW"}"#
            .to_string()
    }

    #[tokio::test]
    async fn renders_planned_charts_to_disk() {
        let dir = tempdir().unwrap();
        let stage = ChartStage::new(
            Arc::new(FixedCompletion(valid_data_json())),
            Arc::new(JsonSpecRenderer::new("default")),
            8,
        );
        let plan = plan_with_charts(vec![chart_plan("Solar Capacity Growth")]);

        let set = stage.generate(&plan, dir.path()).await;
        assert_eq!(set.len(), 1);

        let path = &set.charts[0].file_path;
        assert!(path.ends_with("chart_01_solar_capacity_growth.json"));
        let spec: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(spec["chart_type"], "bar");
        assert_eq!(spec["data"]["labels"][0], "2022");
    }

    #[tokio::test]
    async fn unusable_data_response_skips_the_chart() {
        let dir = tempdir().unwrap();
        let stage = ChartStage::new(
            Arc::new(FixedCompletion("cannot produce data".into())),
            Arc::new(JsonSpecRenderer::new("default")),
            8,
        );
        let plan = plan_with_charts(vec![chart_plan("Broken")]);

        let set = stage.generate(&plan, dir.path()).await;
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn mismatched_labels_and_values_skip_the_chart() {
        let dir = tempdir().unwrap();
        let stage = ChartStage::new(
            Arc::new(FixedCompletion(
                r#"{"labels": ["a", "b", "c"], "values": [1.0]}"#.into(),
            )),
            Arc::new(JsonSpecRenderer::new("default")),
            8,
        );
        let plan = plan_with_charts(vec![chart_plan("Lopsided")]);

        let set = stage.generate(&plan, dir.path()).await;
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn chart_count_is_capped() {
        let dir = tempdir().unwrap();
        let stage = ChartStage::new(
            Arc::new(FixedCompletion(valid_data_json())),
            Arc::new(JsonSpecRenderer::new("default")),
            2,
        );
        let plan = plan_with_charts(vec![
            chart_plan("One"),
            chart_plan("Two"),
            chart_plan("Three"),
        ]);

        let set = stage.generate(&plan, dir.path()).await;
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Solar: Capacity & Growth!"), "solar_capacity_growth");
        assert_eq!(slugify("???"), "chart");
    }
}
