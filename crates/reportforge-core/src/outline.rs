//! Report structure planning from the research synthesis.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::ReportError;
use crate::llm::{ChatMessage, TextCompletion};
use crate::research::ResearchAggregate;

const OUTLINE_PROMPT: &str = "You are an expert technical writer creating report outlines.\n\n\
Create a detailed outline for a comprehensive research report based on the topic and research synthesis provided.\n\n\
Return a JSON array where each section has:\n\
- \"title\": Section title\n\
- \"description\": Brief description of what this section will cover\n\
- \"key_points\": Array of 3-5 key points to address\n\
- \"estimated_words\": Estimated word count for this section\n\n\
The report should be well-structured, logical, and comprehensive. Include:\n\
1. Introduction\n\
2. 3-6 main content sections based on research themes\n\
3. Conclusion\n\n\
Return only valid JSON.";

const CHART_PLAN_PROMPT: &str = "You are a data visualization expert planning charts for a research report.\n\n\
Based on the topic, research synthesis, and report outline, suggest visualizations that would enhance the report.\n\n\
For each suggested visualization, provide:\n\
- \"chart_type\": Chart type (bar, line, pie, scatter, histogram)\n\
- \"title\": Descriptive title for the chart\n\
- \"description\": What the chart will show\n\
- \"section\": Which report section it belongs in\n\
- \"priority\": High, Medium, or Low\n\n\
Focus on visualizations that support key arguments, clarify complex information, \
and are feasible to create from research data.\n\n\
Return a JSON array of visualization suggestions. Aim for 3-6 high-quality suggestions.";

/// One planned report section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionPlan {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default = "SectionPlan::default_estimated_words")]
    pub estimated_words: usize,
}

impl SectionPlan {
    const fn default_estimated_words() -> usize {
        300
    }
}

/// One planned visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPlan {
    #[serde(default = "ChartPlan::default_chart_type")]
    pub chart_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub priority: String,
}

impl ChartPlan {
    fn default_chart_type() -> String {
        "bar".to_string()
    }
}

/// Full report plan handed to the chart and drafting stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPlan {
    pub topic: String,
    pub outline: Vec<SectionPlan>,
    pub charts: Vec<ChartPlan>,
}

impl ReportPlan {
    pub fn estimated_words(&self) -> usize {
        self.outline
            .iter()
            .map(|section| section.estimated_words)
            .sum()
    }
}

/// Plans the report outline and visualization set via the LLM.
pub struct OutlinePlanner {
    llm: Arc<dyn TextCompletion>,
}

impl OutlinePlanner {
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        Self { llm }
    }

    /// Produce the report plan.
    ///
    /// An unusable outline JSON falls back to a canonical three-section
    /// outline; an unusable chart-plan JSON falls back to no charts. A failed
    /// completion call is fatal, since a report without its planned structure
    /// cannot be generated.
    #[instrument(name = "outline.plan", skip(self, research))]
    pub async fn plan(&self, research: &ResearchAggregate) -> Result<ReportPlan, ReportError> {
        let outline = self.create_outline(research).await?;
        let charts = self.plan_charts(research, &outline).await?;

        debug!(
            section_count = outline.len(),
            chart_count = charts.len(),
            "report plan assembled"
        );

        Ok(ReportPlan {
            topic: research.topic.clone(),
            outline,
            charts,
        })
    }

    async fn create_outline(
        &self,
        research: &ResearchAggregate,
    ) -> Result<Vec<SectionPlan>, ReportError> {
        let messages = [
            ChatMessage::system(OUTLINE_PROMPT),
            ChatMessage::user(format!(
                "Topic: {}\n\nResearch Synthesis:\n{}\n\nCreate a detailed report outline:",
                research.topic, research.synthesis
            )),
        ];

        let response = self.llm.complete(&messages).await?;

        match parse_json_array::<SectionPlan>(&response) {
            Some(outline) if !outline.is_empty() => Ok(outline),
            _ => {
                warn!("outline response unusable, using fallback outline");
                Ok(fallback_outline(&research.topic))
            }
        }
    }

    async fn plan_charts(
        &self,
        research: &ResearchAggregate,
        outline: &[SectionPlan],
    ) -> Result<Vec<ChartPlan>, ReportError> {
        let outline_text = outline
            .iter()
            .enumerate()
            .map(|(index, section)| {
                format!("{}. {}: {}", index + 1, section.title, section.description)
            })
            .collect::<Vec<_>>()
            .join("\n");

        let synthesis_excerpt: String = research.synthesis.chars().take(1_000).collect();

        let messages = [
            ChatMessage::system(CHART_PLAN_PROMPT),
            ChatMessage::user(format!(
                "Topic: {}\n\nSynthesis: {}...\n\nOutline:\n{}\n\nSuggest effective visualizations:",
                research.topic, synthesis_excerpt, outline_text
            )),
        ];

        let response = self.llm.complete(&messages).await?;

        match parse_json_array::<ChartPlan>(&response) {
            Some(charts) => Ok(charts),
            None => {
                warn!("chart plan response unusable, continuing without charts");
                Ok(Vec::new())
            }
        }
    }
}

/// Parse a JSON array out of an LLM response, tolerating markdown code
/// fences around the payload.
pub(crate) fn parse_json_array<T: serde::de::DeserializeOwned>(response: &str) -> Option<Vec<T>> {
    serde_json::from_str(strip_code_fences(response)).ok()
}

fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn fallback_outline(topic: &str) -> Vec<SectionPlan> {
    vec![
        SectionPlan {
            title: "Introduction".to_string(),
            description: format!("Overview of {topic}"),
            key_points: vec!["Background".into(), "Scope".into(), "Objectives".into()],
            estimated_words: 300,
        },
        SectionPlan {
            title: "Analysis".to_string(),
            description: format!("Detailed analysis of {topic}"),
            key_points: vec![
                "Key findings".into(),
                "Important trends".into(),
                "Critical insights".into(),
            ],
            estimated_words: 500,
        },
        SectionPlan {
            title: "Conclusion".to_string(),
            description: "Summary and implications".to_string(),
            key_points: vec![
                "Summary".into(),
                "Implications".into(),
                "Future outlook".into(),
            ],
            estimated_words: 250,
        },
    ]
}
