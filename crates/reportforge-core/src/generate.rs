//! Report drafting: section content generation and markdown assembly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::ReportError;
use crate::charts::{ChartSet, RenderedChart};
use crate::llm::{ChatMessage, TextCompletion};
use crate::outline::{ReportPlan, SectionPlan};
use crate::research::ResearchAggregate;

/// Charts embedded inline per section are capped at this many; the rest land
/// in the appendix.
const MAX_CHARTS_PER_SECTION: usize = 2;

/// Reading speed used for the estimated reading time.
const WORDS_PER_MINUTE: usize = 200;

const SECTION_PROMPT: &str = "You are an expert report writer producing polished, well-structured prose.\n\n\
Write the requested report section based on the research synthesis and section plan.\n\n\
Guidelines:\n\
- Write in a clear, professional tone matching the requested style\n\
- Address every key point in the section plan\n\
- Stay grounded in the research synthesis, do not invent facts\n\
- Aim for approximately the estimated word count\n\
- Use markdown subheadings and lists where they aid readability\n\
- Do not repeat the section title; start directly with the content";

/// Metadata describing a finished draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub topic: String,
    pub style: String,
    pub generated_at: DateTime<Utc>,
    pub section_count: usize,
    pub chart_count: usize,
    pub source_count: usize,
    pub word_count: usize,
    pub reading_time_minutes: usize,
}

/// A fully drafted report, ready to be persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftReport {
    pub markdown: String,
    pub metadata: ReportMetadata,
}

/// Drafts the report from the plan, research aggregate, and rendered charts.
pub struct ReportGenerator {
    llm: Arc<dyn TextCompletion>,
    style: String,
}

impl ReportGenerator {
    pub fn new(llm: Arc<dyn TextCompletion>, style: impl Into<String>) -> Self {
        Self {
            llm,
            style: style.into(),
        }
    }

    /// Draft the full report.
    ///
    /// A failed section generation falls back to a placeholder paragraph so
    /// one bad completion does not sink the report; assembly itself is
    /// infallible.
    #[instrument(name = "generate.draft", skip(self, plan, research, charts))]
    pub async fn generate(
        &self,
        plan: &ReportPlan,
        research: &ResearchAggregate,
        charts: &ChartSet,
    ) -> Result<DraftReport, ReportError> {
        let mut sections = Vec::with_capacity(plan.outline.len());
        for section in &plan.outline {
            let content = match self.write_section(plan, research, section).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(section = %section.title, error = %err, "section generation failed, inserting placeholder");
                    format!("*Content for this section could not be generated.*\n\n{}", section.description)
                }
            };
            sections.push((section, content));
        }

        let markdown = assemble_markdown(plan, &sections, charts);
        let word_count = count_words(&markdown);

        let metadata = ReportMetadata {
            topic: plan.topic.clone(),
            style: self.style.clone(),
            generated_at: Utc::now(),
            section_count: plan.outline.len(),
            chart_count: charts.len(),
            source_count: research.results.len(),
            word_count,
            reading_time_minutes: (word_count / WORDS_PER_MINUTE).max(1),
        };

        debug!(
            sections = metadata.section_count,
            words = metadata.word_count,
            "draft assembled"
        );

        Ok(DraftReport { markdown, metadata })
    }

    async fn write_section(
        &self,
        plan: &ReportPlan,
        research: &ResearchAggregate,
        section: &SectionPlan,
    ) -> Result<String, ReportError> {
        let key_points = section
            .key_points
            .iter()
            .map(|point| format!("- {point}"))
            .collect::<Vec<_>>()
            .join("\n");

        let messages = [
            ChatMessage::system(SECTION_PROMPT),
            ChatMessage::user(format!(
                "Topic: {}\nStyle: {}\n\nSection: {}\nDescription: {}\nKey points:\n{}\nTarget length: about {} words\n\nResearch synthesis:\n{}\n\nWrite the section:",
                plan.topic,
                self.style,
                section.title,
                section.description,
                key_points,
                section.estimated_words,
                research.synthesis
            )),
        ];

        self.llm.complete(&messages).await
    }
}

/// Score a chart's affinity to a section by keyword overlap: title words
/// weigh 3, description words 2, and a section-name match 1.
fn chart_affinity(chart: &RenderedChart, section: &SectionPlan) -> usize {
    let section_words = lowercase_words(&section.title);
    let mut score = 0;

    for word in lowercase_words(&chart.title) {
        if section_words.contains(&word) {
            score += 3;
        }
    }
    for word in lowercase_words(&chart.description) {
        if section_words.contains(&word) {
            score += 2;
        }
    }
    if !chart.section.is_empty()
        && chart.section.to_lowercase() == section.title.to_lowercase()
    {
        score += 1;
    }

    score
}

fn lowercase_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| {
            word.trim_matches(|ch: char| !ch.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.len() > 3)
        .collect()
}

/// Pick up to [`MAX_CHARTS_PER_SECTION`] charts for a section, highest
/// affinity first, skipping charts with no affinity at all.
fn relevant_charts<'a>(charts: &'a ChartSet, section: &SectionPlan) -> Vec<&'a RenderedChart> {
    let mut scored: Vec<(usize, &RenderedChart)> = charts
        .charts
        .iter()
        .map(|chart| (chart_affinity(chart, section), chart))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_CHARTS_PER_SECTION)
        .map(|(_, chart)| chart)
        .collect()
}

fn chart_embed(chart: &RenderedChart) -> String {
    let file_name = chart
        .file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(
        "![{}](charts/{})\n\n*{}*",
        chart.title, file_name, chart.description
    )
}

fn assemble_markdown(
    plan: &ReportPlan,
    sections: &[(&SectionPlan, String)],
    charts: &ChartSet,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("# {}\n\n", plan.topic));
    out.push_str(&format!(
        "*Generated on {}*\n\n",
        Utc::now().format("%Y-%m-%d")
    ));

    out.push_str("## Table of Contents\n\n");
    for (index, (section, _)) in sections.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", index + 1, section.title));
    }
    out.push('\n');

    let mut embedded: Vec<&RenderedChart> = Vec::new();
    for (section, content) in sections {
        out.push_str(&format!("## {}\n\n", section.title));
        out.push_str(content.trim());
        out.push_str("\n\n");

        for chart in relevant_charts(charts, section) {
            if embedded.iter().any(|seen| seen.file_path == chart.file_path) {
                continue;
            }
            out.push_str(&chart_embed(chart));
            out.push_str("\n\n");
            embedded.push(chart);
        }
    }

    let leftover: Vec<&RenderedChart> = charts
        .charts
        .iter()
        .filter(|chart| !embedded.iter().any(|seen| seen.file_path == chart.file_path))
        .collect();
    if !leftover.is_empty() {
        out.push_str("## Appendix: Additional Visualizations\n\n");
        for chart in leftover {
            out.push_str(&chart_embed(chart));
            out.push_str("\n\n");
        }
    }

    out
}

fn count_words(markdown: &str) -> usize {
    markdown.split_whitespace().count()
}
