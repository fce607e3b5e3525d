//! graph-flow tasks wiring the pipeline stages together.
//!
//! Context keys used across the graph:
//! - `topic`: the research topic (seeded by the session runner)
//! - `research.aggregate`: [`ResearchAggregate`] from the research stage
//! - `plan`: [`ReportPlan`] from the outline stage
//! - `charts.set`: [`ChartSet`] from the visualization stage
//! - `draft.report`: [`DraftReport`] from the drafting stage
//! - `final.summary` / `final.output_dir`: set on success
//! - `final.error`: set by whichever stage failed fatally

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use tracing::{info, instrument, warn};

use crate::charts::{ChartSet, ChartStage};
use crate::error::StageError;
use crate::generate::{DraftReport, ReportGenerator};
use crate::outline::{OutlinePlanner, ReportPlan};
use crate::report::persist_report;
use crate::research::{ResearchAggregate, ResearchEngine};

/// Record a fatal stage failure in context and stop the graph.
async fn abort(context: &Context, stage: &str, reason: impl ToString) -> TaskResult {
    let error = StageError::new(stage, reason.to_string());
    warn!(%error, "stage failed, aborting run");
    context.set("final.error", error.to_string()).await;
    TaskResult::new(Some(error.to_string()), NextAction::End)
}

pub struct ResearchStageTask {
    engine: Arc<ResearchEngine>,
}

impl ResearchStageTask {
    pub fn new(engine: Arc<ResearchEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for ResearchStageTask {
    fn id(&self) -> &str {
        "research"
    }

    #[instrument(name = "task.research", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let topic: String = context.get("topic").await.unwrap_or_default();
        if topic.trim().is_empty() {
            return Ok(abort(&context, self.id(), "no topic provided").await);
        }

        let aggregate = match self.engine.run(&topic).await {
            Ok(aggregate) => aggregate,
            Err(err) => return Ok(abort(&context, self.id(), err).await),
        };

        info!(
            result_count = aggregate.results.len(),
            "research stage complete"
        );
        context.set("research.aggregate", &aggregate).await;

        Ok(TaskResult::new(
            Some(format!(
                "Research gathered {} sources for \"{topic}\"",
                aggregate.results.len()
            )),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct OutlineStageTask {
    planner: Arc<OutlinePlanner>,
}

impl OutlineStageTask {
    pub fn new(planner: Arc<OutlinePlanner>) -> Self {
        Self { planner }
    }
}

#[async_trait]
impl Task for OutlineStageTask {
    fn id(&self) -> &str {
        "outline"
    }

    #[instrument(name = "task.outline", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let Some(aggregate) = context.get::<ResearchAggregate>("research.aggregate").await else {
            return Ok(abort(&context, self.id(), "research aggregate missing").await);
        };

        let plan = match self.planner.plan(&aggregate).await {
            Ok(plan) => plan,
            Err(err) => return Ok(abort(&context, self.id(), err).await),
        };

        info!(
            section_count = plan.outline.len(),
            chart_count = plan.charts.len(),
            "outline stage complete"
        );
        context.set("plan", &plan).await;

        Ok(TaskResult::new(
            Some(format!("Outline planned with {} sections", plan.outline.len())),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct ChartsStageTask {
    stage: Arc<ChartStage>,
    staging_dir: PathBuf,
}

impl ChartsStageTask {
    pub fn new(stage: Arc<ChartStage>, staging_dir: PathBuf) -> Self {
        Self { stage, staging_dir }
    }
}

#[async_trait]
impl Task for ChartsStageTask {
    fn id(&self) -> &str {
        "charts"
    }

    #[instrument(name = "task.charts", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let Some(plan) = context.get::<ReportPlan>("plan").await else {
            return Ok(abort(&context, self.id(), "report plan missing").await);
        };

        // Visualization is best-effort; the stage itself degrades per chart.
        let charts = self.stage.generate(&plan, &self.staging_dir).await;

        info!(rendered = charts.len(), "charts stage complete");
        context.set("charts.set", &charts).await;

        Ok(TaskResult::new(
            Some(format!("Rendered {} charts", charts.len())),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct DraftStageTask {
    generator: Arc<ReportGenerator>,
}

impl DraftStageTask {
    pub fn new(generator: Arc<ReportGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Task for DraftStageTask {
    fn id(&self) -> &str {
        "draft"
    }

    #[instrument(name = "task.draft", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let Some(plan) = context.get::<ReportPlan>("plan").await else {
            return Ok(abort(&context, self.id(), "report plan missing").await);
        };
        let Some(aggregate) = context.get::<ResearchAggregate>("research.aggregate").await else {
            return Ok(abort(&context, self.id(), "research aggregate missing").await);
        };
        let charts: ChartSet = context.get("charts.set").await.unwrap_or_default();

        let draft = match self.generator.generate(&plan, &aggregate, &charts).await {
            Ok(draft) => draft,
            Err(err) => return Ok(abort(&context, self.id(), err).await),
        };

        info!(
            word_count = draft.metadata.word_count,
            "draft stage complete"
        );
        context.set("draft.report", &draft).await;

        Ok(TaskResult::new(
            Some(format!(
                "Drafted {} words across {} sections",
                draft.metadata.word_count, draft.metadata.section_count
            )),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct FinalizeStageTask {
    output_base: PathBuf,
}

impl FinalizeStageTask {
    pub fn new(output_base: PathBuf) -> Self {
        Self { output_base }
    }
}

#[async_trait]
impl Task for FinalizeStageTask {
    fn id(&self) -> &str {
        "finalize"
    }

    #[instrument(name = "task.finalize", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let Some(draft) = context.get::<DraftReport>("draft.report").await else {
            return Ok(abort(&context, self.id(), "draft missing").await);
        };
        let Some(aggregate) = context.get::<ResearchAggregate>("research.aggregate").await else {
            return Ok(abort(&context, self.id(), "research aggregate missing").await);
        };
        let charts: ChartSet = context.get("charts.set").await.unwrap_or_default();

        let persisted = match persist_report(&draft, &aggregate, &charts, &self.output_base) {
            Ok(persisted) => persisted,
            Err(err) => return Ok(abort(&context, self.id(), err).await),
        };

        let summary = format!(
            "Report on \"{}\" written to {} ({} words, {} charts, {} sources)",
            draft.metadata.topic,
            persisted.output_dir.display(),
            draft.metadata.word_count,
            draft.metadata.chart_count,
            draft.metadata.source_count
        );

        context.set("final.summary", summary.clone()).await;
        context
            .set(
                "final.output_dir",
                persisted.output_dir.display().to_string(),
            )
            .await;

        info!(dir = %persisted.output_dir.display(), "finalize stage complete");

        Ok(TaskResult::new(Some(summary), NextAction::End))
    }
}
