//! End-to-end report workflow: graph construction and session execution.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
    Task,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::charts::{ChartRenderer, ChartStage, JsonSpecRenderer};
use crate::config::{Config, ResearchConfig};
use crate::error::ReportError;
use crate::generate::{DraftReport, ReportGenerator};
use crate::llm::{OpenAiCompletion, TextCompletion};
use crate::logging::{RunLogInput, log_run_completion};
use crate::outline::OutlinePlanner;
use crate::research::{ResearchEngine, SourceAdapter, active_sources};
use crate::tasks::{
    ChartsStageTask, DraftStageTask, FinalizeStageTask, OutlineStageTask, ResearchStageTask,
};

/// Options for one report session.
pub struct SessionOptions<'a> {
    pub topic: &'a str,
    pub session_id: Option<String>,
}

impl<'a> SessionOptions<'a> {
    pub fn new(topic: &'a str) -> Self {
        Self {
            topic,
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Result of a completed report session.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub session_id: String,
    pub summary: String,
    pub output_dir: Option<PathBuf>,
}

/// A fully wired pipeline, ready to run sessions.
///
/// [`ReportPipeline::from_config`] builds the production wiring; tests use
/// [`ReportPipeline::from_parts`] to inject fakes at the trait seams.
pub struct ReportPipeline {
    llm: Arc<dyn TextCompletion>,
    sources: Vec<Arc<dyn SourceAdapter>>,
    renderer: Arc<dyn ChartRenderer>,
    research: ResearchConfig,
    max_charts: usize,
    style: String,
    output_base: PathBuf,
}

impl ReportPipeline {
    /// Wire the pipeline from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, ReportError> {
        let api_key = config.llm_api_key()?;

        let llm_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.llm.timeout_secs))
            .build()
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;
        let llm: Arc<dyn TextCompletion> =
            Arc::new(OpenAiCompletion::new(llm_client, &config.llm, api_key));

        let source_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.research.request_timeout_secs,
            ))
            .build()
            .map_err(|err| ReportError::ExternalCall(err.to_string()))?;
        let sources = active_sources(&source_client);

        let renderer: Arc<dyn ChartRenderer> =
            Arc::new(JsonSpecRenderer::new(config.visualization.style.clone()));

        Ok(Self {
            llm,
            sources,
            renderer,
            research: config.research.clone(),
            max_charts: config.visualization.max_charts_per_report,
            style: "professional".to_string(),
            output_base: config.report.output_dir.clone(),
        })
    }

    /// Assemble a pipeline from pre-built components.
    pub fn from_parts(
        llm: Arc<dyn TextCompletion>,
        sources: Vec<Arc<dyn SourceAdapter>>,
        renderer: Arc<dyn ChartRenderer>,
        research: ResearchConfig,
        max_charts: usize,
        output_base: PathBuf,
    ) -> Self {
        Self {
            llm,
            sources,
            renderer,
            research,
            max_charts,
            style: "professional".to_string(),
            output_base,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }

    pub fn with_output_base(mut self, output_base: PathBuf) -> Self {
        self.output_base = output_base;
        self
    }

    /// Run only the research stage and return the raw aggregate.
    pub async fn research(
        &self,
        topic: &str,
    ) -> Result<crate::research::ResearchAggregate, ReportError> {
        let engine = ResearchEngine::new(
            Arc::clone(&self.llm),
            self.sources.clone(),
            self.research.clone(),
        );
        engine.run(topic).await
    }

    /// Run one report session through the graph.
    ///
    /// A stage that aborts surfaces as an error here; the degradation rules
    /// within each stage have already been applied by then.
    pub async fn run(&self, options: SessionOptions<'_>) -> Result<ReportOutcome> {
        let session_id = options
            .session_id
            .clone()
            .unwrap_or_else(|| format!("session-{}", Uuid::new_v4()));

        let staging_dir = std::env::temp_dir().join(format!("reportforge-{session_id}"));

        let research_task = Arc::new(ResearchStageTask::new(Arc::new(ResearchEngine::new(
            Arc::clone(&self.llm),
            self.sources.clone(),
            self.research.clone(),
        ))));
        let outline_task = Arc::new(OutlineStageTask::new(Arc::new(OutlinePlanner::new(
            Arc::clone(&self.llm),
        ))));
        let charts_task = Arc::new(ChartsStageTask::new(
            Arc::new(ChartStage::new(
                Arc::clone(&self.llm),
                Arc::clone(&self.renderer),
                self.max_charts,
            )),
            staging_dir,
        ));
        let draft_task = Arc::new(DraftStageTask::new(Arc::new(ReportGenerator::new(
            Arc::clone(&self.llm),
            self.style.clone(),
        ))));
        let finalize_task = Arc::new(FinalizeStageTask::new(self.output_base.clone()));

        let graph = Arc::new(
            GraphBuilder::new("reportforge_workflow")
                .add_task(research_task.clone())
                .add_task(outline_task.clone())
                .add_task(charts_task.clone())
                .add_task(draft_task.clone())
                .add_task(finalize_task.clone())
                .add_edge(research_task.id(), outline_task.id())
                .add_edge(outline_task.id(), charts_task.id())
                .add_edge(charts_task.id(), draft_task.id())
                .add_edge(draft_task.id(), finalize_task.id())
                .set_start_task(research_task.id())
                .build(),
        );

        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        let session = Session::new_from_task(session_id.clone(), research_task.id());
        session
            .context
            .set("topic", options.topic.to_string())
            .await;

        storage
            .save(session)
            .await
            .map_err(|err| anyhow!("failed to persist session: {err}"))?;

        loop {
            let result = runner
                .run(&session_id)
                .await
                .map_err(|err| anyhow!("graph execution failure: {err}"))?;

            match result.status {
                ExecutionStatus::Completed => break,
                ExecutionStatus::WaitingForInput => continue,
                ExecutionStatus::Error(message) => return Err(anyhow!(message)),
            }
        }

        let session = storage
            .get(&session_id)
            .await
            .map_err(|err| anyhow!("failed to reload session: {err}"))?
            .ok_or_else(|| anyhow!("session missing after execution"))?;

        if let Some(error) = session.context.get::<String>("final.error").await {
            return Err(anyhow!(error));
        }

        let summary: String = session
            .context
            .get("final.summary")
            .await
            .unwrap_or_else(|| "No final summary recorded".to_string());
        let output_dir = session
            .context
            .get::<String>("final.output_dir")
            .await
            .map(PathBuf::from);
        let draft: Option<DraftReport> = session.context.get("draft.report").await;

        let log_input = RunLogInput {
            session_id: session_id.clone(),
            topic: options.topic.to_string(),
            summary: summary.clone(),
            output_dir: output_dir.as_ref().map(|dir| dir.display().to_string()),
            source_count: draft
                .as_ref()
                .map(|d| d.metadata.source_count)
                .unwrap_or_default(),
            chart_count: draft
                .as_ref()
                .map(|d| d.metadata.chart_count)
                .unwrap_or_default(),
            word_count: draft
                .as_ref()
                .map(|d| d.metadata.word_count)
                .unwrap_or_default(),
        };
        if let Err(err) = log_run_completion(log_input) {
            warn!(error = %err, "run log entry could not be written");
        }

        info!(%session_id, "report session completed");

        Ok(ReportOutcome {
            session_id,
            summary,
            output_dir,
        })
    }
}
