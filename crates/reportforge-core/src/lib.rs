//! ReportForge core: multi-stage research report generation built on top of
//! `graph_flow`.
//!
//! The pipeline researches a topic across several sources, plans a report
//! outline, renders supporting charts, drafts the sections, and persists a
//! self-contained report bundle.

mod charts;
mod config;
mod error;
mod generate;
mod llm;
mod logging;
mod outline;
mod report;
pub mod research;
mod security;
mod tasks;
mod workflow;

pub use charts::{ChartData, ChartRenderer, ChartSet, ChartStage, JsonSpecRenderer, RenderedChart};
pub use config::{
    Config, ConfigLoader, LlmConfig, LoggingConfig, ReportConfig, ResearchConfig,
    VisualizationConfig,
};
pub use error::{ReportError, StageError};
pub use generate::{DraftReport, ReportGenerator, ReportMetadata};
pub use llm::{ChatMessage, MessageRole, OpenAiCompletion, TextCompletion};
pub use logging::{RunLogInput, log_run_completion, remove_run_logs};
pub use outline::{ChartPlan, OutlinePlanner, ReportPlan, SectionPlan};
pub use report::{PersistedReport, persist_report};
pub use security::{SecretValue, optional_env, require_env};
pub use tasks::{
    ChartsStageTask, DraftStageTask, FinalizeStageTask, OutlineStageTask, ResearchStageTask,
};
pub use workflow::{ReportOutcome, ReportPipeline, SessionOptions};
