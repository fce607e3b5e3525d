use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Core error type for ReportForge.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("external call failed: {0}")]
    ExternalCall(String),
    #[error("research synthesis failed: {0}")]
    Synthesis(String),
    #[error("failed to persist report artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReportError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    pub fn artifact(path: PathBuf, source: std::io::Error) -> Self {
        Self::Artifact { path, source }
    }
}

/// Error describing a failed stage within the report workflow.
#[derive(Debug, Clone)]
pub struct StageError {
    pub stage: String,
    pub reason: String,
}

impl StageError {
    pub fn new(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.reason)
    }
}

impl std::error::Error for StageError {}
