//! # Pipeline Errors
//!
//! Error taxonomy for the lead pipeline. Stage errors terminate a run and are
//! handed back to the caller unchanged; the core never retries on its own.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Lead;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Pipeline is already running")]
    AlreadyRunning,

    #[error("Lead acquisition failed: {0}")]
    Acquisition(String),

    #[error("Lead enrichment failed: {0}")]
    Enrichment(String),

    #[error("Lead verification failed: {0}")]
    Verification(String),

    #[error("Pipeline run was cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    pub fn acquisition<E: std::fmt::Display>(e: E) -> Self {
        Self::Acquisition(e.to_string())
    }

    pub fn enrichment<E: std::fmt::Display>(e: E) -> Self {
        Self::Enrichment(e.to_string())
    }

    pub fn verification<E: std::fmt::Display>(e: E) -> Self {
        Self::Verification(e.to_string())
    }

    /// Serializable tag for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::AlreadyRunning => ErrorKind::AlreadyRunning,
            PipelineError::Acquisition(_) => ErrorKind::Acquisition,
            PipelineError::Enrichment(_) => ErrorKind::Enrichment,
            PipelineError::Verification(_) => ErrorKind::Verification,
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Acquisition(_) => ErrorCategory::Transient,
            PipelineError::Cancelled => ErrorCategory::Aborted,
            _ => ErrorCategory::Permanent,
        }
    }

    /// Whether an outside caller may reasonably retry the whole run
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Tag identifying which part of the taxonomy an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    AlreadyRunning,
    Acquisition,
    Enrichment,
    Verification,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::AlreadyRunning => "already_running",
            ErrorKind::Acquisition => "acquisition",
            ErrorKind::Enrichment => "enrichment",
            ErrorKind::Verification => "verification",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error category for retry decisions made outside the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// External source hiccup - the caller may retry the run
    Transient,
    /// Bad input or broken capability - retrying will not help
    Permanent,
    /// Cooperative abort requested by the caller
    Aborted,
}

/// A failed run: the stage error, verbatim, plus whatever leads were collected
#[derive(Error, Debug, Clone)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: PipelineError,
    pub partial: Vec<Lead>,
}

impl RunFailure {
    pub fn new(error: PipelineError, partial: Vec<Lead>) -> Self {
        Self { error, partial }
    }
}

impl From<PipelineError> for RunFailure {
    fn from(error: PipelineError) -> Self {
        Self::new(error, Vec::new())
    }
}
