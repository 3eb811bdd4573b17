//! # Run Snapshots
//!
//! Immutable views of a run that the runner publishes for readers. A new
//! snapshot replaces the previous one wholesale; readers hold an `Arc` and
//! never observe a half-updated collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::{PipelineState, StageKind};
use crate::error::{ErrorKind, PipelineError};
use crate::models::Lead;
use crate::view::LeadSummary;

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    /// Stage that was executing, if any
    pub stage: Option<StageKind>,
}

impl FailureInfo {
    pub fn new(error: &PipelineError, stage: Option<StageKind>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            retryable: error.is_retryable(),
            stage,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

/// Lead counts around one completed stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageKind,
    pub leads_in: usize,
    pub leads_out: usize,
    pub progress: u8,
}

/// Published state of the current or most recent run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: Option<String>,
    pub state: PipelineState,
    /// Stage currently executing, or the last one reached
    pub stage: Option<StageKind>,
    /// Leads as of the latest batch or stage boundary
    pub leads: Vec<Lead>,
    pub failure: Option<FailureInfo>,
    #[serde(default)]
    pub stages: Vec<StageRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSnapshot {
    /// Fresh snapshot for a run that just entered `Running`
    pub fn started(run_id: &str) -> Self {
        let mut snapshot = Self {
            run_id: Some(run_id.to_string()),
            started_at: Some(Utc::now()),
            ..Self::default()
        };
        snapshot.state.start();
        snapshot
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}

/// What a successful run hands back to its caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub leads: Vec<Lead>,
    pub summary: LeadSummary,
    pub stages: Vec<StageRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
