//! # Pipeline Stages
//!
//! Run lifecycle state machine and the ordered stage plan.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::models::EnrichmentLevel;

/// Lifecycle of a single run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// No run has started yet
    #[default]
    Idle,
    /// Stages are executing
    Running,
    /// All stages finished
    Completed,
    /// A stage errored or the run was cancelled
    Failed,
}

impl PipelineState {
    /// Enter `Running`. Refused while a run is already in flight.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        *self = PipelineState::Running;
        true
    }

    /// `Running -> Completed`
    pub fn complete(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        *self = PipelineState::Completed;
        true
    }

    /// `Running -> Failed`
    pub fn fail(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        *self = PipelineState::Failed;
        true
    }

    pub fn is_running(&self) -> bool {
        *self == PipelineState::Running
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Running => "running",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Pull candidate leads from the lead source
    Acquire,
    /// Drop leads that miss the configured criteria
    Filter,
    /// Augment leads according to the enrichment level
    Enrich,
    /// Run contact verifiers
    Verify,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Acquire => "acquire",
            StageKind::Filter => "filter",
            StageKind::Enrich => "enrich",
            StageKind::Verify => "verify",
        }
    }

    /// Error raised when this stage's own machinery breaks (e.g. a worker panics)
    pub fn error(&self, message: impl std::fmt::Display) -> PipelineError {
        match self {
            StageKind::Acquire | StageKind::Filter => PipelineError::acquisition(message),
            StageKind::Enrich => PipelineError::enrichment(message),
            StageKind::Verify => PipelineError::verification(message),
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered stages for one run, with the progress checkpoint each one reaches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<StageKind>,
}

impl StagePlan {
    /// Enrichment is left out entirely for `basic`
    pub fn for_level(level: EnrichmentLevel) -> Self {
        let mut stages = vec![StageKind::Acquire, StageKind::Filter];
        if level.runs_enrichment() {
            stages.push(StageKind::Enrich);
        }
        stages.push(StageKind::Verify);
        Self { stages }
    }

    pub fn stages(&self) -> &[StageKind] {
        &self.stages
    }

    pub fn contains(&self, stage: StageKind) -> bool {
        self.stages.contains(&stage)
    }

    /// Progress value once `stage` completes; evenly spaced, last stage is 100
    pub fn checkpoint(&self, stage: StageKind) -> u8 {
        let total = self.stages.len();
        let position = self
            .stages
            .iter()
            .position(|s| *s == stage)
            .map(|i| i + 1)
            .unwrap_or(0);
        ((position * 100 + total / 2) / total) as u8
    }
}
