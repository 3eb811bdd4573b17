//! # Pipeline Events
//!
//! Lifecycle events a runner emits while it works. The server bridges them to
//! SSE subscribers; tests can inspect them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::StageKind;

/// Kind of pipeline event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Run accepted and state moved to running
    RunStarted,
    /// A stage began
    StageStarted,
    /// One acquisition batch arrived
    BatchAcquired,
    /// A stage finished and its checkpoint was published
    StageCompleted,
    /// Run reached `Completed`
    RunCompleted,
    /// Run reached `Failed` (including cancellation)
    RunFailed,
}

/// An event in a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Unique event ID
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: PipelineEventKind,
    /// Run this event belongs to
    pub run_id: String,
    #[serde(default)]
    pub stage: Option<StageKind>,
    /// Progress after this event
    #[serde(default)]
    pub progress: Option<u8>,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    pub fn new(kind: PipelineEventKind, run_id: &str) -> Self {
        Self {
            id: new_id(),
            timestamp: Utc::now(),
            kind,
            run_id: run_id.to_string(),
            stage: None,
            progress: None,
            data: None,
        }
    }

    pub fn with_stage(mut self, stage: StageKind) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Time-ordered unique ID for runs and events
pub(crate) fn new_id() -> String {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos();
    format!("{:x}-{:08x}", nanos, rand_u32())
}

/// Simple random number (not cryptographic)
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u32
}
