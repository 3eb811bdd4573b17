//! # Progress Tracker
//!
//! Progress and the running flag share one atomic word so a reader never sees
//! a torn pair and never waits on the writer.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU16, Ordering};

const RUNNING_BIT: u16 = 1 << 8;
const PROGRESS_MASK: u16 = 0xff;
const COMPLETE: u16 = 100;

/// Highest value published while a run is still in flight
const IN_FLIGHT_CEILING: u8 = 99;

/// Point-in-time view of run progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// 0-100
    pub progress: u8,
    pub running: bool,
}

/// Monotonic progress gauge. The runner is the only writer.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    word: AtomicU16,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let word = self.word.load(Ordering::Acquire);
        ProgressSnapshot {
            progress: (word & PROGRESS_MASK) as u8,
            running: word & RUNNING_BIT != 0,
        }
    }

    /// Reset to 0 and mark a run active
    pub(crate) fn begin(&self) {
        self.word.store(RUNNING_BIT, Ordering::Release);
    }

    /// Raise progress to `value`. Never lowers it, and holds below 100 until
    /// [`ProgressTracker::complete`].
    pub(crate) fn advance(&self, value: u8) {
        let target = value.min(IN_FLIGHT_CEILING) as u16;
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let current = word & PROGRESS_MASK;
                (target > current).then_some((word & !PROGRESS_MASK) | target)
            });
    }

    /// Publish 100 and clear the running flag in one store
    pub(crate) fn complete(&self) {
        self.word.store(COMPLETE, Ordering::Release);
    }

    /// Clear the running flag, keeping the last checkpoint
    pub(crate) fn halt(&self) {
        self.word.fetch_and(!RUNNING_BIT, Ordering::AcqRel);
    }
}
