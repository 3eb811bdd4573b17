//! Bounded per-lead worker pool shared by the enrichment and verification stages.
//!
//! Results are keyed by lead id, so completion order never leaks into the
//! final ordering of leads.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::stage::StageKind;
use crate::error::{PipelineError, Result};
use crate::models::Lead;

/// What came back from one pass over the leads
#[derive(Debug)]
pub(crate) struct PoolOutcome<T> {
    /// Finished work, by lead id
    pub results: HashMap<u64, T>,
    /// First error reported by a unit of work
    pub error: Option<PipelineError>,
    /// Scheduling stopped because the run was cancelled
    pub cancelled: bool,
}

impl<T> Default for PoolOutcome<T> {
    fn default() -> Self {
        Self {
            results: HashMap::new(),
            error: None,
            cancelled: false,
        }
    }
}

impl<T> PoolOutcome<T> {
    fn record(&mut self, stage: StageKind, joined: std::result::Result<(u64, Result<T>), JoinError>) {
        match joined {
            Ok((id, Ok(value))) => {
                self.results.insert(id, value);
            }
            Ok((id, Err(e))) => {
                tracing::warn!(stage = %stage, lead_id = id, error = %e, "Lead work failed");
                self.error.get_or_insert(e);
            }
            Err(e) => {
                self.error
                    .get_or_insert_with(|| stage.error(format!("worker task failed: {}", e)));
            }
        }
    }
}

/// Run `work` for every lead with at most `limit` units in flight.
///
/// Cancellation and the first error stop new work from being scheduled;
/// work already in flight always runs to completion.
pub(crate) async fn run_per_lead<T, F, Fut>(
    stage: StageKind,
    leads: &[Lead],
    limit: usize,
    token: &CancellationToken,
    work: F,
) -> PoolOutcome<T>
where
    T: Send + 'static,
    F: Fn(Lead) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();
    let mut outcome = PoolOutcome::default();

    for lead in leads {
        if outcome.error.is_some() {
            break;
        }
        if token.is_cancelled() {
            outcome.cancelled = true;
            break;
        }

        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => {
                outcome.cancelled = true;
                break;
            }
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    outcome.error = Some(stage.error(e));
                    break;
                }
            },
        };

        while let Some(joined) = tasks.try_join_next() {
            outcome.record(stage, joined);
        }
        if outcome.error.is_some() {
            break;
        }

        let id = lead.id;
        let unit = work(lead.clone());
        tasks.spawn(async move {
            let _permit = permit;
            (id, unit.await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        outcome.record(stage, joined);
    }

    outcome
}

/// Replace each lead with its processed counterpart, keeping the input order
pub(crate) fn merge_by_id(leads: Vec<Lead>, mut processed: HashMap<u64, Lead>) -> Vec<Lead> {
    leads
        .into_iter()
        .map(|lead| processed.remove(&lead.id).unwrap_or(lead))
        .collect()
}
