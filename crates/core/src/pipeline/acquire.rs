//! # Acquire Stage
//!
//! Pulls candidate leads from a [`LeadSource`] one batch at a time, pausing
//! between batches according to the scraping speed. Ids are assigned here in
//! acquisition order.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{PipelineConfig, PipelinePolicy};
use crate::error::{PipelineError, Result, RunFailure};
use crate::models::Lead;

/// External capability producing candidate leads
#[async_trait]
pub trait LeadSource: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Fetch batch number `batch` (0-based). `Ok(None)` means the source is exhausted.
    async fn next_batch(&self, config: &PipelineConfig, batch: usize) -> Result<Option<Vec<Lead>>>;
}

/// Wall-clock pacing between units of external work
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacer;

#[async_trait]
impl Pacer for NoPacer {
    async fn pause(&self, _duration: Duration) {}
}

/// Run the acquire stage.
///
/// `on_batch` sees the whole collection after every batch so partial results
/// can be published. Cancellation is checked before each batch and interrupts
/// pacing waits, but never an in-flight fetch.
pub async fn acquire_leads<F>(
    source: &dyn LeadSource,
    pacer: &dyn Pacer,
    config: &PipelineConfig,
    policy: &PipelinePolicy,
    token: &CancellationToken,
    mut on_batch: F,
) -> std::result::Result<Vec<Lead>, RunFailure>
where
    F: FnMut(usize, &[Lead]),
{
    let delay = policy.batch_delay(config.scraping_speed);
    let mut leads: Vec<Lead> = Vec::new();
    let mut next_id: u64 = 1;

    for batch in 0..policy.max_batches {
        if batch > 0 {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = pacer.pause(delay) => {}
            }
        }
        if token.is_cancelled() {
            return Err(RunFailure::new(PipelineError::Cancelled, leads));
        }

        let candidates = match source.next_batch(config, batch).await {
            Ok(Some(candidates)) => candidates,
            Ok(None) => break,
            Err(e) => return Err(RunFailure::new(e, leads)),
        };

        let received = candidates.len();
        for mut lead in candidates {
            if !lead.is_complete() {
                tracing::warn!(source = source.name(), batch, "Dropping lead without name or company");
                continue;
            }
            lead.id = next_id;
            lead.verified = false;
            next_id += 1;
            leads.push(lead);
        }

        tracing::debug!(source = source.name(), batch, received, total = leads.len(), "Batch acquired");
        on_batch(batch, &leads);
    }

    Ok(leads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperOptions;
    use std::sync::Mutex;

    struct ScriptedSource {
        batches: Vec<Result<Vec<Lead>>>,
    }

    #[async_trait]
    impl LeadSource for ScriptedSource {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn next_batch(&self, _config: &PipelineConfig, batch: usize) -> Result<Option<Vec<Lead>>> {
            match self.batches.get(batch) {
                Some(Ok(leads)) => Ok(Some(leads.clone())),
                Some(Err(e)) => Err(e.clone()),
                None => Ok(None),
            }
        }
    }

    /// Records requested pauses without sleeping
    #[derive(Default)]
    struct RecordingPacer {
        pauses: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Pacer for RecordingPacer {
        async fn pause(&self, duration: Duration) {
            self.pauses.lock().unwrap().push(duration);
        }
    }

    fn config() -> PipelineConfig {
        ScraperOptions::new("company", "Acme")
            .with_scraping_speed("fast")
            .resolve()
            .unwrap()
    }

    fn candidate(name: &str) -> Lead {
        let mut lead = Lead::new(name, "Acme", 90);
        lead.id = 42;
        lead.verified = true;
        lead
    }

    #[tokio::test]
    async fn test_ids_assigned_in_order_and_verified_reset() {
        let source = ScriptedSource {
            batches: vec![
                Ok(vec![candidate("a"), candidate("b")]),
                Ok(vec![candidate("c")]),
            ],
        };
        let pacer = RecordingPacer::default();
        let token = CancellationToken::new();
        let mut seen = Vec::new();

        let leads = acquire_leads(&source, &pacer, &config(), &PipelinePolicy::default(), &token, |batch, so_far| {
            seen.push((batch, so_far.len()))
        })
        .await
        .unwrap();

        let ids: Vec<u64> = leads.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(leads.iter().all(|l| !l.verified));
        assert_eq!(seen, vec![(0, 2), (1, 3)]);
        // one pause between the two batches and one before the exhausted probe
        assert_eq!(
            *pacer.pauses.lock().unwrap(),
            vec![Duration::from_millis(200), Duration::from_millis(200)]
        );
    }

    #[tokio::test]
    async fn test_incomplete_candidates_are_dropped() {
        let source = ScriptedSource {
            batches: vec![Ok(vec![candidate("a"), Lead::new("  ", "Acme", 90), candidate("b")])],
        };
        let token = CancellationToken::new();

        let leads = acquire_leads(&source, &NoPacer, &config(), &PipelinePolicy::default(), &token, |_, _| {})
            .await
            .unwrap();

        assert_eq!(leads.len(), 2);
        assert_eq!(leads[1].id, 2);
    }

    #[tokio::test]
    async fn test_source_error_keeps_earlier_batches() {
        let source = ScriptedSource {
            batches: vec![
                Ok(vec![candidate("a")]),
                Err(PipelineError::acquisition("HTTP 503")),
            ],
        };
        let token = CancellationToken::new();

        let failure = acquire_leads(&source, &NoPacer, &config(), &PipelinePolicy::default(), &token, |_, _| {})
            .await
            .unwrap_err();

        assert_eq!(failure.error, PipelineError::acquisition("HTTP 503"));
        assert_eq!(failure.partial.len(), 1);
    }

    #[tokio::test]
    async fn test_max_batches_caps_endless_sources() {
        let source = ScriptedSource {
            batches: (0..10).map(|i| Ok(vec![candidate(&format!("l{}", i))])).collect(),
        };
        let policy = PipelinePolicy {
            max_batches: 3,
            ..PipelinePolicy::default()
        };
        let token = CancellationToken::new();

        let leads = acquire_leads(&source, &NoPacer, &config(), &policy, &token, |_, _| {})
            .await
            .unwrap();
        assert_eq!(leads.len(), 3);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_acquires_nothing() {
        let source = ScriptedSource {
            batches: vec![Ok(vec![candidate("a")])],
        };
        let token = CancellationToken::new();
        token.cancel();

        let failure = acquire_leads(&source, &NoPacer, &config(), &PipelinePolicy::default(), &token, |_, _| {})
            .await
            .unwrap_err();
        assert_eq!(failure.error, PipelineError::Cancelled);
        assert!(failure.partial.is_empty());
    }
}
