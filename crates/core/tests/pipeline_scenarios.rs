//! End-to-end runs of the pipeline runner over fixture sources.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_test::{assert_err, assert_ok};

use leadgen_core::pipeline::{
    Confidence, LeadSource, NoPacer, Pacer, VerificationKind, Verifier, VerifierSet,
};
use leadgen_core::{
    ErrorKind, FixtureSource, Lead, PipelineConfig, PipelineError, PipelineEvent,
    PipelineEventKind, PipelinePolicy, PipelineRunner, PipelineState, ScraperOptions,
    SeededLeadSource, StageKind,
};

const SCORES: [u8; 5] = [95, 60, 82, 81, 79];

/// Five batches of one lead each
fn fixture() -> FixtureSource {
    let leads = SCORES
        .iter()
        .enumerate()
        .map(|(i, score)| {
            Lead::new(format!("Lead {}", i + 1), format!("Company {}", i + 1), *score)
                .with_industry("Software")
        })
        .collect();
    FixtureSource::from_leads(leads, 1)
}

fn options(level: &str) -> ScraperOptions {
    ScraperOptions::new("company", "Acme")
        .with_min_quality_score(80)
        .with_enrichment_level(level)
}

fn runner(source: impl LeadSource + 'static) -> PipelineRunner {
    PipelineRunner::new(Arc::new(source)).with_pacer(Arc::new(NoPacer))
}

fn scores(leads: &[Lead]) -> Vec<u8> {
    leads.iter().map(Lead::score).collect()
}

/// Holds the run at the `gate_at`-th pause until released
struct GatedPacer {
    gate_at: usize,
    pauses: AtomicUsize,
    reached: Notify,
    release: Notify,
}

impl GatedPacer {
    fn new(gate_at: usize) -> Arc<Self> {
        Arc::new(Self {
            gate_at,
            pauses: AtomicUsize::new(0),
            reached: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl Pacer for GatedPacer {
    async fn pause(&self, _duration: Duration) {
        let n = self.pauses.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.gate_at {
            self.reached.notify_one();
            self.release.notified().await;
        }
    }
}

#[tokio::test]
async fn basic_run_filters_without_touching_scores() {
    let runner = runner(fixture());
    let report = assert_ok!(runner.start(&options("basic")).await);

    assert_eq!(scores(&report.leads), vec![95, 82, 81]);
    assert_eq!(report.summary.total, 3);
    // fixture leads carry no contact channels
    assert!(report.leads.iter().all(|l| !l.verified));
    let stages: Vec<StageKind> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![StageKind::Acquire, StageKind::Filter, StageKind::Verify]
    );
}

#[tokio::test]
async fn advanced_run_boosts_scores_with_cap() {
    let runner = runner(fixture());
    let report = assert_ok!(runner.start(&options("advanced")).await);
    assert_eq!(scores(&report.leads), vec![100, 87, 86]);
}

#[tokio::test]
async fn premium_run_marks_everything_verified() {
    let runner = runner(fixture());
    let report = assert_ok!(runner.start(&options("premium")).await);
    assert_eq!(report.leads.len(), 3);
    assert!(report.leads.iter().all(|l| l.verified));
    assert_eq!(report.summary.verified, 3);
}

#[tokio::test]
async fn progress_is_monotonic_and_hits_100_only_on_completion() {
    let (tx, mut rx) = mpsc::channel::<PipelineEvent>(256);
    let runner = runner(fixture()).with_event_channel(tx);
    assert_ok!(runner.start(&options("standard")).await);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.first().map(|e| &e.kind), Some(&PipelineEventKind::RunStarted));
    assert_eq!(events.last().map(|e| &e.kind), Some(&PipelineEventKind::RunCompleted));

    let checkpoints: Vec<u8> = events
        .iter()
        .filter(|e| e.kind == PipelineEventKind::StageCompleted)
        .filter_map(|e| e.progress)
        .collect();
    assert_eq!(checkpoints, vec![25, 50, 75, 99]);
    assert!(checkpoints.windows(2).all(|w| w[0] <= w[1]));

    let progress = runner.progress();
    assert_eq!(progress.progress, 100);
    assert!(!progress.running);
    assert_eq!(runner.results().state, PipelineState::Completed);
}

#[tokio::test]
async fn second_start_while_running_is_rejected() {
    let pacer = GatedPacer::new(2);
    let runner = PipelineRunner::new(Arc::new(fixture())).with_pacer(pacer.clone());

    let handle = assert_ok!(runner.spawn(&options("basic")));
    pacer.reached.notified().await;

    let before = runner.results();
    let failure = assert_err!(runner.start(&options("premium")).await);
    assert_eq!(failure.error, PipelineError::AlreadyRunning);
    assert!(failure.partial.is_empty());

    // the in-flight run is untouched
    let after = runner.results();
    assert_eq!(after.run_id, before.run_id);
    assert_eq!(after.state, PipelineState::Running);
    assert_eq!(after.leads.len(), 2);
    assert!(runner.progress().running);

    pacer.release.notify_one();
    let report = assert_ok!(assert_ok!(handle.await));
    assert_eq!(scores(&report.leads), vec![95, 82, 81]);
}

#[tokio::test]
async fn cancel_after_two_batches_keeps_partial_leads() {
    let pacer = GatedPacer::new(2);
    let (tx, mut rx) = mpsc::channel::<PipelineEvent>(256);
    let runner = PipelineRunner::new(Arc::new(fixture()))
        .with_pacer(pacer.clone())
        .with_event_channel(tx);

    let handle = assert_ok!(runner.spawn(&options("standard")));
    pacer.reached.notified().await;
    assert!(runner.cancel());
    pacer.release.notify_one();

    let failure = assert_err!(assert_ok!(handle.await));
    assert_eq!(failure.error, PipelineError::Cancelled);
    assert_eq!(failure.partial.len(), 2);

    let snapshot = runner.results();
    assert_eq!(snapshot.state, PipelineState::Failed);
    assert_eq!(snapshot.leads.len(), 2);
    let info = snapshot.failure.clone().unwrap();
    assert_eq!(info.kind, ErrorKind::Cancelled);
    assert_eq!(info.stage, Some(StageKind::Acquire));

    let progress = runner.progress();
    assert!(!progress.running);
    assert!(progress.progress < 100);

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event.kind);
    }
    assert_eq!(last, Some(PipelineEventKind::RunFailed));

    // cancel with nothing in flight is a no-op
    assert!(!runner.cancel());
}

#[tokio::test]
async fn source_error_fails_run_with_earlier_batches() {
    let runner = runner(fixture().with_failure(3, "HTTP 503 from directory"));
    let failure = assert_err!(runner.start(&options("standard")).await);

    assert_eq!(failure.error.kind(), ErrorKind::Acquisition);
    assert!(failure.error.is_retryable());
    assert_eq!(failure.partial.len(), 3);

    let snapshot = runner.results();
    assert_eq!(snapshot.state, PipelineState::Failed);
    assert_eq!(snapshot.leads.len(), 3);
    assert!(snapshot.failure.as_ref().is_some_and(|f| f.retryable));
    assert!(!runner.is_running());
}

/// Fails batch 1 of the first run only
struct FlakySource {
    inner: FixtureSource,
    tripped: AtomicBool,
}

#[async_trait]
impl LeadSource for FlakySource {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn next_batch(
        &self,
        config: &PipelineConfig,
        batch: usize,
    ) -> leadgen_core::error::Result<Option<Vec<Lead>>> {
        if batch == 1 && !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::acquisition("connection reset"));
        }
        self.inner.next_batch(config, batch).await
    }
}

#[tokio::test]
async fn failed_run_does_not_leak_into_next_run() {
    let runner = runner(FlakySource {
        inner: fixture(),
        tripped: AtomicBool::new(false),
    });

    let failure = assert_err!(runner.start(&options("basic")).await);
    assert_eq!(failure.partial.len(), 1);
    let failed_id = runner.results().run_id.clone();

    let report = assert_ok!(runner.start(&options("basic")).await);
    assert_eq!(scores(&report.leads), vec![95, 82, 81]);

    let snapshot = runner.results();
    assert_eq!(snapshot.state, PipelineState::Completed);
    assert!(snapshot.failure.is_none());
    assert_ne!(snapshot.run_id, failed_id);
    let ids: Vec<u64> = snapshot.leads.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![1, 3, 4]);
}

#[tokio::test]
async fn invalid_options_fail_before_the_run_starts() {
    let runner = runner(fixture());
    let failure = assert_err!(
        runner
            .start(&ScraperOptions::new("company", "Acme").with_min_quality_score(150))
            .await
    );
    assert_eq!(failure.error.kind(), ErrorKind::Config);
    assert_eq!(runner.results().state, PipelineState::Idle);
    assert!(runner.results().run_id.is_none());
}

#[tokio::test]
async fn seeded_source_runs_are_reproducible() {
    let options = ScraperOptions::new("name", "Lead").with_min_quality_score(0);
    let first = assert_ok!(runner(SeededLeadSource::new(99)).start(&options).await);
    let second = assert_ok!(runner(SeededLeadSource::new(99)).start(&options).await);

    assert_eq!(first.leads.len(), 5);
    assert_eq!(first.leads, second.leads);
    assert!(first.leads.iter().all(|l| (60..=99).contains(&l.score())));
}

#[tokio::test]
async fn terminal_state_frees_the_slot_before_events_drain() {
    // room for one event: the reader stops after Verify starts, so
    // RunCompleted is still waiting for space when the run has finished
    let (tx, mut rx) = mpsc::channel::<PipelineEvent>(1);
    let runner = runner(fixture()).with_event_channel(tx);
    let reader = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event.kind == PipelineEventKind::StageStarted && event.stage == Some(StageKind::Verify) {
                break;
            }
        }
        rx
    });

    let first = assert_ok!(runner.spawn(&options("basic")));
    let mut snapshots = runner.subscribe();
    while !snapshots.borrow_and_update().is_finished() {
        assert_ok!(snapshots.changed().await);
    }
    let first_id = runner.results().run_id.clone();
    assert_eq!(runner.results().state, PipelineState::Completed);
    assert!(!runner.progress().running);

    let second = assert_ok!(runner.spawn(&options("basic")));
    assert_ne!(runner.results().run_id, first_id);

    let mut rx = assert_ok!(reader.await);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    let first = assert_ok!(assert_ok!(first.await));
    let second = assert_ok!(assert_ok!(second.await));
    assert_eq!(scores(&first.leads), vec![95, 82, 81]);
    assert_eq!(scores(&second.leads), vec![95, 82, 81]);

    // the first run's teardown leaves the second run's outcome alone
    let snapshot = runner.results();
    assert_eq!(snapshot.run_id.as_deref(), Some(second.run_id.as_str()));
    assert_eq!(snapshot.state, PipelineState::Completed);
    assert_eq!(runner.progress().progress, 100);
}

/// Confirms every channel, holding the run inside the `gate_at`-th check
struct GatedVerifier {
    gate_at: usize,
    checks: AtomicUsize,
    reached: Notify,
    release: Notify,
}

#[async_trait]
impl Verifier for GatedVerifier {
    fn name(&self) -> &str {
        "gated"
    }

    async fn check(
        &self,
        _lead: &Lead,
        _kind: VerificationKind,
    ) -> leadgen_core::error::Result<Confidence> {
        let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.gate_at {
            self.reached.notify_one();
            self.release.notified().await;
        }
        Ok(1.0)
    }
}

#[tokio::test]
async fn cancel_during_verification_keeps_every_lead_in_order() {
    let leads = (1..=5)
        .map(|i| Lead::new(format!("Lead {}", i), "Acme", 90).with_email(format!("lead{}@acme.io", i)))
        .collect();
    let verifier = Arc::new(GatedVerifier {
        gate_at: 3,
        checks: AtomicUsize::new(0),
        reached: Notify::new(),
        release: Notify::new(),
    });
    // one lead in flight at a time
    let policy = PipelinePolicy {
        medium_workers: 1,
        ..PipelinePolicy::default()
    };
    let runner = runner(FixtureSource::from_leads(leads, 5))
        .with_policy(policy)
        .with_verifiers(VerifierSet::new().with_email(verifier.clone()));
    let options = ScraperOptions {
        proxy_settings: Some("dedicated".into()),
        ..ScraperOptions::new("company", "Acme")
            .with_min_quality_score(0)
            .with_enrichment_level("basic")
    };

    let handle = assert_ok!(runner.spawn(&options));
    verifier.reached.notified().await;
    assert_eq!(runner.results().stage, Some(StageKind::Verify));
    assert!(runner.cancel());
    verifier.release.notify_one();

    let failure = assert_err!(assert_ok!(handle.await));
    assert_eq!(failure.error, PipelineError::Cancelled);

    let snapshot = runner.results();
    assert_eq!(snapshot.state, PipelineState::Failed);
    let info = snapshot.failure.clone().unwrap();
    assert_eq!(info.kind, ErrorKind::Cancelled);
    assert_eq!(info.stage, Some(StageKind::Verify));

    // the check in flight at cancel finishes; nothing after it is scheduled
    assert_eq!(verifier.checks.load(Ordering::SeqCst), 3);
    let ids: Vec<u64> = snapshot.leads.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    let verified: Vec<bool> = snapshot.leads.iter().map(|l| l.verified).collect();
    assert_eq!(verified, vec![true, true, true, false, false]);
    assert_eq!(failure.partial, snapshot.leads);
    assert!(!runner.is_running());
}
