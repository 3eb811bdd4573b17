//! # Pipeline Runner
//!
//! Drives one run at a time through Acquire → Filter → Enrich → Verify.
//!
//! The runner is cheap to clone; clones share the same run slot, progress
//! tracker and published snapshot, so a clone handed to an HTTP handler can
//! cancel or poll a run started elsewhere.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::acquire::{acquire_leads, LeadSource, Pacer, TokioPacer};
use super::enrich::{enrich_leads, ContactEnricher, Enricher};
use super::events::{new_id, PipelineEvent, PipelineEventKind};
use super::filter::filter_leads;
use super::progress::{ProgressSnapshot, ProgressTracker};
use super::snapshot::{FailureInfo, RunReport, RunSnapshot, StageRecord};
use super::stage::{StageKind, StagePlan};
use super::verify::{verify_leads, VerifierSet};
use crate::capabilities::verifiers::{EmailFormatVerifier, PhoneFormatVerifier};
use crate::config::{PipelineConfig, PipelinePolicy, ScraperOptions};
use crate::error::{PipelineError, RunFailure};
use crate::models::Lead;
use crate::view::LeadSummary;

type StageResult<T> = std::result::Result<T, (StageKind, RunFailure)>;

/// The run holding the slot
struct ActiveRun {
    run_id: String,
    token: CancellationToken,
}

/// State shared by every clone of a runner
struct RunShared {
    progress: ProgressTracker,
    snapshot: watch::Sender<Arc<RunSnapshot>>,
    /// `Some` from `spawn` until the run publishes its terminal snapshot
    active: Mutex<Option<ActiveRun>>,
}

impl RunShared {
    fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(RunSnapshot::default()));
        Self {
            progress: ProgressTracker::new(),
            snapshot,
            active: Mutex::new(None),
        }
    }

    /// Take the run slot, or refuse if a run already holds it
    fn claim(&self, run_id: &str) -> Result<CancellationToken, PipelineError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        let token = CancellationToken::new();
        *active = Some(ActiveRun {
            run_id: run_id.to_string(),
            token: token.clone(),
        });
        Ok(token)
    }

    /// Apply the terminal transition of `run_id` and free the slot under the
    /// same lock, so a caller that observes the terminal state can start the
    /// next run. No-op once `run_id` no longer holds the slot.
    fn settle(&self, run_id: &str, terminal: impl FnOnce(&RunShared)) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.as_ref().is_some_and(|run| run.run_id == run_id) {
            return false;
        }
        terminal(self);
        *active = None;
        true
    }

    fn cancel(&self) -> bool {
        match self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(run) => {
                run.token.cancel();
                true
            }
            None => false,
        }
    }

    fn publish(&self, snapshot: RunSnapshot) {
        self.snapshot.send_replace(Arc::new(snapshot));
    }

    fn update(&self, f: impl FnOnce(&mut RunSnapshot)) {
        self.snapshot.send_modify(|current| f(Arc::make_mut(current)));
    }
}

/// Frees the run slot when a run task panics or is dropped before it
/// settled on its own.
struct RunGuard {
    shared: Arc<RunShared>,
    run_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let abandoned = self.shared.settle(&self.run_id, |shared| {
            shared.update(|snap| {
                let stage = snap.stage.unwrap_or(StageKind::Acquire);
                if snap.state.fail() {
                    let error = stage.error("run ended unexpectedly");
                    snap.failure = Some(FailureInfo::new(&error, Some(stage)));
                    snap.finished_at = Some(Utc::now());
                }
            });
            shared.progress.halt();
        });
        if abandoned {
            tracing::warn!(run_id = %self.run_id, "Run task ended without settling");
        }
    }
}

/// The lead pipeline runner
#[derive(Clone)]
pub struct PipelineRunner {
    source: Arc<dyn LeadSource>,
    enricher: Arc<dyn Enricher>,
    verifiers: VerifierSet,
    pacer: Arc<dyn Pacer>,
    policy: Arc<PipelinePolicy>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
    shared: Arc<RunShared>,
}

impl PipelineRunner {
    /// Create a runner over `source` with format verifiers, the contact
    /// enricher, real-time pacing and the default policy
    pub fn new(source: Arc<dyn LeadSource>) -> Self {
        Self {
            source,
            enricher: Arc::new(ContactEnricher),
            verifiers: VerifierSet::new()
                .with_email(Arc::new(EmailFormatVerifier))
                .with_phone(Arc::new(PhoneFormatVerifier)),
            pacer: Arc::new(TokioPacer),
            policy: Arc::new(PipelinePolicy::default()),
            event_tx: None,
            shared: Arc::new(RunShared::new()),
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_verifiers(mut self, verifiers: VerifierSet) -> Self {
        self.verifiers = verifiers;
        self
    }

    /// Replace wall-clock pacing (tests use `NoPacer`)
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_policy(mut self, policy: PipelinePolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Set event channel for streaming lifecycle events
    pub fn with_event_channel(mut self, tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Current progress; never blocks
    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.progress.snapshot()
    }

    /// Current (possibly partial) leads plus terminal state once finished
    pub fn results(&self) -> Arc<RunSnapshot> {
        self.shared.snapshot.borrow().clone()
    }

    /// Receiver that sees every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<RunSnapshot>> {
        self.shared.snapshot.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.progress().running
    }

    /// Request cooperative cancellation. Returns whether a run was in flight.
    pub fn cancel(&self) -> bool {
        let cancelled = self.shared.cancel();
        if cancelled {
            tracing::info!("Cancellation requested");
        }
        cancelled
    }

    /// Start a run and wait for it to finish
    pub async fn start(&self, options: &ScraperOptions) -> Result<RunReport, RunFailure> {
        let handle = self.spawn(options)?;
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let snapshot = self.results();
                let stage = snapshot.stage.unwrap_or(StageKind::Acquire);
                Err(RunFailure::new(
                    stage.error(format!("run task failed: {}", e)),
                    snapshot.leads.clone(),
                ))
            }
        }
    }

    /// Validate options, take the run slot and start the run in the background.
    ///
    /// Fails with `Config` or `AlreadyRunning` before touching any run state.
    pub fn spawn(
        &self,
        options: &ScraperOptions,
    ) -> Result<JoinHandle<Result<RunReport, RunFailure>>, PipelineError> {
        let config = Arc::new(options.resolve()?);
        let run_id = new_id();
        let token = self.shared.claim(&run_id)?;
        let guard = RunGuard {
            shared: self.shared.clone(),
            run_id: run_id.clone(),
        };

        self.shared.progress.begin();
        self.shared.publish(RunSnapshot::started(&run_id));

        let runner = self.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            runner.execute(run_id, config, token).await
        }))
    }

    #[tracing::instrument(skip_all, fields(run_id = %run_id, search_type = config.search_type.as_str(), query = %config.search_query))]
    async fn execute(
        &self,
        run_id: String,
        config: Arc<PipelineConfig>,
        token: CancellationToken,
    ) -> Result<RunReport, RunFailure> {
        let plan = StagePlan::for_level(config.enrichment_level);
        tracing::info!(
            stages = plan.stages().len(),
            enrichment = config.enrichment_level.as_str(),
            "Pipeline run started"
        );
        self.emit(
            PipelineEvent::new(PipelineEventKind::RunStarted, &run_id)
                .with_progress(0)
                .with_data(serde_json::to_value(config.as_ref()).unwrap_or_default()),
        )
        .await;

        match self.run_stages(&run_id, &plan, config, &token).await {
            Ok(leads) => Ok(self.finish_completed(&run_id, leads).await),
            Err((stage, failure)) => Err(self.finish_failed(&run_id, stage, failure).await),
        }
    }

    async fn run_stages(
        &self,
        run_id: &str,
        plan: &StagePlan,
        config: Arc<PipelineConfig>,
        token: &CancellationToken,
    ) -> StageResult<Vec<Lead>> {
        // Acquire
        self.enter_stage(run_id, StageKind::Acquire).await;
        let leads = acquire_leads(
            self.source.as_ref(),
            self.pacer.as_ref(),
            &config,
            &self.policy,
            token,
            |batch, so_far| self.batch_acquired(run_id, batch, so_far),
        )
        .await
        .map_err(|failure| (StageKind::Acquire, failure))?;
        self.complete_stage(run_id, plan, StageKind::Acquire, leads.len(), &leads)
            .await;

        // Filter
        let leads = self.checkpoint_cancel(StageKind::Filter, token, leads)?;
        self.enter_stage(run_id, StageKind::Filter).await;
        let before = leads.len();
        let leads = filter_leads(&leads, &config);
        self.complete_stage(run_id, plan, StageKind::Filter, before, &leads)
            .await;

        // Enrich
        let leads = if plan.contains(StageKind::Enrich) {
            let leads = self.checkpoint_cancel(StageKind::Enrich, token, leads)?;
            self.enter_stage(run_id, StageKind::Enrich).await;
            let before = leads.len();
            let leads = enrich_leads(
                self.enricher.clone(),
                self.pacer.clone(),
                leads,
                config.clone(),
                self.policy.clone(),
                token,
            )
            .await
            .map_err(|failure| (StageKind::Enrich, failure))?;
            self.complete_stage(run_id, plan, StageKind::Enrich, before, &leads)
                .await;
            leads
        } else {
            tracing::debug!("Enrichment skipped for basic level");
            leads
        };

        // Verify
        let leads = self.checkpoint_cancel(StageKind::Verify, token, leads)?;
        self.enter_stage(run_id, StageKind::Verify).await;
        let before = leads.len();
        let leads = verify_leads(
            self.verifiers.clone(),
            self.pacer.clone(),
            leads,
            config,
            self.policy.clone(),
            token,
        )
        .await
        .map_err(|failure| (StageKind::Verify, failure))?;
        self.complete_stage(run_id, plan, StageKind::Verify, before, &leads)
            .await;

        Ok(leads)
    }

    /// Stage boundary: stop here if cancellation was requested
    fn checkpoint_cancel(
        &self,
        next: StageKind,
        token: &CancellationToken,
        leads: Vec<Lead>,
    ) -> StageResult<Vec<Lead>> {
        if token.is_cancelled() {
            return Err((next, RunFailure::new(PipelineError::Cancelled, leads)));
        }
        Ok(leads)
    }

    async fn enter_stage(&self, run_id: &str, stage: StageKind) {
        tracing::debug!(stage = %stage, "Stage started");
        self.shared.update(|snap| snap.stage = Some(stage));
        self.emit(PipelineEvent::new(PipelineEventKind::StageStarted, run_id).with_stage(stage))
            .await;
    }

    fn batch_acquired(&self, run_id: &str, batch: usize, so_far: &[Lead]) {
        self.shared.update(|snap| snap.leads = so_far.to_vec());
        self.try_emit(
            PipelineEvent::new(PipelineEventKind::BatchAcquired, run_id)
                .with_stage(StageKind::Acquire)
                .with_data(serde_json::json!({ "batch": batch, "leads": so_far.len() })),
        );
    }

    async fn complete_stage(
        &self,
        run_id: &str,
        plan: &StagePlan,
        stage: StageKind,
        leads_in: usize,
        leads: &[Lead],
    ) {
        let checkpoint = plan.checkpoint(stage);
        self.shared.update(|snap| {
            snap.leads = leads.to_vec();
            snap.stages.push(StageRecord {
                stage,
                leads_in,
                leads_out: leads.len(),
                progress: checkpoint,
            });
        });
        self.shared.progress.advance(checkpoint);

        tracing::info!(stage = %stage, leads_in, leads_out = leads.len(), "Stage completed");
        self.emit(
            PipelineEvent::new(PipelineEventKind::StageCompleted, run_id)
                .with_stage(stage)
                .with_progress(self.progress().progress)
                .with_data(serde_json::json!({ "leads_in": leads_in, "leads_out": leads.len() })),
        )
        .await;
    }

    async fn finish_completed(&self, run_id: &str, leads: Vec<Lead>) -> RunReport {
        let finished_at = Utc::now();
        let mut stages = Vec::new();
        let mut started_at = finished_at;
        self.shared.settle(run_id, |shared| {
            shared.update(|snap| {
                snap.state.complete();
                snap.leads = leads.clone();
                snap.finished_at = Some(finished_at);
                stages = snap.stages.clone();
                started_at = snap.started_at.unwrap_or(finished_at);
            });
            // 100 is only ever visible alongside `Completed`
            shared.progress.complete();
        });

        let summary = LeadSummary::of(&leads);
        tracing::info!(
            leads = summary.total,
            verified = summary.verified,
            "Pipeline run completed"
        );
        self.emit(
            PipelineEvent::new(PipelineEventKind::RunCompleted, run_id)
                .with_progress(100)
                .with_data(serde_json::to_value(&summary).unwrap_or_default()),
        )
        .await;

        RunReport {
            run_id: run_id.to_string(),
            leads,
            summary,
            stages,
            started_at,
            finished_at,
        }
    }

    async fn finish_failed(&self, run_id: &str, stage: StageKind, failure: RunFailure) -> RunFailure {
        let info = FailureInfo::new(&failure.error, Some(stage));
        let reached = self.progress().progress;
        self.shared.settle(run_id, |shared| {
            shared.update(|snap| {
                snap.state.fail();
                snap.stage = Some(stage);
                snap.leads = failure.partial.clone();
                snap.failure = Some(info.clone());
                snap.finished_at = Some(Utc::now());
            });
            shared.progress.halt();
        });

        if info.is_cancelled() {
            tracing::info!(stage = %stage, leads = failure.partial.len(), "Pipeline run cancelled");
        } else {
            tracing::warn!(stage = %stage, error = %failure.error, leads = failure.partial.len(), "Pipeline run failed");
        }
        self.emit(
            PipelineEvent::new(PipelineEventKind::RunFailed, run_id)
                .with_stage(stage)
                .with_progress(reached)
                .with_data(serde_json::to_value(&info).unwrap_or_default()),
        )
        .await;

        failure
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Non-blocking emit for synchronous callbacks; drops the event when the channel is full
    fn try_emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.event_tx {
            if let Err(e) = tx.try_send(event) {
                tracing::debug!("Dropped pipeline event: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("source", &self.source.name())
            .field("enricher", &self.enricher.name())
            .field("verifiers", &self.verifiers)
            .field("policy", &self.policy)
            .field("progress", &self.progress())
            .finish()
    }
}
