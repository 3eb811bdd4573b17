//! # Verification Stage
//!
//! Contact channels are checked by pluggable [`Verifier`]s. A lead counts as
//! verified when it has at least one checkable channel and every checked
//! channel reaches the policy threshold. A low confidence is an outcome, not
//! an error; only a verifier that fails to answer raises `VerificationError`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::acquire::Pacer;
use super::pool::{merge_by_id, run_per_lead};
use super::stage::StageKind;
use crate::config::{PipelineConfig, PipelinePolicy};
use crate::error::{PipelineError, Result, RunFailure};
use crate::models::Lead;

/// Verifier confidence in `0.0..=1.0`
pub type Confidence = f32;

/// Contact channel being verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    Email,
    Phone,
}

impl VerificationKind {
    pub fn all() -> Vec<VerificationKind> {
        vec![VerificationKind::Email, VerificationKind::Phone]
    }

    /// The lead's value for this channel, if present
    pub fn value<'a>(&self, lead: &'a Lead) -> Option<&'a str> {
        let value = match self {
            VerificationKind::Email => lead.email.as_deref(),
            VerificationKind::Phone => lead.phone.as_deref(),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationKind::Email => "email",
            VerificationKind::Phone => "phone",
        }
    }
}

/// External capability reporting confidence in one contact channel
#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &str;

    async fn check(&self, lead: &Lead, kind: VerificationKind) -> Result<Confidence>;
}

/// Verifier registered per contact channel
#[derive(Clone, Default)]
pub struct VerifierSet {
    email: Option<Arc<dyn Verifier>>,
    phone: Option<Arc<dyn Verifier>>,
}

impl std::fmt::Debug for VerifierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierSet")
            .field("email", &self.email.as_ref().map(|v| v.name().to_string()))
            .field("phone", &self.phone.as_ref().map(|v| v.name().to_string()))
            .finish()
    }
}

impl VerifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_email(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.email = Some(verifier);
        self
    }

    pub fn with_phone(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.phone = Some(verifier);
        self
    }

    pub fn get(&self, kind: VerificationKind) -> Option<&Arc<dyn Verifier>> {
        match kind {
            VerificationKind::Email => self.email.as_ref(),
            VerificationKind::Phone => self.phone.as_ref(),
        }
    }

    /// Decide whether `lead` is verified
    pub async fn evaluate(&self, lead: &Lead, threshold: Confidence) -> Result<bool> {
        let mut checked = 0;
        for kind in VerificationKind::all() {
            let (Some(verifier), Some(_)) = (self.get(kind), kind.value(lead)) else {
                continue;
            };
            let confidence = verifier.check(lead, kind).await?;
            checked += 1;
            if confidence < threshold {
                return Ok(false);
            }
        }
        Ok(checked > 0)
    }
}

/// Run the verification stage over `leads` on a bounded worker pool
pub async fn verify_leads(
    verifiers: VerifierSet,
    pacer: Arc<dyn Pacer>,
    leads: Vec<Lead>,
    config: Arc<PipelineConfig>,
    policy: Arc<PipelinePolicy>,
    token: &CancellationToken,
) -> std::result::Result<Vec<Lead>, RunFailure> {
    let forced = config.enrichment_level.forces_verified();
    let delay = policy.verification_delay(config.scraping_speed);
    let limit = policy.worker_limit(config.scraping_speed, config.proxy_settings);
    let threshold = policy.verification_threshold;

    let outcome = run_per_lead(StageKind::Verify, &leads, limit, token, |mut lead| {
        let verifiers = verifiers.clone();
        let pacer = pacer.clone();
        async move {
            if forced {
                lead.verified = true;
                return Ok(lead);
            }
            pacer.pause(delay).await;
            lead.verified = verifiers.evaluate(&lead, threshold).await?;
            Ok(lead)
        }
    })
    .await;

    let error = outcome.error;
    let cancelled = outcome.cancelled;
    let merged = merge_by_id(leads, outcome.results);

    match error {
        Some(e) => Err(RunFailure::new(e, merged)),
        None if cancelled => Err(RunFailure::new(PipelineError::Cancelled, merged)),
        None => Ok(merged),
    }
}
