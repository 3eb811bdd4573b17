//! # Enrichment Stage
//!
//! Each lead goes through an [`Enricher`] capability, then the level's score
//! and verification rules are applied on top:
//!
//! - `basic`: stage skipped, leads untouched
//! - `standard`: enricher only
//! - `advanced`: enricher, score + delta (capped at 100)
//! - `premium`: as advanced, and `verified` forced to true

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::acquire::Pacer;
use super::pool::{merge_by_id, run_per_lead};
use super::stage::StageKind;
use crate::config::{PipelineConfig, PipelinePolicy};
use crate::error::{PipelineError, Result, RunFailure};
use crate::models::{EnrichmentLevel, Lead};

/// External capability that augments a lead's attributes
#[async_trait]
pub trait Enricher: Send + Sync {
    fn name(&self) -> &str;

    async fn enrich(&self, lead: Lead, config: &PipelineConfig) -> Result<Lead>;
}

/// Fills in a missing website from the email domain
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactEnricher;

#[async_trait]
impl Enricher for ContactEnricher {
    fn name(&self) -> &str {
        "contact"
    }

    async fn enrich(&self, mut lead: Lead, _config: &PipelineConfig) -> Result<Lead> {
        if lead.website.is_none() {
            lead.website = lead
                .email
                .as_deref()
                .and_then(|email| email.rsplit_once('@'))
                .map(|(_, domain)| domain.trim().to_ascii_lowercase())
                .filter(|domain| !domain.is_empty());
        }
        Ok(lead)
    }
}

/// Apply the level's score and verification rules to one lead
pub fn apply_level_rules(lead: &mut Lead, level: EnrichmentLevel, policy: &PipelinePolicy) {
    if level.boosts_score() {
        lead.raise_score(policy.enrichment_score_delta);
    }
    if level.forces_verified() {
        lead.verified = true;
    }
}

/// Run the enrichment stage over `leads` on a bounded worker pool
pub async fn enrich_leads(
    enricher: Arc<dyn Enricher>,
    pacer: Arc<dyn Pacer>,
    leads: Vec<Lead>,
    config: Arc<PipelineConfig>,
    policy: Arc<PipelinePolicy>,
    token: &CancellationToken,
) -> std::result::Result<Vec<Lead>, RunFailure> {
    let level = config.enrichment_level;
    if !level.runs_enrichment() {
        return Ok(leads);
    }

    let delay = policy.enrichment_delay(config.scraping_speed);
    let limit = policy.worker_limit(config.scraping_speed, config.proxy_settings);

    let outcome = run_per_lead(StageKind::Enrich, &leads, limit, token, |lead| {
        let enricher = enricher.clone();
        let pacer = pacer.clone();
        let config = config.clone();
        let policy = policy.clone();
        async move {
            let id = lead.id;
            pacer.pause(delay).await;
            let mut enriched = enricher.enrich(lead, &config).await?;
            enriched.id = id;
            apply_level_rules(&mut enriched, level, &policy);
            Ok(enriched)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperOptions;
    use crate::pipeline::acquire::NoPacer;

    fn leads(scores: &[u8]) -> Vec<Lead> {
        scores
            .iter()
            .enumerate()
            .map(|(i, score)| {
                let mut lead = Lead::new(format!("Lead {}", i), "Acme", *score)
                    .with_email(format!("lead{}@Acme.io", i));
                lead.id = i as u64 + 1;
                lead
            })
            .collect()
    }

    fn config(level: &str) -> Arc<PipelineConfig> {
        Arc::new(
            ScraperOptions::new("company", "Acme")
                .with_enrichment_level(level)
                .resolve()
                .unwrap(),
        )
    }

    async fn run(level: &str, input: Vec<Lead>) -> std::result::Result<Vec<Lead>, RunFailure> {
        enrich_leads(
            Arc::new(ContactEnricher),
            Arc::new(NoPacer),
            input,
            config(level),
            Arc::new(PipelinePolicy::default()),
            &CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_basic_is_a_no_op() {
        let input = leads(&[95, 82, 81]);
        let output = run("basic", input.clone()).await.unwrap();
        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_standard_keeps_scores() {
        let output = run("standard", leads(&[95, 82])).await.unwrap();
        let scores: Vec<u8> = output.iter().map(Lead::score).collect();
        assert_eq!(scores, vec![95, 82]);
        assert_eq!(output[0].website.as_deref(), Some("acme.io"));
        assert!(!output[0].verified);
    }

    #[tokio::test]
    async fn test_advanced_adds_delta_with_cap() {
        let output = run("advanced", leads(&[95, 82, 81])).await.unwrap();
        let scores: Vec<u8> = output.iter().map(Lead::score).collect();
        assert_eq!(scores, vec![100, 87, 86]);
        assert!(output.iter().all(|l| !l.verified));
    }

    #[tokio::test]
    async fn test_premium_forces_verified() {
        let output = run("premium", leads(&[70, 99])).await.unwrap();
        assert!(output.iter().all(|l| l.verified));
        assert_eq!(output[1].score(), 100);
    }

    struct FailingEnricher;

    #[async_trait]
    impl Enricher for FailingEnricher {
        fn name(&self) -> &str {
            "failing"
        }

        async fn enrich(&self, lead: Lead, _config: &PipelineConfig) -> Result<Lead> {
            if lead.id == 2 {
                Err(PipelineError::enrichment("provider quota exceeded"))
            } else {
                Ok(lead)
            }
        }
    }

    #[tokio::test]
    async fn test_enricher_error_surfaces_with_leads() {
        let input = leads(&[90, 91, 92]);
        let failure = enrich_leads(
            Arc::new(FailingEnricher),
            Arc::new(NoPacer),
            input,
            config("advanced"),
            Arc::new(PipelinePolicy::default()),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert_eq!(
            failure.error,
            PipelineError::enrichment("provider quota exceeded")
        );
        assert_eq!(failure.partial.len(), 3);
        assert!(failure.partial.iter().all(|l| l.score() <= 100));
    }
}
