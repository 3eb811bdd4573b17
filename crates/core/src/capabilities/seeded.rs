//! Deterministic mock lead generator.
//!
//! Same seed, same leads: batch `b` of a source always yields the same
//! candidates, which keeps demo runs and tests reproducible.

use async_trait::async_trait;

use super::rng::SplitMix64;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::Lead;
use crate::pipeline::LeadSource;

pub const INDUSTRIES: &[&str] = &[
    "Software",
    "Marketing",
    "Finance",
    "Healthcare",
    "Retail",
    "Manufacturing",
];

pub const COMPANY_SIZES: &[&str] = &["1-10", "11-50", "51-200", "201-500", "501+"];

pub const LOCATIONS: &[&str] = &[
    "San Francisco, CA",
    "New York, NY",
    "Austin, TX",
    "Boston, MA",
    "Seattle, WA",
];

const TITLES: &[&str] = &["CEO", "CTO"];

/// Lowest generated score; scores fall in `60..=99`
pub const MIN_GENERATED_SCORE: u8 = 60;

#[derive(Debug, Clone)]
pub struct SeededLeadSource {
    seed: u64,
    batches: usize,
    batch_size: usize,
}

impl Default for SeededLeadSource {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SeededLeadSource {
    /// Five batches of one lead each
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            batches: 5,
            batch_size: 1,
        }
    }

    pub fn with_batches(mut self, batches: usize) -> Self {
        self.batches = batches;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Candidate number `n` (1-based across all batches)
    pub fn generate(&self, n: u64) -> Lead {
        let mut rng = SplitMix64::keyed(self.seed, &[n]);
        let score = rng.range(u64::from(MIN_GENERATED_SCORE), 100) as u8;

        let mut lead = Lead::new(format!("Lead {}", n), format!("Company {}", n), score);
        lead.title = rng.pick(TITLES).map(|t| t.to_string());
        lead.email = Some(format!("lead{}@company{}.com", n, n));
        lead.phone = Some(format!(
            "+1 (555) {}-{}",
            rng.range(100, 1000),
            rng.range(1000, 10000)
        ));
        lead.linkedin = Some(format!("linkedin.com/in/lead{}", n));
        lead.website = Some(format!("company{}.com", n));
        lead.industry = rng.pick(INDUSTRIES).map(|s| s.to_string());
        lead.employees_bucket = rng.pick(COMPANY_SIZES).map(|s| s.to_string());
        lead.location = rng.pick(LOCATIONS).map(|s| s.to_string());
        lead.last_contact = Some("Never".to_string());
        lead
    }
}

#[async_trait]
impl LeadSource for SeededLeadSource {
    fn name(&self) -> &str {
        "seeded"
    }

    async fn next_batch(&self, _config: &PipelineConfig, batch: usize) -> Result<Option<Vec<Lead>>> {
        if batch >= self.batches {
            return Ok(None);
        }
        let first = (batch * self.batch_size) as u64 + 1;
        let leads = (first..first + self.batch_size as u64)
            .map(|n| self.generate(n))
            .collect();
        Ok(Some(leads))
    }
}
