//! # Filter Stage
//!
//! Pure conjunction of the configured criteria. No I/O, no ordering effects.

use crate::config::PipelineConfig;
use crate::models::Lead;

/// Keep the leads that satisfy every configured criterion, in their original order
pub fn filter_leads(leads: &[Lead], config: &PipelineConfig) -> Vec<Lead> {
    leads
        .iter()
        .filter(|lead| matches_criteria(lead, config))
        .cloned()
        .collect()
}

pub fn matches_criteria(lead: &Lead, config: &PipelineConfig) -> bool {
    if lead.score() < config.min_quality_score {
        return false;
    }

    if let Some(industry) = PipelineConfig::restriction(&config.industry) {
        if lead.industry.as_deref() != Some(industry) {
            return false;
        }
    }

    if let Some(size) = PipelineConfig::restriction(&config.company_size) {
        if lead.employees_bucket.as_deref() != Some(size) {
            return false;
        }
    }

    if let Some(location) = PipelineConfig::restriction(&config.location) {
        match lead.location.as_deref() {
            Some(found) if found.contains(location) => {}
            _ => return false,
        }
    }

    true
}
