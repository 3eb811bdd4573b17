//! # Lead Models
//!
//! The candidate record flowing through the pipeline, plus the option enums
//! callers pick from when configuring a run.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::PipelineError;

/// Upper bound of the quality score scale
pub const MAX_SCORE: u8 = 100;

/// A candidate contact/company record
///
/// `score` is private so the `0..=100` range can only be changed through
/// [`Lead::set_score`] and [`Lead::raise_score`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Assigned by the runner at acquisition
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contact: Option<String>,
    #[serde(deserialize_with = "deserialize_score")]
    score: u8,
    #[serde(default)]
    pub verified: bool,
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(0, MAX_SCORE as i64) as u8)
}

impl Lead {
    /// Create an unverified lead with the given quality score (clamped to 100)
    pub fn new(name: impl Into<String>, company: impl Into<String>, score: u8) -> Self {
        Self {
            id: 0,
            name: name.into(),
            title: None,
            company: company.into(),
            email: None,
            phone: None,
            linkedin: None,
            website: None,
            industry: None,
            employees_bucket: None,
            location: None,
            last_contact: None,
            score: score.min(MAX_SCORE),
            verified: false,
        }
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn set_score(&mut self, score: u8) {
        self.score = score.min(MAX_SCORE);
    }

    /// Add `delta` to the score, saturating at 100
    pub fn raise_score(&mut self, delta: u8) {
        self.set_score(self.score.saturating_add(delta));
    }

    /// Name and company are both present
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.company.trim().is_empty()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_employees_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.employees_bucket = Some(bucket.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Which lead attribute the search query targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Company,
    Name,
    Title,
}

impl SearchType {
    pub fn all() -> Vec<SearchType> {
        vec![SearchType::Company, SearchType::Name, SearchType::Title]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Company => "company",
            SearchType::Name => "name",
            SearchType::Title => "title",
        }
    }
}

impl FromStr for SearchType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "company" => Ok(SearchType::Company),
            "name" => Ok(SearchType::Name),
            "title" => Ok(SearchType::Title),
            other => Err(PipelineError::config(format!(
                "unknown search type '{}' (expected company, name or title)",
                other
            ))),
        }
    }
}

/// Proxy strategy handed to the lead source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProxySettings {
    None,
    #[default]
    Rotating,
    Dedicated,
    Residential,
}

impl ProxySettings {
    pub fn all() -> Vec<ProxySettings> {
        vec![
            ProxySettings::None,
            ProxySettings::Rotating,
            ProxySettings::Dedicated,
            ProxySettings::Residential,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxySettings::None => "none",
            ProxySettings::Rotating => "rotating",
            ProxySettings::Dedicated => "dedicated",
            ProxySettings::Residential => "residential",
        }
    }

}

impl FromStr for ProxySettings {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ProxySettings::None),
            "rotating" => Ok(ProxySettings::Rotating),
            "dedicated" => Ok(ProxySettings::Dedicated),
            "residential" => Ok(ProxySettings::Residential),
            other => Err(PipelineError::config(format!(
                "unknown proxy setting '{}'",
                other
            ))),
        }
    }
}

/// Acquisition pacing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScrapingSpeed {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl ScrapingSpeed {
    pub fn all() -> Vec<ScrapingSpeed> {
        vec![ScrapingSpeed::Slow, ScrapingSpeed::Medium, ScrapingSpeed::Fast]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapingSpeed::Slow => "slow",
            ScrapingSpeed::Medium => "medium",
            ScrapingSpeed::Fast => "fast",
        }
    }
}

impl FromStr for ScrapingSpeed {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "slow" => Ok(ScrapingSpeed::Slow),
            "medium" => Ok(ScrapingSpeed::Medium),
            "fast" => Ok(ScrapingSpeed::Fast),
            other => Err(PipelineError::config(format!(
                "unknown scraping speed '{}'",
                other
            ))),
        }
    }
}

/// How much augmentation each lead receives
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentLevel {
    Basic,
    #[default]
    Standard,
    Advanced,
    Premium,
}

impl EnrichmentLevel {
    pub fn all() -> Vec<EnrichmentLevel> {
        vec![
            EnrichmentLevel::Basic,
            EnrichmentLevel::Standard,
            EnrichmentLevel::Advanced,
            EnrichmentLevel::Premium,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentLevel::Basic => "basic",
            EnrichmentLevel::Standard => "standard",
            EnrichmentLevel::Advanced => "advanced",
            EnrichmentLevel::Premium => "premium",
        }
    }

    /// The enrichment stage runs at all
    pub fn runs_enrichment(&self) -> bool {
        !matches!(self, EnrichmentLevel::Basic)
    }

    /// Score boost applies
    pub fn boosts_score(&self) -> bool {
        matches!(self, EnrichmentLevel::Advanced | EnrichmentLevel::Premium)
    }

    /// Every lead is marked verified regardless of verifier outcome
    pub fn forces_verified(&self) -> bool {
        matches!(self, EnrichmentLevel::Premium)
    }
}

impl FromStr for EnrichmentLevel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(EnrichmentLevel::Basic),
            "standard" => Ok(EnrichmentLevel::Standard),
            "advanced" => Ok(EnrichmentLevel::Advanced),
            "premium" => Ok(EnrichmentLevel::Premium),
            other => Err(PipelineError::config(format!(
                "unknown enrichment level '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_is_clamped() {
        let mut lead = Lead::new("Ada", "Acme", 250);
        assert_eq!(lead.score(), 100);

        lead.set_score(98);
        lead.raise_score(5);
        assert_eq!(lead.score(), 100);

        lead.set_score(80);
        lead.raise_score(5);
        assert_eq!(lead.score(), 85);
    }

    #[test]
    fn test_lead_serialization_uses_camel_case() {
        let lead = Lead::new("Ada", "Acme", 90).with_employees_bucket("11-50");
        let json = serde_json::to_string(&lead).unwrap();
        assert!(json.contains("\"employeesBucket\":\"11-50\""));
        assert!(json.contains("\"score\":90"));
        assert!(!json.contains("lastContact"));
    }

    #[test]
    fn test_deserialized_score_is_clamped() {
        let lead: Lead =
            serde_json::from_str(r#"{"name":"Ada","company":"Acme","score":140}"#).unwrap();
        assert_eq!(lead.score(), 100);
        assert!(!lead.verified);

        let lead: Lead =
            serde_json::from_str(r#"{"name":"Ada","company":"Acme","score":-3}"#).unwrap();
        assert_eq!(lead.score(), 0);
    }

    #[test]
    fn test_option_parsing() {
        assert_eq!("title".parse::<SearchType>().unwrap(), SearchType::Title);
        assert!("email".parse::<SearchType>().is_err());
        // choices are exact literals
        assert!("Title".parse::<SearchType>().is_err());
        assert!(" company ".parse::<SearchType>().is_err());
        assert!("Premium".parse::<EnrichmentLevel>().is_err());
        assert_eq!("fast".parse::<ScrapingSpeed>().unwrap(), ScrapingSpeed::Fast);
        assert_eq!(
            "residential".parse::<ProxySettings>().unwrap(),
            ProxySettings::Residential
        );
        assert!("ultra".parse::<EnrichmentLevel>().is_err());
    }

    #[test]
    fn test_enrichment_level_rules() {
        assert!(!EnrichmentLevel::Basic.runs_enrichment());
        assert!(EnrichmentLevel::Standard.runs_enrichment());
        assert!(!EnrichmentLevel::Standard.boosts_score());
        assert!(EnrichmentLevel::Advanced.boosts_score());
        assert!(EnrichmentLevel::Premium.forces_verified());
        assert!(!EnrichmentLevel::Advanced.forces_verified());
    }
}
