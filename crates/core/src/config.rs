//! # Pipeline Configuration
//!
//! `ScraperOptions` is what callers send (every field optional so option sets
//! can be layered); `PipelineConfig` is the resolved, validated form a run is
//! started with. Numeric policy lives in `PipelinePolicy`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::models::{EnrichmentLevel, ProxySettings, ScrapingSpeed, SearchType, MAX_SCORE};

pub const DEFAULT_COMPLIANCE_MODE: bool = true;
pub const DEFAULT_MIN_QUALITY_SCORE: u8 = 70;
pub const DEFAULT_RESPECT_ROBOTS_TXT: bool = true;

/// Filter value meaning "no restriction"
pub const FILTER_ALL: &str = "all";

/// User-supplied options, as received from the API, CLI or persisted config
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScraperOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_quality_score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_settings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scraping_speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub respect_robots_txt: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_level: Option<String>,
}

impl ScraperOptions {
    /// Options carrying the two required fields
    pub fn new(search_type: impl Into<String>, search_query: impl Into<String>) -> Self {
        Self {
            search_type: Some(search_type.into()),
            search_query: Some(search_query.into()),
            ..Self::default()
        }
    }

    pub fn with_min_quality_score(mut self, score: u32) -> Self {
        self.min_quality_score = Some(score);
        self
    }

    pub fn with_enrichment_level(mut self, level: impl Into<String>) -> Self {
        self.enrichment_level = Some(level.into());
        self
    }

    pub fn with_scraping_speed(mut self, speed: impl Into<String>) -> Self {
        self.scraping_speed = Some(speed.into());
        self
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_company_size(mut self, size: impl Into<String>) -> Self {
        self.company_size = Some(size.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Overlay every field `other` sets onto `self`
    pub fn merge(&mut self, other: ScraperOptions) {
        if other.search_type.is_some() {
            self.search_type = other.search_type;
        }
        if other.search_query.is_some() {
            self.search_query = other.search_query;
        }
        if other.industry.is_some() {
            self.industry = other.industry;
        }
        if other.company_size.is_some() {
            self.company_size = other.company_size;
        }
        if other.location.is_some() {
            self.location = other.location;
        }
        if other.min_quality_score.is_some() {
            self.min_quality_score = other.min_quality_score;
        }
        if other.compliance_mode.is_some() {
            self.compliance_mode = other.compliance_mode;
        }
        if other.proxy_settings.is_some() {
            self.proxy_settings = other.proxy_settings;
        }
        if other.scraping_speed.is_some() {
            self.scraping_speed = other.scraping_speed;
        }
        if other.respect_robots_txt.is_some() {
            self.respect_robots_txt = other.respect_robots_txt;
        }
        if other.enrichment_level.is_some() {
            self.enrichment_level = other.enrichment_level;
        }
    }

    /// Resolve into a complete, validated configuration
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let search_type = self
            .search_type
            .as_deref()
            .ok_or_else(|| PipelineError::config("searchType is required"))?
            .parse::<SearchType>()?;

        let search_query = self
            .search_query
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        if search_query.is_empty() {
            return Err(PipelineError::config("searchQuery must not be empty"));
        }

        Ok(PipelineConfig {
            search_type,
            search_query: search_query.to_string(),
            industry: non_blank(&self.industry),
            company_size: non_blank(&self.company_size),
            location: non_blank(&self.location),
            min_quality_score: self.resolve_min_quality_score()?,
            compliance_mode: self.compliance_mode.unwrap_or(DEFAULT_COMPLIANCE_MODE),
            proxy_settings: parse_or_default(&self.proxy_settings)?,
            scraping_speed: parse_or_default(&self.scraping_speed)?,
            respect_robots_txt: self.respect_robots_txt.unwrap_or(DEFAULT_RESPECT_ROBOTS_TXT),
            enrichment_level: parse_or_default(&self.enrichment_level)?,
        })
    }

    /// Check only the fields that are set. Partial option sets (persisted
    /// defaults) pass as long as every present value would resolve.
    pub fn validate(&self) -> Result<()> {
        if let Some(raw) = self.search_type.as_deref() {
            raw.parse::<SearchType>()?;
        }
        parse_or_default::<ProxySettings>(&self.proxy_settings)?;
        parse_or_default::<ScrapingSpeed>(&self.scraping_speed)?;
        parse_or_default::<EnrichmentLevel>(&self.enrichment_level)?;
        self.resolve_min_quality_score()?;
        Ok(())
    }

    fn resolve_min_quality_score(&self) -> Result<u8> {
        match self.min_quality_score {
            Some(score) if score > MAX_SCORE as u32 => Err(PipelineError::config(format!(
                "minQualityScore must be between 0 and {}, got {}",
                MAX_SCORE, score
            ))),
            Some(score) => Ok(score as u8),
            None => Ok(DEFAULT_MIN_QUALITY_SCORE),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_or_default<T>(value: &Option<String>) -> Result<T>
where
    T: std::str::FromStr<Err = PipelineError> + Default,
{
    match value.as_deref() {
        Some(raw) => raw.parse(),
        None => Ok(T::default()),
    }
}

/// Fully resolved run parameters. Immutable once a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub search_type: SearchType,
    pub search_query: String,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub location: Option<String>,
    pub min_quality_score: u8,
    /// Consumed by the lead source; the core does not enforce it
    pub compliance_mode: bool,
    pub proxy_settings: ProxySettings,
    pub scraping_speed: ScrapingSpeed,
    pub respect_robots_txt: bool,
    pub enrichment_level: EnrichmentLevel,
}

impl PipelineConfig {
    /// Restriction value for a filter, `None` when unset or "all"
    pub fn restriction(value: &Option<String>) -> Option<&str> {
        value
            .as_deref()
            .filter(|v| *v != FILTER_ALL)
    }
}

/// Tunable policy numbers the orchestration reads instead of inline literals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelinePolicy {
    /// Score added by advanced/premium enrichment
    pub enrichment_score_delta: u8,
    /// Minimum verifier confidence counted as success
    pub verification_threshold: f32,
    /// Hard cap on batches requested from a lead source
    pub max_batches: usize,
    pub slow_delay_ms: u64,
    pub medium_delay_ms: u64,
    pub fast_delay_ms: u64,
    /// Per-lead enrichment pause is the batch delay divided by this
    pub enrichment_delay_divisor: u32,
    /// Per-lead verification pause is the batch delay divided by this
    pub verification_delay_divisor: u32,
    pub slow_workers: usize,
    pub medium_workers: usize,
    pub fast_workers: usize,
    /// Worker cap when requests leave from a single unproxied address
    pub unproxied_worker_cap: usize,
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            enrichment_score_delta: 5,
            verification_threshold: 0.5,
            max_batches: 1_000,
            slow_delay_ms: 1_000,
            medium_delay_ms: 500,
            fast_delay_ms: 200,
            enrichment_delay_divisor: 2,
            verification_delay_divisor: 3,
            slow_workers: 2,
            medium_workers: 4,
            fast_workers: 8,
            unproxied_worker_cap: 2,
        }
    }
}

impl PipelinePolicy {
    /// Pause between acquisition batches
    pub fn batch_delay(&self, speed: ScrapingSpeed) -> Duration {
        let ms = match speed {
            ScrapingSpeed::Slow => self.slow_delay_ms,
            ScrapingSpeed::Medium => self.medium_delay_ms,
            ScrapingSpeed::Fast => self.fast_delay_ms,
        };
        Duration::from_millis(ms)
    }

    pub fn enrichment_delay(&self, speed: ScrapingSpeed) -> Duration {
        self.batch_delay(speed) / self.enrichment_delay_divisor.max(1)
    }

    pub fn verification_delay(&self, speed: ScrapingSpeed) -> Duration {
        self.batch_delay(speed) / self.verification_delay_divisor.max(1)
    }

    /// Bound of the per-lead worker pool used by enrichment and verification
    pub fn worker_limit(&self, speed: ScrapingSpeed, proxy: ProxySettings) -> usize {
        let base = match speed {
            ScrapingSpeed::Slow => self.slow_workers,
            ScrapingSpeed::Medium => self.medium_workers,
            ScrapingSpeed::Fast => self.fast_workers,
        };
        let limit = match proxy {
            ProxySettings::None => base.min(self.unproxied_worker_cap),
            ProxySettings::Dedicated => base,
            ProxySettings::Rotating | ProxySettings::Residential => base * 2,
        };
        limit.max(1)
    }
}
