//! # Config API
//!
//! Persisted option defaults at `.leadgen/config.json` (or `LEADGEN_CONFIG`).
//! Start requests only need to carry what differs from these.

use anyhow::{Context, Result};
use axum::{extract::State, response::Json};
use leadgen_core::config::{
    DEFAULT_COMPLIANCE_MODE, DEFAULT_MIN_QUALITY_SCORE, DEFAULT_RESPECT_ROBOTS_TXT,
};
use leadgen_core::{EnrichmentLevel, ProxySettings, ScraperOptions, ScrapingSpeed, SearchType};
use serde::Serialize;
use std::path::{Path, PathBuf};
use utoipa::ToSchema;

use super::{ApiError, ApiErrorBody, SharedState};

pub const DEFAULT_CONFIG_PATH: &str = ".leadgen/config.json";

/// Location of the persisted defaults
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `LEADGEN_CONFIG` if set, else `.leadgen/config.json`
    pub fn from_env() -> Self {
        match std::env::var("LEADGEN_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::new(path),
            _ => Self::new(DEFAULT_CONFIG_PATH),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files yield empty defaults
    pub async fn load(&self) -> ScraperOptions {
        if !self.path.exists() {
            return ScraperOptions::default();
        }
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %self.path.display(), "Ignoring malformed config: {}", e);
                ScraperOptions::default()
            }),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read config: {}", e);
                ScraperOptions::default()
            }
        }
    }

    pub async fn save(&self, options: &ScraperOptions) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(options).context("Failed to encode config")?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigResponse {
    /// Persisted defaults (camelCase ScraperOptions)
    #[schema(value_type = Object)]
    pub config: ScraperOptions,
    pub defaults: ConfigDefaults,
}

/// Built-in values and accepted choices for every option
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDefaults {
    pub min_quality_score: u8,
    pub compliance_mode: bool,
    pub respect_robots_txt: bool,
    pub enrichment_level: &'static str,
    pub scraping_speed: &'static str,
    pub proxy_settings: &'static str,
    pub search_types: Vec<&'static str>,
    pub enrichment_levels: Vec<&'static str>,
    pub scraping_speeds: Vec<&'static str>,
    pub proxy_choices: Vec<&'static str>,
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            min_quality_score: DEFAULT_MIN_QUALITY_SCORE,
            compliance_mode: DEFAULT_COMPLIANCE_MODE,
            respect_robots_txt: DEFAULT_RESPECT_ROBOTS_TXT,
            enrichment_level: EnrichmentLevel::default().as_str(),
            scraping_speed: ScrapingSpeed::default().as_str(),
            proxy_settings: ProxySettings::default().as_str(),
            search_types: SearchType::all().iter().map(|s| s.as_str()).collect(),
            enrichment_levels: EnrichmentLevel::all().iter().map(|s| s.as_str()).collect(),
            scraping_speeds: ScrapingSpeed::all().iter().map(|s| s.as_str()).collect(),
            proxy_choices: ProxySettings::all().iter().map(|s| s.as_str()).collect(),
        }
    }
}

/// Get persisted defaults
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Persisted defaults and built-in values", body = ConfigResponse)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        config: state.defaults.read().await.clone(),
        defaults: ConfigDefaults::default(),
    })
}

/// Update persisted defaults (partial merge)
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body(content = Object, description = "ScraperOptions fields to overwrite"),
    responses(
        (status = 200, description = "Updated defaults", body = ConfigResponse),
        (status = 400, description = "A value would not resolve", body = ApiErrorBody)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(updates): Json<ScraperOptions>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let config = {
        let mut defaults = state.defaults.write().await;
        let mut candidate = defaults.clone();
        candidate.merge(updates);
        candidate.validate()?;
        *defaults = candidate.clone();
        candidate
    };

    if let Err(e) = state.store.save(&config).await {
        tracing::warn!("Failed to save config: {:#}", e);
    }

    Ok(Json(ConfigResponse {
        config,
        defaults: ConfigDefaults::default(),
    }))
}
