//! # Leadgen Core
//!
//! The lead acquisition pipeline: option resolution, the staged run
//! (acquire, filter, enrich, verify), progress tracking and result views.
//! Transport lives in the server crate.
//!
//! ## Architecture
//!
//! - `config` - Raw options, resolved run config and numeric policy
//! - `models` - Lead record and option enums
//! - `pipeline/` - Stages, worker pool, progress tracker and the runner
//! - `capabilities/` - Built-in lead sources and verifiers
//! - `view` - Display-time queries and summaries over results
//!
//! ## Usage
//!
//! ```rust,ignore
//! use leadgen_core::{PipelineRunner, ScraperOptions, SeededLeadSource};
//!
//! let runner = PipelineRunner::new(Arc::new(SeededLeadSource::new(7)));
//! let report = runner.start(&ScraperOptions::new("company", "Acme")).await?;
//! ```

pub mod capabilities;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod view;

pub use capabilities::{
    EmailFormatVerifier, FixtureSource, PhoneFormatVerifier, SeededLeadSource, SeededVerifier,
};
pub use config::{PipelineConfig, PipelinePolicy, ScraperOptions};
pub use error::{ErrorCategory, ErrorKind, PipelineError, RunFailure};
pub use models::{EnrichmentLevel, Lead, ProxySettings, ScrapingSpeed, SearchType};
pub use pipeline::{
    PipelineEvent, PipelineEventKind, PipelineRunner, PipelineState, ProgressSnapshot,
    RunReport, RunSnapshot, StageKind,
};
pub use view::{LeadQuery, LeadSummary};
