//! # Lead Pipeline
//!
//! Stage execution and run orchestration.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Lead Source → Acquire → Filter → Enrich (skipped for basic) → Verify
//! ```

pub mod acquire;
pub mod enrich;
pub mod events;
pub mod filter;
mod pool;
pub mod progress;
pub mod runner;
pub mod snapshot;
pub mod stage;
pub mod verify;

pub use acquire::{acquire_leads, LeadSource, NoPacer, Pacer, TokioPacer};
pub use enrich::{apply_level_rules, enrich_leads, ContactEnricher, Enricher};
pub use events::{PipelineEvent, PipelineEventKind};
pub use filter::{filter_leads, matches_criteria};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use runner::PipelineRunner;
pub use snapshot::{FailureInfo, RunReport, RunSnapshot, StageRecord};
pub use stage::{PipelineState, StageKind, StagePlan};
pub use verify::{verify_leads, Confidence, VerificationKind, Verifier, VerifierSet};
