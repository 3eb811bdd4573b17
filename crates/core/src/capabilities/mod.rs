//! # Capabilities
//!
//! Built-in implementations of the pipeline's external seams: lead sources
//! and verifiers. Production integrations implement the same traits.

pub mod fixture;
pub mod rng;
pub mod seeded;
pub mod verifiers;

pub use fixture::FixtureSource;
pub use seeded::SeededLeadSource;
pub use verifiers::{EmailFormatVerifier, PhoneFormatVerifier, SeededVerifier};
