//! Built-in [`Verifier`]s.
//!
//! The format verifiers only check syntax and answer with full or zero
//! confidence. [`SeededVerifier`] stands in for a probabilistic remote check.

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::rng::SplitMix64;
use crate::error::{PipelineError, Result};
use crate::models::Lead;
use crate::pipeline::{Confidence, VerificationKind, Verifier};

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$";

/// Optional leading `+`, then 7 to 15 digits with common separators
const PHONE_PATTERN: &str = r"^\+?[0-9()\-.\s]{7,20}$";

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .ok_or_else(|| PipelineError::verification(format!("invalid pattern {}", pattern)))
}

fn confidence(pass: bool) -> Confidence {
    if pass {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmailFormatVerifier;

impl EmailFormatVerifier {
    pub fn is_valid(email: &str) -> Result<bool> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        Ok(compiled(&PATTERN, EMAIL_PATTERN)?.is_match(email.trim()))
    }
}

#[async_trait]
impl Verifier for EmailFormatVerifier {
    fn name(&self) -> &str {
        "email_format"
    }

    async fn check(&self, lead: &Lead, kind: VerificationKind) -> Result<Confidence> {
        match kind.value(lead) {
            Some(email) if kind == VerificationKind::Email => Ok(confidence(Self::is_valid(email)?)),
            _ => Ok(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneFormatVerifier;

impl PhoneFormatVerifier {
    pub fn is_valid(phone: &str) -> Result<bool> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let phone = phone.trim();
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        Ok((7..=15).contains(&digits) && compiled(&PATTERN, PHONE_PATTERN)?.is_match(phone))
    }
}

#[async_trait]
impl Verifier for PhoneFormatVerifier {
    fn name(&self) -> &str {
        "phone_format"
    }

    async fn check(&self, lead: &Lead, kind: VerificationKind) -> Result<Confidence> {
        match kind.value(lead) {
            Some(phone) if kind == VerificationKind::Phone => Ok(confidence(Self::is_valid(phone)?)),
            _ => Ok(0.0),
        }
    }
}

/// Reproducible pseudo-random confidence per `(seed, lead, channel)`.
///
/// Confidence is uniform in `0.0..1.0` and passes about `pass_rate` of the
/// time at a 0.5 threshold.
#[derive(Debug, Clone, Copy)]
pub struct SeededVerifier {
    seed: u64,
    pass_rate: f64,
}

impl SeededVerifier {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            pass_rate: 0.8,
        }
    }

    pub fn with_pass_rate(mut self, pass_rate: f64) -> Self {
        self.pass_rate = pass_rate.clamp(0.0, 1.0);
        self
    }
}

#[async_trait]
impl Verifier for SeededVerifier {
    fn name(&self) -> &str {
        "seeded"
    }

    async fn check(&self, lead: &Lead, kind: VerificationKind) -> Result<Confidence> {
        let channel = match kind {
            VerificationKind::Email => 0,
            VerificationKind::Phone => 1,
        };
        let roll = SplitMix64::keyed(self.seed, &[lead.id, channel]).next_f64();
        // rolls below the pass rate land in 0.5..1.0, the rest in 0.0..0.5
        let confidence = if roll < self.pass_rate {
            0.5 + 0.5 * roll / self.pass_rate
        } else {
            0.5 * (roll - self.pass_rate) / (1.0 - self.pass_rate)
        };
        Ok(confidence.clamp(0.0, 1.0) as Confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        for ok in ["lead1@company1.com", "a.b+c@mail.example.co.uk", " x@y.io "] {
            assert!(EmailFormatVerifier::is_valid(ok).unwrap(), "{}", ok);
        }
        for bad in ["lead1@", "@company.com", "no-at-sign.com", "a@b", "a b@c.com"] {
            assert!(!EmailFormatVerifier::is_valid(bad).unwrap(), "{}", bad);
        }
    }

    #[test]
    fn test_phone_format() {
        for ok in ["+1 (555) 123-4567", "555.123.4567", "+442071838750"] {
            assert!(PhoneFormatVerifier::is_valid(ok).unwrap(), "{}", ok);
        }
        for bad in ["123", "call me", "+1 (555) abc-defg", "1234567890123456789"] {
            assert!(!PhoneFormatVerifier::is_valid(bad).unwrap(), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_format_verifier_ignores_other_channel() {
        let lead = Lead::new("A", "X", 90).with_email("a@x.io").with_phone("555-0100-22");
        assert_eq!(
            EmailFormatVerifier.check(&lead, VerificationKind::Email).await.unwrap(),
            1.0
        );
        assert_eq!(
            EmailFormatVerifier.check(&lead, VerificationKind::Phone).await.unwrap(),
            0.0
        );
    }

    #[tokio::test]
    async fn test_seeded_verifier_is_reproducible_and_mostly_passes() {
        let verifier = SeededVerifier::new(3);
        let mut passed = 0;
        for id in 1..=1000u64 {
            let mut lead = Lead::new("A", "X", 90);
            lead.id = id;
            let first = verifier.check(&lead, VerificationKind::Email).await.unwrap();
            let again = verifier.check(&lead, VerificationKind::Email).await.unwrap();
            assert_eq!(first, again);
            assert!((0.0..=1.0).contains(&first));
            if first >= 0.5 {
                passed += 1;
            }
        }
        assert!((700..=900).contains(&passed), "passed {}", passed);
    }
}
