//! Read-side views over a lead collection: ad-hoc narrowing for display and
//! headline numbers.

use serde::{Deserialize, Serialize};

use crate::models::{Lead, SearchType};

/// Display-time narrowing of results. Never changes what a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadQuery {
    /// Free text, matched case-insensitively
    pub text: Option<String>,
    /// Field the text is matched against; all three when unset
    pub search_type: Option<SearchType>,
    pub verified_only: bool,
    pub min_score: Option<u8>,
}

impl LeadQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = Some(search_type);
        self
    }

    pub fn verified_only(mut self) -> Self {
        self.verified_only = true;
        self
    }

    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        if self.verified_only && !lead.verified {
            return false;
        }
        if self.min_score.is_some_and(|min| lead.score() < min) {
            return false;
        }

        let needle = match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_lowercase(),
            _ => return true,
        };
        let contains = |value: &str| value.to_lowercase().contains(&needle);

        match self.search_type {
            Some(SearchType::Company) => contains(&lead.company),
            Some(SearchType::Name) => contains(&lead.name),
            Some(SearchType::Title) => lead.title.as_deref().is_some_and(contains),
            None => {
                contains(&lead.company)
                    || contains(&lead.name)
                    || lead.title.as_deref().is_some_and(contains)
            }
        }
    }

    /// Matching leads, in their original order
    pub fn apply<'a>(&self, leads: &'a [Lead]) -> Vec<&'a Lead> {
        leads.iter().filter(|lead| self.matches(lead)).collect()
    }
}

/// Headline numbers for a lead collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    pub total: usize,
    pub verified: usize,
    /// Mean score, 0 for an empty collection
    pub average_score: f64,
}

impl LeadSummary {
    pub fn of<'a>(leads: impl IntoIterator<Item = &'a Lead>) -> Self {
        let mut total = 0usize;
        let mut verified = 0usize;
        let mut score_sum = 0u64;
        for lead in leads {
            total += 1;
            if lead.verified {
                verified += 1;
            }
            score_sum += u64::from(lead.score());
        }
        let average_score = if total == 0 {
            0.0
        } else {
            score_sum as f64 / total as f64
        };
        Self {
            total,
            verified,
            average_score,
        }
    }
}
