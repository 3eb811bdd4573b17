//! Lead source replaying fixed batches, in memory or from a JSON file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::Lead;
use crate::pipeline::LeadSource;

/// Accepted fixture file layouts
#[derive(Deserialize)]
#[serde(untagged)]
enum FixtureFile {
    Batches(Vec<Vec<Lead>>),
    Flat(Vec<Lead>),
}

#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    batches: Vec<Vec<Lead>>,
    /// Batch index that fails instead of yielding, with its message
    failure: Option<(usize, String)>,
}

impl FixtureSource {
    pub fn new(batches: Vec<Vec<Lead>>) -> Self {
        Self {
            batches,
            failure: None,
        }
    }

    /// Split a flat list into batches of `batch_size`
    pub fn from_leads(leads: Vec<Lead>, batch_size: usize) -> Self {
        let batches = leads
            .chunks(batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();
        Self::new(batches)
    }

    /// Parse either an array of batches or a flat array of leads
    pub fn from_json(json: &str, batch_size: usize) -> Result<Self> {
        let file: FixtureFile =
            serde_json::from_str(json).context("Fixture is not a lead array or batch array")?;
        Ok(match file {
            FixtureFile::Batches(batches) => Self::new(batches),
            FixtureFile::Flat(leads) => Self::from_leads(leads, batch_size),
        })
    }

    pub fn load(path: &Path, batch_size: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json(&content, batch_size)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))
    }

    /// Make batch `batch` fail with an acquisition error
    pub fn with_failure(mut self, batch: usize, message: impl Into<String>) -> Self {
        self.failure = Some((batch, message.into()));
        self
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }
}

#[async_trait]
impl LeadSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn next_batch(
        &self,
        _config: &PipelineConfig,
        batch: usize,
    ) -> crate::error::Result<Option<Vec<Lead>>> {
        if let Some((index, message)) = &self.failure {
            if *index == batch {
                return Err(PipelineError::acquisition(message));
            }
        }
        Ok(self.batches.get(batch).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperOptions;

    #[test]
    fn test_flat_json_is_chunked() {
        let json = r#"[
            {"name": "A", "company": "X", "score": 90},
            {"name": "B", "company": "Y", "score": 80},
            {"name": "C", "company": "Z", "score": 140}
        ]"#;
        let source = FixtureSource::from_json(json, 2).unwrap();
        assert_eq!(source.batch_count(), 2);
        assert_eq!(source.batches[1][0].score(), 100);
    }

    #[test]
    fn test_batched_json() {
        let json = r#"[[{"name": "A", "company": "X", "score": 90}], []]"#;
        let source = FixtureSource::from_json(json, 10).unwrap();
        assert_eq!(source.batch_count(), 2);
        assert!(source.batches[1].is_empty());
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(FixtureSource::from_json(r#"{"name": "A"}"#, 1).is_err());
        assert!(FixtureSource::load(Path::new("/definitely/missing.json"), 1).is_err());
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let config = ScraperOptions::new("company", "Acme").resolve().unwrap();
        let source = FixtureSource::from_leads(vec![Lead::new("A", "X", 90); 3], 1)
            .with_failure(1, "HTTP 503");

        assert!(source.next_batch(&config, 0).await.unwrap().is_some());
        assert_eq!(
            source.next_batch(&config, 1).await.unwrap_err(),
            PipelineError::acquisition("HTTP 503")
        );
        assert!(source.next_batch(&config, 3).await.unwrap().is_none());
    }
}
