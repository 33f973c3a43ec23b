//! On-disk cache of fitted training samples.
//!
//! Fitting tone parameters for a pair takes orders of magnitude longer than
//! extracting features, so fitted samples are cached as a JSON manifest and
//! reused across training runs. Samples are keyed by the file stem shared
//! between the original and ideal image.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::FEATURE_COUNT;
use crate::tone::ToneParameters;

/// One fitted training pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    /// File stem shared by the original and ideal image.
    pub name: String,

    /// Feature vector extracted from the original image.
    pub features: [f64; FEATURE_COUNT],

    /// Tone parameters fitted against the ideal image.
    pub params: ToneParameters,
}

/// A manifest of fitted samples, serialized to JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleCache {
    /// Cached samples.
    pub samples: Vec<TrainingSample>,
}

impl SampleCache {
    /// Load a cache from a JSON manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let cache: SampleCache = serde_json::from_str(&content)?;
        Ok(cache)
    }

    /// Save the cache to a JSON manifest file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Look up a cached sample by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TrainingSample> {
        self.samples.iter().find(|s| s.name == name)
    }

    /// Insert a sample, replacing any existing entry with the same name.
    pub fn upsert(&mut self, sample: TrainingSample) {
        if let Some(existing) = self.samples.iter_mut().find(|s| s.name == sample.name) {
            *existing = sample;
        } else {
            self.samples.push(sample);
        }
    }

    /// Number of cached samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
