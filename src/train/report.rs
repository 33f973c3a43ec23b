//! Report types for training runs.
//!
//! This module defines the summary written after a training run, serializable
//! to JSON, plus a CSV export of the fitted sample table.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::ImageFeatures;
use crate::train::cache::TrainingSample;

/// Summary of one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Where the trained model was written.
    pub model_path: PathBuf,

    /// Where the sample cache was written.
    pub cache_path: PathBuf,

    /// Number of original/ideal pairs discovered.
    pub n_pairs: usize,

    /// Pairs reused from the cache.
    pub n_cached: usize,

    /// Pairs fitted during this run.
    pub n_fitted: usize,

    /// Pairs skipped because fitting failed.
    pub n_skipped: usize,

    /// Samples in the training split.
    pub n_train: usize,

    /// Samples in the held-out split.
    pub n_test: usize,

    /// R-squared on the training split.
    pub train_score: f64,

    /// R-squared on the held-out split, when one exists.
    pub test_score: Option<f64>,

    /// Normalized feature importances, in [`ImageFeatures::names`] order.
    pub feature_importances: Vec<f64>,

    /// Wall-clock time for the whole run.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TrainingReport {
    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Feature importances paired with their feature names.
    #[must_use]
    pub fn named_importances(&self) -> Vec<(&'static str, f64)> {
        ImageFeatures::names()
            .into_iter()
            .zip(self.feature_importances.iter().copied())
            .collect()
    }
}

/// Write the fitted sample table as CSV.
pub fn write_samples_csv(samples: &[TrainingSample], path: impl AsRef<Path>) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;

    let mut header = vec!["name"];
    header.extend_from_slice(&ImageFeatures::names());
    header.extend_from_slice(&["brightness", "contrast", "gamma"]);
    wtr.write_record(&header)?;

    for sample in samples {
        let mut record = vec![sample.name.clone()];
        record.extend(sample.features.iter().map(|v| format!("{v:.4}")));
        record.push(format!("{:.4}", sample.params.brightness));
        record.push(format!("{:.4}", sample.params.contrast));
        record.push(format!("{:.4}", sample.params.gamma));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

// Custom serialization for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_COUNT;
    use crate::tone::ToneParameters;

    fn test_report() -> TrainingReport {
        TrainingReport {
            model_path: PathBuf::from("models/tone_predictor.bin"),
            cache_path: PathBuf::from("models/tone_training_data.json"),
            n_pairs: 40,
            n_cached: 30,
            n_fitted: 10,
            n_skipped: 0,
            n_train: 32,
            n_test: 8,
            train_score: 0.95,
            test_score: Some(0.71),
            feature_importances: vec![0.4, 0.2, 0.1, 0.1, 0.1, 0.05, 0.05],
            elapsed: Duration::from_millis(2500),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let report = test_report();
        let json = serde_json::to_string(&report).unwrap();
        let back: TrainingReport = serde_json::from_str(&json).unwrap();

        assert_eq!(back.n_pairs, 40);
        assert_eq!(back.elapsed, Duration::from_millis(2500));
        assert_eq!(
            back.timestamp.timestamp_millis(),
            report.timestamp.timestamp_millis()
        );
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("training.json");

        test_report().write_json(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"train_score\""));
    }

    #[test]
    fn test_named_importances_align() {
        let report = test_report();
        let named = report.named_importances();
        assert_eq!(named.len(), FEATURE_COUNT);
        assert_eq!(named[0].0, "luminance_mean");
        assert!((named[0].1 - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_samples_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");

        let samples = vec![TrainingSample {
            name: "shoe_01".to_string(),
            features: [120.0, 35.0, 0.1, 0.6, 0.3, 40.0, 15.0],
            params: ToneParameters::new(5.0, 1.2, 0.95),
        }];
        write_samples_csv(&samples, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("name,luminance_mean"));
        assert!(header.ends_with("brightness,contrast,gamma"));
        assert!(lines.next().unwrap().starts_with("shoe_01,120.0000"));
    }
}
