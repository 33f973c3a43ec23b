//! Tone parameter prediction from a trained model.
//!
//! Wraps a [`RandomForest`] together with its training timestamp in a
//! bincode envelope on disk. Prediction extracts image features and runs
//! the forest; outputs are leaf averages of the fitted training targets,
//! so they stay inside the range the estimator produced.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{self, ImageFeatures, FEATURE_COUNT};
use crate::forest::RandomForest;
use crate::image::ImageData;
use crate::tone::ToneParameters;

/// On-disk model envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModel {
    pub forest: RandomForest,
    pub trained_at: DateTime<Utc>,
}

/// Predicts tone parameters for an image using a trained forest.
#[derive(Debug, Clone)]
pub struct TonePredictor {
    model: SavedModel,
}

impl TonePredictor {
    /// Wrap a freshly trained forest, stamping it with the current time.
    #[must_use]
    pub fn from_forest(forest: RandomForest) -> Self {
        Self {
            model: SavedModel {
                forest,
                trained_at: Utc::now(),
            },
        }
    }

    /// Load a model from disk, failing fast when the file is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ModelNotFound {
                path: PathBuf::from(path),
            });
        }
        let reader = BufReader::new(File::open(path)?);
        let model: SavedModel =
            bincode::deserialize_from(reader).map_err(|e| Error::Model(e.to_string()))?;

        if model.forest.n_features() != FEATURE_COUNT || model.forest.n_outputs() != 3 {
            return Err(Error::Model(format!(
                "model shape mismatch: {} features / {} outputs",
                model.forest.n_features(),
                model.forest.n_outputs()
            )));
        }
        Ok(Self { model })
    }

    /// Serialize the model to disk, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &self.model).map_err(|e| Error::Model(e.to_string()))
    }

    /// Extract features from the image and predict its tone parameters.
    pub fn predict(&self, image: &ImageData) -> Result<ToneParameters> {
        self.predict_features(&features::extract(image))
    }

    /// Predict tone parameters from an already extracted feature vector.
    pub fn predict_features(&self, features: &ImageFeatures) -> Result<ToneParameters> {
        let out = self.model.forest.predict(&features.to_array())?;
        Ok(ToneParameters::new(out[0], out[1], out[2]))
    }

    /// When the wrapped forest was trained.
    #[must_use]
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.model.trained_at
    }

    /// The wrapped forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.model.forest
    }
}
