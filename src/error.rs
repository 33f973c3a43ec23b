//! Error types for autotone operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for autotone operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during tone estimation, training, and prediction.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Failed to load an image file.
    #[error("Image load failed: {path}: {reason}")]
    ImageLoad {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Failed to save an image file.
    #[error("Image save failed: {path}: {reason}")]
    ImageSave {
        /// Path the image was being written to.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Image dimensions don't match between original and reference images.
    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        /// Expected dimensions (width, height).
        expected: (usize, usize),
        /// Actual dimensions (width, height).
        actual: (usize, usize),
    },

    /// No pixel pairs survived the saturated/near-black filter.
    #[error("No usable pixel pairs after filtering clipped extremes")]
    NoUsablePixels,

    /// Dataset is too small to train a usable model.
    #[error("Insufficient training samples: got {got}, need at least {needed}")]
    InsufficientSamples {
        /// Number of samples collected.
        got: usize,
        /// Minimum number required.
        needed: usize,
    },

    /// The persisted model file does not exist.
    #[error("Model not found: {path}")]
    ModelNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// Model persistence or inference error.
    #[error("Model error: {0}")]
    Model(String),

    /// Dataset-level training error.
    #[error("Training error: {0}")]
    Training(String),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
