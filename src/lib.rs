//! # autotone
//!
//! Automatic tone adjustment for e-commerce product photos.
//!
//! The library learns how a retoucher grades product shots: given pairs of
//! original and hand-graded images, it fits a per-pair brightness/contrast/
//! gamma tone curve, trains a regression forest from image statistics to
//! those parameters, and then predicts and applies the grade for new photos.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use autotone::{ImageData, TonePredictor, tone};
//!
//! let predictor = TonePredictor::load("models/tone_predictor.bin")?;
//!
//! let image = ImageData::load("photos/incoming/shirt.jpg")?;
//! let params = predictor.predict(&image)?;
//! tone::adjust(&image, &params).save("photos/adjusted/shirt.jpg")?;
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`image`]: Pixel containers, file I/O, resampling, mask compositing
//! - [`tone`]: The parametric tone curve and its application
//! - [`features`]: 7-dimensional image statistics
//! - [`estimator`]: Bounded least-squares fitting of tone parameters
//! - [`forest`]: Multi-output random forest regression
//! - [`predictor`]: Model persistence and parameter prediction
//! - [`train`]: Training orchestration, sample cache, reports
//! - [`subject`]: Subject centering, edge refinement, shadows, flattening
//! - [`classify`]: View and background classification seams
//! - [`prep`]: Training image preparation pipeline

pub mod classify;
pub mod error;
pub mod estimator;
pub mod features;
pub mod forest;
pub mod image;
pub mod predictor;
pub mod prep;
pub mod subject;
pub mod tone;
pub mod train;

// Re-export commonly used types
pub use classify::{
    BackgroundClassification, BackgroundKind, PixelBackgroundClassifier, ViewClassification,
    ViewClassifier, ViewKind,
};
pub use error::{Error, Result};
pub use estimator::{FitReport, ParameterEstimator, PARAM_BOUNDS};
pub use features::{ImageFeatures, FEATURE_COUNT};
pub use forest::{ForestConfig, RandomForest};
pub use image::{ImageData, Mask};
pub use predictor::{SavedModel, TonePredictor};
pub use prep::{BackgroundRemover, PrepSummary, TrainingPrep};
pub use tone::ToneParameters;
pub use train::{SampleCache, Trainer, TrainingReport, TrainingSample};
