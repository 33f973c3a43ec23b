//! Model training pipeline.
//!
//! This module turns directories of original/ideal image pairs into a
//! trained tone predictor:
//!
//! - [`Trainer`]: Configures and runs a training session
//! - [`cache::SampleCache`]: JSON cache of fitted samples keyed by file stem
//! - [`report::TrainingReport`]: Summary of a completed run
//!
//! Pairs are matched by file stem across the two directories. Fitting runs
//! on a worker pool; fitted samples are cached so reruns only fit new pairs.

pub mod cache;
pub mod report;

pub use cache::{SampleCache, TrainingSample};
pub use report::TrainingReport;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use nanorand::{Pcg64, Rng};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::estimator::ParameterEstimator;
use crate::features;
use crate::forest::{ForestConfig, RandomForest};
use crate::image::{ImageData, SUPPORTED_EXTENSIONS};
use crate::predictor::TonePredictor;

/// An original/ideal pair matched by file stem.
#[derive(Debug, Clone)]
struct PairEntry {
    name: String,
    original: PathBuf,
    ideal: PathBuf,
}

/// Configures and runs a training session.
///
/// # Example
///
/// ```rust,ignore
/// use autotone::train::Trainer;
///
/// let report = Trainer::new("photos/original", "photos/ideal")
///     .model_path("models/tone_predictor.bin")
///     .workers(10)
///     .verbose(true)
///     .train()?;
/// eprintln!("test R^2: {:?}", report.test_score);
/// ```
pub struct Trainer {
    original_dir: PathBuf,
    ideal_dir: PathBuf,
    model_path: PathBuf,
    cache_path: PathBuf,
    seed: u64,
    workers: usize,
    min_samples: usize,
    test_ratio: f64,
    n_trees: usize,
    verbose: bool,
}

impl Trainer {
    /// Create a trainer for the given pair of directories with defaults.
    #[must_use]
    pub fn new(original_dir: impl Into<PathBuf>, ideal_dir: impl Into<PathBuf>) -> Self {
        Self {
            original_dir: original_dir.into(),
            ideal_dir: ideal_dir.into(),
            model_path: PathBuf::from("models/tone_predictor.bin"),
            cache_path: PathBuf::from("models/tone_training_data.json"),
            seed: 42,
            workers: 10,
            min_samples: 10,
            test_ratio: 0.2,
            n_trees: 100,
            verbose: false,
        }
    }

    /// Set where the trained model is written.
    #[must_use]
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = path.into();
        self
    }

    /// Set where the sample cache lives.
    #[must_use]
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Set the seed used for fitting, splitting, and forest training.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of fitting workers.
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the minimum number of samples required to train.
    #[must_use]
    pub fn min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Set the held-out fraction of samples.
    #[must_use]
    pub fn test_ratio(mut self, ratio: f64) -> Self {
        self.test_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Set the number of trees in the forest.
    #[must_use]
    pub fn n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees.max(1);
        self
    }

    /// Enable progress output on stderr.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Run the full pipeline: pair, fit, cache, split, train, save.
    pub fn train(&self) -> Result<TrainingReport> {
        let started = Instant::now();

        let pairs = self.discover_pairs()?;
        if pairs.is_empty() {
            return Err(Error::InsufficientSamples {
                got: 0,
                needed: self.min_samples,
            });
        }

        let mut sample_cache = if self.cache_path.exists() {
            SampleCache::load(&self.cache_path)?
        } else {
            SampleCache::default()
        };

        let (to_fit, n_cached): (Vec<&PairEntry>, usize) = {
            let missing: Vec<&PairEntry> = pairs
                .iter()
                .filter(|p| sample_cache.get(&p.name).is_none())
                .collect();
            let n_cached = pairs.len() - missing.len();
            (missing, n_cached)
        };

        if self.verbose {
            eprintln!(
                "Found {} pairs ({} cached, {} to fit)",
                pairs.len(),
                n_cached,
                to_fit.len()
            );
        }

        let mut n_fitted = 0;
        let mut n_skipped = 0;
        if !to_fit.is_empty() {
            let fitted = self.fit_all(&to_fit)?;
            for (name, result) in fitted {
                match result {
                    Ok(sample) => {
                        sample_cache.upsert(sample);
                        n_fitted += 1;
                    }
                    Err(e) => {
                        eprintln!("warning: skipping {name}: {e}");
                        n_skipped += 1;
                    }
                }
            }
            sample_cache.save(&self.cache_path)?;
        } else if !self.cache_path.exists() {
            sample_cache.save(&self.cache_path)?;
        }

        // Train only on samples backing a currently discovered pair; stale
        // cache entries stay on disk but do not enter the matrix
        let samples: Vec<&TrainingSample> = pairs
            .iter()
            .filter_map(|p| sample_cache.get(&p.name))
            .collect();

        if samples.len() < self.min_samples {
            return Err(Error::InsufficientSamples {
                got: samples.len(),
                needed: self.min_samples,
            });
        }

        let (train_idx, test_idx) = self.split_indices(samples.len());
        let (train_x, train_y) = matrix_from(&samples, &train_idx);
        let (test_x, test_y) = matrix_from(&samples, &test_idx);

        if self.verbose {
            eprintln!(
                "Training forest on {} samples ({} held out)",
                train_idx.len(),
                test_idx.len()
            );
        }

        let config = ForestConfig {
            n_trees: self.n_trees,
            seed: self.seed,
            ..ForestConfig::default()
        };
        let forest = RandomForest::fit(&train_x, &train_y, &config)?;

        let train_score = forest.score(&train_x, &train_y)?;
        let test_score = if test_idx.is_empty() {
            None
        } else {
            Some(forest.score(&test_x, &test_y)?)
        };
        let feature_importances = forest.feature_importances().to_vec();

        let predictor = TonePredictor::from_forest(forest);
        predictor.save(&self.model_path)?;

        Ok(TrainingReport {
            model_path: self.model_path.clone(),
            cache_path: self.cache_path.clone(),
            n_pairs: pairs.len(),
            n_cached,
            n_fitted,
            n_skipped,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            train_score,
            test_score,
            feature_importances,
            elapsed: started.elapsed(),
            timestamp: chrono::Utc::now(),
        })
    }

    /// Fit all pending pairs on a dedicated worker pool.
    fn fit_all(&self, to_fit: &[&PairEntry]) -> Result<Vec<(String, Result<TrainingSample>)>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| Error::Training(e.to_string()))?;

        let total = to_fit.len();
        let progress = Mutex::new(0usize);

        Ok(pool.install(|| {
            to_fit
                .par_iter()
                .map(|pair| {
                    let result = self.fit_pair(pair);
                    if self.verbose {
                        if let Ok(mut done) = progress.lock() {
                            *done += 1;
                            eprintln!("  fitted {}/{}: {}", *done, total, pair.name);
                        }
                    }
                    (pair.name.clone(), result)
                })
                .collect()
        }))
    }

    /// Fit one pair: load both images, extract features, align sizes,
    /// estimate.
    fn fit_pair(&self, pair: &PairEntry) -> Result<TrainingSample> {
        let original = ImageData::load(&pair.original)?;
        let ideal = ImageData::load(&pair.ideal)?;

        // Features describe the original as stored; only the fit needs
        // the pair on common dimensions
        let features = features::extract(&original);
        let (original, ideal) = resize_to_common(original, ideal);
        let fit = ParameterEstimator::new()
            .seed(self.seed)
            .estimate(&original, &ideal)?;

        Ok(TrainingSample {
            name: pair.name.clone(),
            features: features.to_array(),
            params: fit.params,
        })
    }

    /// Match files across the two directories by stem.
    fn discover_pairs(&self) -> Result<Vec<PairEntry>> {
        let originals = index_by_stem(&self.original_dir)?;
        let ideals = index_by_stem(&self.ideal_dir)?;

        let pairs = originals
            .into_iter()
            .filter_map(|(name, original)| {
                ideals.get(&name).map(|ideal| PairEntry {
                    name,
                    original,
                    ideal: ideal.clone(),
                })
            })
            .collect();
        Ok(pairs)
    }

    /// Seeded shuffle split; the held-out count is `ceil(n * test_ratio)`.
    fn split_indices(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = Pcg64::new_seed(u128::from(self.seed));
        for i in (1..n).rev() {
            let j = rng.generate_range(0..=i);
            order.swap(i, j);
        }

        let n_test = ((n as f64) * self.test_ratio).ceil() as usize;
        let n_test = n_test.min(n.saturating_sub(1));
        let test = order.split_off(n - n_test);
        (order, test)
    }
}

/// Resize both images to their common minimum dimensions when they differ.
fn resize_to_common(a: ImageData, b: ImageData) -> (ImageData, ImageData) {
    if a.width() == b.width() && a.height() == b.height() {
        return (a, b);
    }
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());
    (a.resize(width, height), b.resize(width, height))
}

/// Scan one directory level for image files, keyed by stem.
fn index_by_stem(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Training(format!(
            "not a directory: {}",
            dir.display()
        )));
    }

    let mut by_stem = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        if !SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        by_stem.insert(stem.to_string(), path);
    }
    Ok(by_stem)
}

/// Gather feature and target rows for the given sample indices.
fn matrix_from(
    samples: &[&TrainingSample],
    indices: &[usize],
) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let xs = indices
        .iter()
        .map(|&i| samples[i].features.to_vec())
        .collect();
    let ys = indices
        .iter()
        .map(|&i| samples[i].params.to_array().to_vec())
        .collect();
    (xs, ys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::{self, ToneParameters};
    use imgref::Img;
    use rgb::RGB8;

    fn gradient_image(size: usize, offset: usize) -> ImageData {
        let mut pixels = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                let v = ((x + 2 * y + 5 * offset) % 200 + 20) as u8;
                pixels.push(RGB8::new(v, v.saturating_add(10), v.saturating_sub(10)));
            }
        }
        ImageData::Rgb8(Img::new(pixels, size, size))
    }

    fn pair_params(i: usize) -> ToneParameters {
        ToneParameters::new(
            (i % 5) as f64 * 5.0 - 10.0,
            1.0 + (i % 3) as f64 * 0.2,
            0.8 + (i % 4) as f64 * 0.1,
        )
    }

    fn write_pairs(dir: &Path, count: usize) -> (PathBuf, PathBuf) {
        let original_dir = dir.join("original");
        let ideal_dir = dir.join("ideal");
        std::fs::create_dir_all(&original_dir).unwrap();
        std::fs::create_dir_all(&ideal_dir).unwrap();

        for i in 0..count {
            let original = gradient_image(40, i);
            let ideal = tone::adjust(&original, &pair_params(i));
            original
                .save(original_dir.join(format!("item_{i:02}.png")))
                .unwrap();
            ideal.save(ideal_dir.join(format!("item_{i:02}.png"))).unwrap();
        }
        (original_dir, ideal_dir)
    }

    fn test_trainer(dir: &Path, original: &Path, ideal: &Path) -> Trainer {
        Trainer::new(original, ideal)
            .model_path(dir.join("model.bin"))
            .cache_path(dir.join("cache.json"))
            .workers(2)
            .n_trees(10)
    }

    #[test]
    fn test_discover_pairs_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let original_dir = dir.path().join("original");
        let ideal_dir = dir.path().join("ideal");
        std::fs::create_dir_all(&original_dir).unwrap();
        std::fs::create_dir_all(&ideal_dir).unwrap();

        let img = gradient_image(8, 0);
        img.save(original_dir.join("a.png")).unwrap();
        img.save(original_dir.join("b.png")).unwrap();
        img.save(ideal_dir.join("a.jpg")).unwrap();
        img.save(ideal_dir.join("c.png")).unwrap();
        std::fs::write(original_dir.join("notes.txt"), "x").unwrap();

        let trainer = Trainer::new(&original_dir, &ideal_dir);
        let pairs = trainer.discover_pairs().unwrap();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].name, "a");
    }

    #[test]
    fn test_train_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let (original_dir, ideal_dir) = write_pairs(dir.path(), 12);

        let trainer = test_trainer(dir.path(), &original_dir, &ideal_dir);
        let report = trainer.train().unwrap();

        assert_eq!(report.n_pairs, 12);
        assert_eq!(report.n_fitted, 12);
        assert_eq!(report.n_train + report.n_test, 12);
        assert_eq!(report.n_test, 3);
        assert!(dir.path().join("model.bin").exists());
        assert!(dir.path().join("cache.json").exists());

        let predictor = TonePredictor::load(dir.path().join("model.bin")).unwrap();
        let params = predictor.predict(&gradient_image(40, 3)).unwrap();
        assert!((-50.0..=50.0).contains(&params.brightness));
        assert!((0.5..=2.0).contains(&params.contrast));
        assert!((0.5..=2.5).contains(&params.gamma));
    }

    #[test]
    fn test_cache_reused_on_second_run() {
        let dir = tempfile::tempdir().unwrap();
        let (original_dir, ideal_dir) = write_pairs(dir.path(), 11);

        let trainer = test_trainer(dir.path(), &original_dir, &ideal_dir);
        let first = trainer.train().unwrap();
        assert_eq!(first.n_fitted, 11);

        let second = trainer.train().unwrap();
        assert_eq!(second.n_fitted, 0);
        assert_eq!(second.n_cached, 11);
        assert_eq!(second.n_train + second.n_test, 11);
    }

    #[test]
    fn test_insufficient_samples() {
        let dir = tempfile::tempdir().unwrap();
        let (original_dir, ideal_dir) = write_pairs(dir.path(), 3);

        let trainer = test_trainer(dir.path(), &original_dir, &ideal_dir);
        let err = trainer.train().unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientSamples { got: 3, needed: 10 }
        ));
    }

    #[test]
    fn test_split_is_seeded_and_exhaustive() {
        let trainer = Trainer::new("o", "i").seed(9);
        let (train_a, test_a) = trainer.split_indices(20);
        let (train_b, test_b) = trainer.split_indices(20);

        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 4);

        let mut all: Vec<usize> = train_a.iter().chain(&test_a).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_mismatched_pair_sizes_are_aligned() {
        let a = gradient_image(40, 1);
        let b = gradient_image(32, 1);
        let (a2, b2) = resize_to_common(a, b);
        assert_eq!((a2.width(), a2.height()), (32, 32));
        assert_eq!((b2.width(), b2.height()), (32, 32));
    }

    #[test]
    fn test_features_come_from_unresized_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = gradient_image(40, 0);
        let ideal = tone::adjust(&original.resize(32, 32), &pair_params(1));

        let original_path = dir.path().join("item.png");
        let ideal_path = dir.path().join("item_graded.png");
        original.save(&original_path).unwrap();
        ideal.save(&ideal_path).unwrap();

        let trainer = Trainer::new(dir.path(), dir.path());
        let sample = trainer
            .fit_pair(&PairEntry {
                name: "item".into(),
                original: original_path,
                ideal: ideal_path,
            })
            .unwrap();

        // Sample features match the 40x40 file, not the 32x32 fitting copy
        assert_eq!(sample.features, features::extract(&original).to_array());
    }
}
