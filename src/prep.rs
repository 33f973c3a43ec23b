//! Training image preparation pipeline.
//!
//! Turns a directory of raw product photos into tone-training inputs:
//! classify each photo's view, keep only full front and back shots, remove
//! their background, flatten onto white, and write the result. The
//! classification and background-removal backends are injected through the
//! [`ViewClassifier`] and [`BackgroundRemover`] seams.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::classify::{ViewClassifier, ViewKind};
use crate::error::Result;
use crate::image::{ImageData, SUPPORTED_EXTENSIONS};
use crate::subject;

/// Produces a subject cutout with a transparent background.
///
/// Implementations are typically segmentation models; tests use pixel
/// heuristics.
pub trait BackgroundRemover {
    /// Remove the background, returning an RGBA cutout.
    fn remove_background(&self, image: &ImageData) -> Result<ImageData>;
}

/// Counts from one preparation run.
#[derive(Debug, Clone, Default)]
pub struct PrepSummary {
    /// Images found in the input directory.
    pub total: usize,

    /// Front/back images that were background-removed and written.
    pub processed: usize,

    /// Images skipped because their view is not trainable.
    pub skipped: usize,

    /// Images that failed classification or removal.
    pub failed: usize,

    /// How many images landed in each view.
    pub view_counts: BTreeMap<ViewKind, usize>,

    /// Wall-clock time for the run.
    pub elapsed: Duration,
}

/// The preparation pipeline over a pair of backend seams.
pub struct TrainingPrep<C, R> {
    classifier: C,
    remover: R,
    verbose: bool,
}

impl<C: ViewClassifier, R: BackgroundRemover> TrainingPrep<C, R> {
    /// Create a pipeline from a classifier and a background remover.
    #[must_use]
    pub fn new(classifier: C, remover: R) -> Self {
        Self {
            classifier,
            remover,
            verbose: false,
        }
    }

    /// Enable progress output on stderr.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Process every image in `input_dir`, writing results to `output_dir`.
    ///
    /// Output files keep their input file name. Failures on individual
    /// images are reported and counted, not fatal.
    pub fn run(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<PrepSummary> {
        let started = Instant::now();
        let output_dir = output_dir.as_ref();
        std::fs::create_dir_all(output_dir)?;

        let files = image_files(input_dir.as_ref())?;
        let mut summary = PrepSummary {
            total: files.len(),
            ..PrepSummary::default()
        };

        for (i, path) in files.iter().enumerate() {
            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("unnamed");

            match self.process_one(path, output_dir) {
                Ok(Some(kind)) => {
                    *summary.view_counts.entry(kind).or_insert(0) += 1;
                    summary.processed += 1;
                    if self.verbose {
                        eprintln!(
                            "  [{}/{}] {name}: {kind} -> background removed",
                            i + 1,
                            summary.total
                        );
                    }
                }
                Ok(None) => {
                    summary.skipped += 1;
                    if self.verbose {
                        eprintln!("  [{}/{}] {name}: skipped", i + 1, summary.total);
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    eprintln!("warning: {name}: {e}");
                }
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    /// Returns the view kind when the image was written, `None` when skipped.
    fn process_one(&self, path: &Path, output_dir: &Path) -> Result<Option<ViewKind>> {
        let image = ImageData::load(path)?;
        let classification = self.classifier.classify(&image)?;

        if !classification.kind.is_trainable() {
            return Ok(None);
        }

        let cutout = self.remover.remove_background(&image)?;
        let flattened = subject::flatten_onto_white(&cutout);

        let file_name = path.file_name().map(PathBuf::from).unwrap_or_default();
        flattened.save(output_dir.join(file_name))?;
        Ok(Some(classification.kind))
    }
}

/// Image files directly under `dir`, sorted by name.
fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        if SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ViewClassification;
    use imgref::ImgVec;
    use rgb::{RGB8, RGBA8};

    /// Classifies by size: 8 pixels wide means front, else other.
    struct SizeClassifier;

    impl ViewClassifier for SizeClassifier {
        fn classify(&self, image: &ImageData) -> Result<ViewClassification> {
            let kind = if image.width() == 8 {
                ViewKind::Front
            } else {
                ViewKind::Other
            };
            Ok(ViewClassification::new(kind))
        }
    }

    /// Makes near-white pixels transparent.
    struct WhiteRemover;

    impl BackgroundRemover for WhiteRemover {
        fn remove_background(&self, image: &ImageData) -> Result<ImageData> {
            let rgba = image.to_rgba8();
            let (w, h) = (rgba.width(), rgba.height());
            let pixels = rgba
                .pixels()
                .map(|p| {
                    if p.r > 240 && p.g > 240 && p.b > 240 {
                        RGBA8::new(p.r, p.g, p.b, 0)
                    } else {
                        p
                    }
                })
                .collect();
            Ok(ImageData::Rgba8(ImgVec::new(pixels, w, h)))
        }
    }

    fn product_photo(size: usize) -> ImageData {
        let mut pixels = vec![RGB8::new(255, 255, 255); size * size];
        for y in 2..size - 2 {
            for x in 2..size - 2 {
                pixels[y * size + x] = RGB8::new(40, 40, 120);
            }
        }
        ImageData::Rgb8(ImgVec::new(pixels, size, size))
    }

    #[test]
    fn test_pipeline_routes_front_views() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        let output = dir.path().join("prepared");
        std::fs::create_dir_all(&input).unwrap();

        product_photo(8).save(input.join("a_front.png")).unwrap();
        product_photo(8).save(input.join("b_front.png")).unwrap();
        product_photo(6).save(input.join("c_detail.png")).unwrap();
        std::fs::write(input.join("notes.txt"), "x").unwrap();

        let prep = TrainingPrep::new(SizeClassifier, WhiteRemover);
        let summary = prep.run(&input, &output).unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.view_counts.get(&ViewKind::Front), Some(&2));

        assert!(output.join("a_front.png").exists());
        assert!(output.join("b_front.png").exists());
        assert!(!output.join("c_detail.png").exists());
    }

    #[test]
    fn test_output_is_flattened_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw");
        let output = dir.path().join("prepared");
        std::fs::create_dir_all(&input).unwrap();

        product_photo(8).save(input.join("item.png")).unwrap();

        TrainingPrep::new(SizeClassifier, WhiteRemover)
            .run(&input, &output)
            .unwrap();

        let out = ImageData::load(output.join("item.png")).unwrap();
        assert!(!out.has_alpha());
        let rgb = out.to_rgb8_vec();
        // Background stays white, the product patch survives
        assert_eq!(&rgb[..3], &[255, 255, 255]);
        let center = (4 * 8 + 4) * 3;
        assert_eq!(&rgb[center..center + 3], &[40, 40, 120]);
    }

    #[test]
    fn test_missing_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let prep = TrainingPrep::new(SizeClassifier, WhiteRemover);
        assert!(prep
            .run(dir.path().join("absent"), dir.path().join("out"))
            .is_err());
    }
}
