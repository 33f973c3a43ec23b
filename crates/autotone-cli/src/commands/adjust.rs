//! Adjustment command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use autotone::{tone, ImageData, TonePredictor};

use crate::commands::{collect_image_files, display_name};

pub fn run(model: PathBuf, inputs: Vec<PathBuf>, suffix: &str, verbose: bool) -> Result<()> {
    let predictor = TonePredictor::load(&model)
        .with_context(|| format!("Failed to load model from {}", model.display()))?;

    let files = collect_image_files(&inputs)?;
    if files.is_empty() {
        anyhow::bail!("no supported images found");
    }

    let total = files.len();
    let mut failed = 0usize;
    for (i, path) in files.iter().enumerate() {
        if verbose {
            println!("{:=<60}", "");
            println!("File: {}", display_name(path));
        } else {
            eprint!("\rAdjusting {}/{}: {}", i + 1, total, display_name(path));
        }

        match adjust_one(&predictor, path, suffix, verbose) {
            Ok(output) => {
                if verbose {
                    println!("Saved: {}", output.display());
                }
            }
            Err(e) => {
                failed += 1;
                if !verbose {
                    eprintln!();
                }
                eprintln!("warning: {}: {e:#}", display_name(path));
            }
        }
    }
    if !verbose {
        eprintln!("\rAdjusted {} images                    ", total - failed);
    }

    println!("Adjusted {} of {} images", total - failed, total);
    if failed > 0 {
        anyhow::bail!("{failed} images failed");
    }
    Ok(())
}

fn adjust_one(
    predictor: &TonePredictor,
    path: &Path,
    suffix: &str,
    verbose: bool,
) -> Result<PathBuf> {
    let image = ImageData::load(path)?;
    if verbose {
        println!("Size: {}x{}", image.width(), image.height());
    }

    let params = predictor.predict(&image)?;
    if verbose {
        println!("Predicted parameters:");
        println!("  Brightness: {:.2}", params.brightness);
        println!("  Contrast:   {:.2}", params.contrast);
        println!("  Gamma:      {:.2}", params.gamma);
    }

    let adjusted = tone::adjust(&image, &params);
    let output = output_path(path, suffix);
    adjusted.save(&output)?;
    Ok(output)
}

/// `photo.jpg` with suffix `_adjusted` becomes `photo_adjusted.jpg`.
fn output_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    let ext = path
        .extension()
        .map_or_else(String::new, |e| format!(".{}", e.to_string_lossy()));
    path.with_file_name(format!("{stem}{suffix}{ext}"))
}

#[cfg(test)]
mod tests {
    use super::output_path;

    use std::path::Path;

    #[test]
    fn test_output_path_keeps_extension() {
        let out = output_path(Path::new("photos/shirt.jpg"), "_adjusted");
        assert_eq!(out, Path::new("photos/shirt_adjusted.jpg"));
    }

    #[test]
    fn test_output_path_without_extension() {
        let out = output_path(Path::new("photos/shirt"), "_adjusted");
        assert_eq!(out, Path::new("photos/shirt_adjusted"));
    }
}
