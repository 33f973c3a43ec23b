//! Single-pair estimation command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use autotone::{ImageData, ParameterEstimator};

pub fn run(original: PathBuf, ideal: PathBuf, seed: u64, verbose: bool) -> Result<()> {
    let mut original_image = ImageData::load(&original)
        .with_context(|| format!("Failed to load {}", original.display()))?;
    let mut ideal_image = ImageData::load(&ideal)
        .with_context(|| format!("Failed to load {}", ideal.display()))?;

    // Mismatched pairs are aligned to the smaller dimensions before fitting.
    if (original_image.width(), original_image.height())
        != (ideal_image.width(), ideal_image.height())
    {
        let width = original_image.width().min(ideal_image.width());
        let height = original_image.height().min(ideal_image.height());
        if verbose {
            eprintln!("Resizing both images to {width}x{height}");
        }
        original_image = original_image.resize(width, height);
        ideal_image = ideal_image.resize(width, height);
    }

    if verbose {
        eprintln!(
            "Fitting {}x{} pair with seed {}",
            original_image.width(),
            original_image.height(),
            seed
        );
    }

    let report = ParameterEstimator::new()
        .seed(seed)
        .estimate(&original_image, &ideal_image)
        .context("Parameter fit failed")?;

    println!("Estimated parameters:");
    println!("  Brightness: {:.2}", report.params.brightness);
    println!("  Contrast:   {:.2}", report.params.contrast);
    println!("  Gamma:      {:.2}", report.params.gamma);
    println!();
    println!(
        "Fit: mse={:.4}, iterations={}, converged={}, samples={}",
        report.objective, report.iterations, report.converged, report.samples
    );

    Ok(())
}
