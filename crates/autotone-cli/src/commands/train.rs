//! Training command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use autotone::train::report::write_samples_csv;
use autotone::train::{SampleCache, Trainer};

#[allow(clippy::too_many_arguments)]
pub fn run(
    original: PathBuf,
    ideal: PathBuf,
    model_dir: PathBuf,
    cache: Option<PathBuf>,
    seed: u64,
    workers: usize,
    report_csv: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let model_path = model_dir.join("tone_predictor.bin");
    let cache_path = cache.unwrap_or_else(|| model_dir.join("tone_training_data.json"));

    if verbose {
        eprintln!("Original images: {}", original.display());
        eprintln!("Ideal images:    {}", ideal.display());
        eprintln!("Model path:      {}", model_path.display());
        eprintln!("Cache path:      {}", cache_path.display());
    }

    let report = Trainer::new(&original, &ideal)
        .model_path(&model_path)
        .cache_path(&cache_path)
        .seed(seed)
        .workers(workers)
        .verbose(verbose)
        .train()
        .context("Training failed")?;

    println!(
        "Pairs: {} ({} cached, {} fitted, {} skipped)",
        report.n_pairs, report.n_cached, report.n_fitted, report.n_skipped
    );
    println!("Split: {} train / {} test", report.n_train, report.n_test);
    println!("  Train R²: {:.4}", report.train_score);
    match report.test_score {
        Some(score) => println!("  Test R²:  {:.4}", score),
        None => println!("  Test R²:  - (no held-out samples)"),
    }

    println!();
    println!("Feature importances:");
    for (name, importance) in report.named_importances() {
        println!("  {name}: {importance:.4}");
    }

    println!();
    println!("Model saved to {}", report.model_path.display());

    let report_path = model_dir.join("training_report.json");
    report
        .write_json(&report_path)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    println!("Report saved to {}", report_path.display());

    if let Some(csv_path) = report_csv {
        let cache = SampleCache::load(&cache_path)
            .with_context(|| format!("Failed to load {}", cache_path.display()))?;
        write_samples_csv(&cache.samples, &csv_path)
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;
        println!("Samples written to {}", csv_path.display());
    }

    println!("Completed in {:.1}s", report.elapsed.as_secs_f64());

    Ok(())
}
