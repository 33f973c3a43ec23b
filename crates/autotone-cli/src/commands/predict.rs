//! Prediction command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use autotone::{ImageData, TonePredictor};

use crate::commands::{collect_image_files, display_name};

pub fn run(model: PathBuf, inputs: Vec<PathBuf>, json: bool, verbose: bool) -> Result<()> {
    let predictor = TonePredictor::load(&model)
        .with_context(|| format!("Failed to load model from {}", model.display()))?;

    if verbose {
        eprintln!("Model trained at {}", predictor.trained_at().to_rfc3339());
    }

    let files = collect_image_files(&inputs)?;
    if files.is_empty() {
        anyhow::bail!("no supported images found");
    }

    let mut rows = Vec::new();
    for path in &files {
        let image = ImageData::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        let params = predictor
            .predict(&image)
            .with_context(|| format!("Prediction failed for {}", path.display()))?;
        rows.push((path, params));
    }

    if json {
        let entries: Vec<serde_json::Value> = rows
            .iter()
            .map(|(path, params)| {
                serde_json::json!({
                    "file": path.display().to_string(),
                    "params": params,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!(
            "{:<40} {:>10} {:>10} {:>10}",
            "File", "Brightness", "Contrast", "Gamma"
        );
        println!("{:-<72}", "");
        for (path, params) in &rows {
            println!(
                "{:<40} {:>10.2} {:>10.2} {:>10.2}",
                display_name(path),
                params.brightness,
                params.contrast,
                params.gamma
            );
        }
    }

    Ok(())
}
