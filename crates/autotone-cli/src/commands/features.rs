//! Feature extraction command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use autotone::{features, ImageData, ImageFeatures};

use crate::commands::{collect_image_files, display_name};

pub fn run(inputs: Vec<PathBuf>, output: Option<PathBuf>, verbose: bool) -> Result<()> {
    let files = collect_image_files(&inputs)?;
    if files.is_empty() {
        anyhow::bail!("no supported images found");
    }

    let mut rows: Vec<(String, ImageFeatures)> = Vec::new();
    for path in &files {
        if verbose {
            eprintln!("Analyzing {}", path.display());
        }
        let image = ImageData::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        rows.push((display_name(path), features::extract(&image)));
    }

    match output {
        Some(csv_path) => {
            write_csv(&rows, &csv_path)?;
            println!("Features written to {}", csv_path.display());
        }
        None => print_table(&rows),
    }

    Ok(())
}

fn print_table(rows: &[(String, ImageFeatures)]) {
    for (name, extracted) in rows {
        println!("{name}");
        for (feature, value) in ImageFeatures::names().into_iter().zip(extracted.to_array()) {
            println!("  {feature}: {value:.4}");
        }
        println!();
    }
}

fn write_csv(rows: &[(String, ImageFeatures)], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = vec!["name"];
    header.extend_from_slice(&ImageFeatures::names());
    writer.write_record(&header)?;

    for (name, extracted) in rows {
        let mut record = vec![name.clone()];
        record.extend(extracted.to_array().iter().map(|v| format!("{v:.4}")));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(())
}
