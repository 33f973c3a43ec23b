//! CLI subcommands.

pub mod adjust;
pub mod estimate;
pub mod features;
pub mod predict;
pub mod train;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use autotone::image::SUPPORTED_EXTENSIONS;

/// Expands files and directories into a sorted list of supported images.
///
/// Directories are scanned one level deep. Missing paths and unsupported
/// files produce a warning rather than an error so batch runs keep going.
pub fn collect_image_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if is_supported(input) {
                files.push(input.clone());
            } else {
                eprintln!("warning: unsupported file type: {}", input.display());
            }
        } else if input.is_dir() {
            let entries = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let mut found = Vec::new();
            for entry in entries {
                let path = entry?.path();
                if path.is_file() && is_supported(&path) {
                    found.push(path);
                }
            }
            found.sort();
            files.extend(found);
        } else {
            eprintln!("warning: path not found: {}", input.display());
        }
    }
    Ok(files)
}

/// File name for display, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}
