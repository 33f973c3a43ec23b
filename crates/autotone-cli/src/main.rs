//! autotone CLI - Tone adjustment for product photos

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

/// Tone-adjustment training and prediction tool.
#[derive(Parser)]
#[command(name = "autotone")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit tone parameters for image pairs and train the predictor
    Train {
        /// Directory of original (unadjusted) images
        #[arg(long)]
        original: PathBuf,

        /// Directory of ideal (hand-adjusted) images, paired by file stem
        #[arg(long)]
        ideal: PathBuf,

        /// Directory to write the model into
        #[arg(long, default_value = "models")]
        model_dir: PathBuf,

        /// Sample cache file (default: tone_training_data.json in the model dir)
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Seed for subsampling, splitting, and forest training
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Worker threads for parameter fitting
        #[arg(long, default_value_t = 10)]
        workers: usize,

        /// Write the fitted samples as a CSV table
        #[arg(long)]
        report_csv: Option<PathBuf>,
    },

    /// Fit tone parameters for a single original/ideal pair
    Estimate {
        /// Original (unadjusted) image
        #[arg(long)]
        original: PathBuf,

        /// Ideal (hand-adjusted) image
        #[arg(long)]
        ideal: PathBuf,

        /// Seed for pixel subsampling
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Predict tone parameters for images
    Predict {
        /// Trained model file
        #[arg(short, long, default_value = "models/tone_predictor.bin")]
        model: PathBuf,

        /// Images or directories to predict for
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Print predictions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Predict and apply tone adjustment, saving copies next to the inputs
    Adjust {
        /// Trained model file
        #[arg(short, long, default_value = "models/tone_predictor.bin")]
        model: PathBuf,

        /// Images or directories to adjust
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Suffix appended to output file stems
        #[arg(long, default_value = "_adjusted")]
        suffix: String,
    },

    /// Extract feature vectors from images
    Features {
        /// Images or directories to analyze
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write features as CSV instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train { original, ideal, model_dir, cache, seed, workers, report_csv } => {
            commands::train::run(
                original, ideal, model_dir, cache, seed, workers, report_csv, cli.verbose,
            )
        }
        Commands::Estimate { original, ideal, seed } => {
            commands::estimate::run(original, ideal, seed, cli.verbose)
        }
        Commands::Predict { model, inputs, json } => {
            commands::predict::run(model, inputs, json, cli.verbose)
        }
        Commands::Adjust { model, inputs, suffix } => {
            commands::adjust::run(model, inputs, &suffix, cli.verbose)
        }
        Commands::Features { inputs, output } => {
            commands::features::run(inputs, output, cli.verbose)
        }
    }
}
