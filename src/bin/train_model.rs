//! Risk Model Training
//!
//! Fits the flood risk classifier from a labeled training file and writes
//! the model artifact the engine loads at startup.
//!
//! Steps:
//! 1. Read the training file (JSON array of readings with `flood_occurred`)
//! 2. Cross-validate and fit the scaler + classifier
//! 3. Print the training report (accuracy, feature importance)
//! 4. Save the artifact to `[model] artifact_path` (or --output)
//!
//! Usage:
//!   cargo run --bin train_model -- --data data/training_sample.json
//!
//! Environment:
//!   FLOODRISK_CONFIG - config file path (default: ./floodrisk.toml)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use floodrisk_service::config::EngineConfig;
use floodrisk_service::model::Field;
use floodrisk_service::predict::{RiskModel, TrainingParams, load_training_file};

#[derive(Parser)]
#[command(name = "train_model", about = "Train the flood risk classifier", version)]
struct Args {
    /// Labeled training data (JSON array)
    #[arg(long)]
    data: PathBuf,

    /// Artifact destination; defaults to the configured artifact path
    #[arg(long)]
    output: Option<PathBuf>,

    /// Config file (overrides FLOODRISK_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Feature columns, in order
    #[arg(long, value_delimiter = ',', default_value = "temperature,humidity,wind_speed,pressure")]
    features: Vec<String>,

    #[arg(long, default_value_t = TrainingParams::default().epochs)]
    epochs: usize,

    #[arg(long, default_value_t = TrainingParams::default().learning_rate)]
    learning_rate: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let output = match args.output {
        Some(path) => path,
        None => {
            EngineConfig::load_default(args.config.as_deref())
                .context("loading configuration")?
                .artifact_path
        }
    };

    let columns = args
        .features
        .iter()
        .map(|name| name.parse::<Field>())
        .collect::<Result<Vec<_>, _>>()
        .context("parsing --features")?;

    println!("🌊 Flood Risk Model Training");
    println!("============================\n");

    let data = load_training_file(&args.data, columns)
        .with_context(|| format!("loading {}", args.data.display()))?;
    println!("✓ Loaded {} samples from {}\n", data.rows.len(), args.data.display());

    let model = RiskModel::with_params(TrainingParams {
        epochs: args.epochs,
        learning_rate: args.learning_rate,
        ..TrainingParams::default()
    });
    let report = model.fit(&data)?;

    println!("Samples:           {} ({} floods)", report.samples, report.positive_samples);
    println!("Cross validation:  {} folds", report.cv_folds);
    for (i, score) in report.cv_scores.iter().enumerate() {
        println!("   fold {}: {:.3}", i + 1, score);
    }
    println!("CV accuracy:       {:.3}", report.cv_accuracy);
    println!("Training accuracy: {:.3}\n", report.training_accuracy);

    println!("Feature importance:");
    for fi in &report.feature_importance {
        println!("   {:<13} {:.3}", fi.field.as_str(), fi.importance);
    }

    model.save(&output)?;
    println!("\n✓ Model saved to {}", output.display());
    Ok(())
}
