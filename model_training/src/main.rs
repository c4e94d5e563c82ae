use anyhow::{Context, Result};
use clap::Parser;
use data_ingestion::config::AppConfig;
use data_ingestion::logger::init_logger;
use feature_processing::dataset::Dataset;
use feature_processing::labels::{LABEL_HORIZON, label_name};
use feature_processing::misc::FeatureConfig;
use log::info;
use model_training::model::GbmParams;
use model_training::trainer::train;
use std::path::PathBuf;

/// Train the up/down classifier on the persisted multi-coin dataset.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Dataset CSV; defaults to dataset.path
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Where to write the model artifact; defaults to model.path
    #[arg(long)]
    model: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let dataset_path = args.dataset.unwrap_or(config.dataset.path.clone());
    let model_path = args.model.unwrap_or(config.model.path.clone());

    let dataset = Dataset::read_csv(&dataset_path, &label_name(LABEL_HORIZON))
        .with_context(|| format!("Failed to read dataset {}", dataset_path.display()))?;
    info!("Loaded {} rows covering {:?}", dataset.len(), dataset.coins());

    let outcome = train(&dataset, FeatureConfig::default(), GbmParams::default())?;

    println!("Classification Report:");
    println!("{}", outcome.report);
    println!("Confusion Matrix:");
    println!("{}", outcome.confusion);

    outcome
        .artifact
        .save(&model_path)
        .with_context(|| format!("Failed to save model to {}", model_path.display()))?;

    Ok(())
}
