use anyhow::{Context, Result, bail};
use clap::Parser;
use data_ingestion::coins::Coin;
use data_ingestion::config::AppConfig;
use data_ingestion::fetcher::CoinGeckoClient;
use data_ingestion::logger::init_logger;
use feature_processing::dataset::{DatasetBuilder, processed_path};
use log::*;

/// Build the labelled training dataset from live market data.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Process a single coin into its own processed file instead of the multi-coin dataset
    #[arg(long)]
    coin: Option<Coin>,

    /// Days of history per coin; defaults to dataset.history_days
    #[arg(long)]
    days: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let days = args.days.unwrap_or(config.dataset.history_days);
    let builder = DatasetBuilder::new(CoinGeckoClient::new(config.api.clone()), days);

    if let Some(coin) = args.coin {
        let mut dataset = builder.empty_dataset();
        dataset.records = builder
            .process_coin(coin)
            .await
            .with_context(|| format!("Failed to process {}", coin))?;

        let path = processed_path(&config.dataset.processed_dir, coin, days);
        dataset.write_csv(&path)?;
        info!("Cleaned data saved to: {} ({} rows)", path.display(), dataset.len());
        return Ok(());
    }

    let (dataset, report) = builder.build(&Coin::ALL).await;
    print!("{}", report);

    if dataset.is_empty() {
        bail!("Every coin failed; nothing to save");
    }

    dataset
        .write_csv(&config.dataset.path)
        .with_context(|| format!("Failed to write {}", config.dataset.path.display()))?;
    info!(
        "Multi-coin dataset saved: {} ({} rows from {} coins)",
        config.dataset.path.display(),
        dataset.len(),
        report.included().len()
    );

    Ok(())
}
