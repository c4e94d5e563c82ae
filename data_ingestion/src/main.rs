use anyhow::{Context, Result};
use clap::Parser;
use data_ingestion::coins::Coin;
use data_ingestion::config::AppConfig;
use data_ingestion::fetcher::{CoinGeckoClient, MarketDataSource, save_raw_csv};
use data_ingestion::logger::init_logger;
use log::info;
use std::path::PathBuf;

/// Fetch a coin's daily market chart and store it as raw CSV.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Coin identifier (bitcoin, ethereum, solana, dogecoin, shiba-inu)
    #[arg(long, default_value = "bitcoin")]
    coin: Coin,

    /// Days of history; defaults to dataset.history_days
    #[arg(long)]
    days: Option<u32>,

    /// Output directory; defaults to dataset.raw_dir
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let days = args.days.unwrap_or(config.dataset.history_days);
    let out_dir = args.out_dir.unwrap_or(config.dataset.raw_dir.clone());

    let client = CoinGeckoClient::new(config.api.clone());
    let series = client
        .fetch(args.coin, days)
        .await
        .with_context(|| format!("Failed to fetch market data for {}", args.coin))?;

    let path = save_raw_csv(&series, days, &out_dir)?;
    info!("Stored {} rows for {} at {}", series.len(), args.coin, path.display());

    Ok(())
}
