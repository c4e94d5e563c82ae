use anyhow::{Context, Result};
use clap::Parser;
use data_ingestion::coins::Coin;
use data_ingestion::config::AppConfig;
use data_ingestion::fetcher::CoinGeckoClient;
use data_ingestion::logger::init_logger;
use inference_server::engine::Predictor;
use inference_server::misc::Prediction;
use log::{info, warn};
use model_training::model::ModelArtifact;

/// Predict the 3-day direction for the latest market data.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Only predict this coin; every supported coin otherwise
    #[arg(long)]
    coin: Option<Coin>,
}

fn print_prediction(prediction: &Prediction) {
    println!("{}", "=".repeat(40));
    println!("Features for {} on {}:", prediction.coin, prediction.date);
    for (column, value) in prediction
        .features
        .columns
        .iter()
        .zip(prediction.features.values.iter())
    {
        println!("  {:<18} {:>.6}", column, value);
    }
    println!("{}", prediction.headline());
    println!("{}", prediction.outlook.message());
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let artifact = ModelArtifact::load(&config.model.path)
        .with_context(|| format!("Failed to load model from {}", config.model.path.display()))?;
    let predictor = Predictor::from_artifact(
        CoinGeckoClient::new(config.api.clone()),
        artifact,
        &config.inference,
    );

    // A single requested coin propagates its error; the full sweep keeps going.
    if let Some(coin) = args.coin {
        info!("Fetching latest data for {}...", coin);
        let prediction = predictor.predict(coin).await?;
        print_prediction(&prediction);
        return Ok(());
    }

    for coin in Coin::ALL {
        info!("Fetching latest data for {}...", coin);
        match predictor.predict(coin).await {
            Ok(prediction) => print_prediction(&prediction),
            Err(e) => warn!("Error for {}: {}", coin, e),
        }
    }

    Ok(())
}
