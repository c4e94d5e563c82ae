use anyhow::{Context, Result};
use data_ingestion::config::AppConfig;
use data_ingestion::fetcher::CoinGeckoClient;
use data_ingestion::logger::init_logger;
use inference_server::engine::Predictor;
use inference_server::server::Server;
use log::info;
use model_training::model::ModelArtifact;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let artifact = ModelArtifact::load(&config.model.path)
        .with_context(|| format!("Failed to load model from {}", config.model.path.display()))?;
    info!("Loaded model for coins {:?}", artifact.encoder.classes());

    let source = CoinGeckoClient::new(config.api.clone());
    let predictor = Predictor::from_artifact(source, artifact, &config.inference);

    let server = Server::init(predictor, config.server.addr);
    server.run().await?;

    info!("Server has been shut down gracefully");

    Ok(())
}
