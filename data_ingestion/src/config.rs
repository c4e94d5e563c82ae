use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "pipeline.toml";
pub const ENV_PREFIX: &str = "CRYPTO_PREDICT";

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub vs_currency: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    pub history_days: u32,
    pub path: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceConfig {
    /// Days of history requested from the API per prediction.
    pub days: u32,
    /// Most recent rows kept before deriving features.
    pub window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub inference: InferenceConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Defaults, then `pipeline.toml` if present, then `CRYPTO_PREDICT__SECTION__KEY`
    /// environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load(Some(CONFIG_FILE), Some(ENV_PREFIX))
    }

    pub fn load(file: Option<&str>, env_prefix: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("api.host", "https://api.coingecko.com/api/v3")?
            .set_default("api.vs_currency", "usd")?
            .set_default("dataset.history_days", 90)?
            .set_default("dataset.path", "features/processed/multicoin_dataset.csv")?
            .set_default("dataset.raw_dir", "data/raw")?
            .set_default("dataset.processed_dir", "features/processed")?
            .set_default("model.path", "models/gbdt_model_multicoin.bin")?
            .set_default("inference.days", 10)?
            .set_default("inference.window", 10)?
            .set_default("server.addr", "0.0.0.0:3000")?;

        if let Some(file) = file {
            builder = builder.add_source(File::new(file, FileFormat::Toml).required(false));
        }
        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
