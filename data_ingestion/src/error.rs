use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataIngestionError {
    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Market data API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed market chart for {coin}: {reason}")]
    MalformedResponse { coin: String, reason: String },

    #[error("Unknown coin identifier: {0}")]
    UnknownCoin(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
