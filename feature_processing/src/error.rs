use data_ingestion::error::DataIngestionError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),

    #[error("Market data error: {0}")]
    DataIngestionError(#[from] DataIngestionError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Dataset is missing column `{0}`")]
    MissingColumn(String),

    #[error("Invalid value `{value}` in column `{column}` at line {line}")]
    InvalidValue {
        column: String,
        value: String,
        line: u64,
    },
}
