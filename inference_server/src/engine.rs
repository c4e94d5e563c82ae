use data_ingestion::coins::Coin;
use data_ingestion::config::InferenceConfig;
use data_ingestion::error::DataIngestionError;
use data_ingestion::fetcher::MarketDataSource;
use data_ingestion::series::PriceSeries;
use feature_processing::error::FeatureError;
use feature_processing::misc::FeatureConfig;
use feature_processing::processor::latest_features;
use log::debug;
use model_training::encoder::LabelEncoder;
use model_training::model::{
    Classifier, GbdtClassifier, ModelArtifact, ModelError, input_columns, input_row,
};
use thiserror::Error;

use crate::misc::{FeatureVector, Outlook, Prediction, round4};

#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Market data error: {0}")]
    Fetch(#[from] DataIngestionError),

    #[error("Feature error: {0}")]
    Features(#[from] FeatureError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Not enough history for {coin}: {rows} rows, need more than {warmup}")]
    InsufficientHistory { coin: Coin, rows: usize, warmup: usize },

    #[error("Model returned no probability")]
    EmptyOutput,
}

/// Turns a coin's latest market window into P(up) with the training-time
/// feature configuration and coin encoding.
pub struct Predictor<S, C> {
    source: S,
    classifier: C,
    encoder: LabelEncoder,
    feature_config: FeatureConfig,
    days: u32,
    window: usize,
}

impl<S: MarketDataSource> Predictor<S, GbdtClassifier> {
    pub fn from_artifact(source: S, artifact: ModelArtifact, inference: &InferenceConfig) -> Self {
        Self::new(
            source,
            artifact.classifier,
            artifact.encoder,
            artifact.feature_config,
            inference,
        )
    }
}

impl<S: MarketDataSource, C: Classifier> Predictor<S, C> {
    pub fn new(
        source: S,
        classifier: C,
        encoder: LabelEncoder,
        feature_config: FeatureConfig,
        inference: &InferenceConfig,
    ) -> Self {
        Self {
            source,
            classifier,
            encoder,
            feature_config,
            days: inference.days,
            window: inference.window,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The most recent `window` days of the coin.
    pub async fn recent_series(&self, coin: Coin) -> Result<PriceSeries, PredictError> {
        let series = self.source.fetch(coin, self.days).await?;
        Ok(series.tail(self.window))
    }

    pub async fn predict(&self, coin: Coin) -> Result<Prediction, PredictError> {
        let series = self.recent_series(coin).await?;
        self.predict_series(&series)
    }

    /// Scores the last fully defined day of `series`.
    pub fn predict_series(&self, series: &PriceSeries) -> Result<Prediction, PredictError> {
        let coin = series.coin();
        let row = latest_features(series, &self.feature_config)?.ok_or_else(|| {
            PredictError::InsufficientHistory {
                coin,
                rows: series.len(),
                warmup: self.feature_config.warmup(),
            }
        })?;

        let code = self.encoder.transform(coin.id())?;
        let input = input_row(row.volume, &row.features, code);
        debug!("Input row for {} on {}: {:?}", coin, row.date, input);

        let probability = self
            .classifier
            .predict_proba(std::slice::from_ref(&input))?
            .first()
            .copied()
            .ok_or(PredictError::EmptyOutput)?;
        let probability = round4(probability);

        Ok(Prediction {
            coin,
            date: row.date,
            probability,
            outlook: Outlook::from_probability(probability),
            features: FeatureVector {
                columns: input_columns(&self.feature_config.feature_names()),
                values: input,
            },
        })
    }
}
