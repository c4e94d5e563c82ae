//! Binary up/down classifier and the artifact persisted for inference.

use feature_processing::misc::{FeatureConfig, VOLUME};
use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec, ValueType};
use gbdt::gradient_boost::GBDT;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

use crate::encoder::LabelEncoder;

pub const COIN_ENCODED: &str = "coin_encoded";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Label `{0}` was not seen when the encoder was fitted")]
    UnseenLabel(String),

    #[error("Model expects {expected} input columns, got {got}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("Model I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
}

/// Model input columns: raw volume, the derived features, then the encoded coin.
/// Date, price, market cap, coin name and the label never reach the model.
pub fn input_columns(feature_names: &[String]) -> Vec<String> {
    let mut columns = Vec::with_capacity(feature_names.len() + 2);
    columns.push(VOLUME.to_string());
    columns.extend(feature_names.iter().cloned());
    columns.push(COIN_ENCODED.to_string());
    columns
}

/// Row matching `input_columns`.
pub fn input_row(volume: f64, features: &[f64], coin_code: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(features.len() + 2);
    row.push(volume);
    row.extend_from_slice(features);
    row.push(coin_code as f64);
    row
}

/// Probability of the positive ("price goes up") class for each input row.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;
}

/// GBM hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmParams {
    /// Number of boosting iterations (trees)
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: u32,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Minimum samples required in a leaf node
    pub min_samples_leaf: usize,
    /// Subsample ratio of the training instances
    pub subsample: f64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 5,
            learning_rate: 0.1,
            min_samples_leaf: 1,
            subsample: 1.0,
        }
    }
}

/// Gradient boosted trees trained with log-likelihood loss.
#[derive(Serialize, Deserialize)]
pub struct GbdtClassifier {
    params: GbmParams,
    n_features: usize,
    model: GBDT,
}

impl GbdtClassifier {
    pub fn fit(params: GbmParams, rows: &[Vec<f64>], labels: &[bool]) -> Result<Self, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::InvalidData("Empty training set".to_string()));
        }
        if rows.len() != labels.len() {
            return Err(ModelError::InvalidData(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        let n_features = rows[0].len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::FeatureMismatch {
                expected: n_features,
                got: bad.len(),
            });
        }

        let mut cfg = Config::new();
        cfg.set_feature_size(n_features);
        cfg.set_max_depth(params.max_depth);
        cfg.set_iterations(params.n_estimators);
        cfg.set_shrinkage(params.learning_rate as ValueType);
        cfg.set_min_leaf_size(params.min_samples_leaf);
        cfg.set_data_sample_ratio(params.subsample);
        cfg.set_feature_sample_ratio(1.0);
        cfg.set_loss("LogLikelyhood");
        cfg.set_training_optimization_level(2);

        // log-likelihood loss expects labels in {-1, 1}
        let mut training: DataVec = rows
            .iter()
            .zip(labels.iter())
            .map(|(row, &up)| {
                Data::new_training_data(to_values(row), 1.0, if up { 1.0 } else { -1.0 }, None)
            })
            .collect();

        info!(
            "Training GBM classifier with {} samples and {} features",
            rows.len(),
            n_features
        );
        let mut model = GBDT::new(&cfg);
        model.fit(&mut training);
        info!("Classifier training completed successfully");

        Ok(Self {
            params,
            n_features,
            model,
        })
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Class predictions at the 0.5 probability threshold.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<bool>, ModelError> {
        Ok(self.predict_proba(rows)?.into_iter().map(|p| p > 0.5).collect())
    }
}

fn to_values(row: &[f64]) -> Vec<ValueType> {
    row.iter().map(|v| *v as ValueType).collect()
}

impl Classifier for GbdtClassifier {
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(ModelError::FeatureMismatch {
                expected: self.n_features,
                got: bad.len(),
            });
        }

        let test: DataVec = rows
            .iter()
            .map(|row| Data::new_test_data(to_values(row), None))
            .collect();

        Ok(self
            .model
            .predict(&test)
            .into_iter()
            .map(|p| (p as f64).clamp(0.0, 1.0))
            .collect())
    }
}

/// Everything inference needs to reproduce the training-time input exactly.
#[derive(Serialize, Deserialize)]
pub struct ModelArtifact {
    pub classifier: GbdtClassifier,
    pub encoder: LabelEncoder,
    pub feature_config: FeatureConfig,
    pub input_columns: Vec<String>,
}

impl ModelArtifact {
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        info!("Model saved to: {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let reader = BufReader::new(File::open(path)?);
        let artifact: ModelArtifact = bincode::deserialize_from(reader)?;

        let expected = input_columns(&artifact.feature_config.feature_names());
        if artifact.input_columns != expected {
            return Err(ModelError::FeatureMismatch {
                expected: expected.len(),
                got: artifact.input_columns.len(),
            });
        }
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Up when the first column is positive, with some noise in the rest.
    fn separable(n: usize) -> (Vec<Vec<f64>>, Vec<bool>) {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                let x = if i % 2 == 0 { 1.0 } else { -1.0 } * (1.0 + (i % 7) as f64 * 0.1);
                vec![x, (i % 5) as f64, (i % 3) as f64]
            })
            .collect();
        let labels = rows.iter().map(|r| r[0] > 0.0).collect();
        (rows, labels)
    }

    fn small_params() -> GbmParams {
        GbmParams {
            n_estimators: 20,
            max_depth: 3,
            ..GbmParams::default()
        }
    }

    #[test]
    fn input_layout_puts_volume_first_and_coin_last() {
        let names = vec!["pct_change_1d".to_string(), "momentum".to_string()];
        assert_eq!(
            input_columns(&names),
            vec!["volume", "pct_change_1d", "momentum", "coin_encoded"]
        );
        assert_eq!(input_row(5.0, &[0.1, 0.2], 3), vec![5.0, 0.1, 0.2, 3.0]);
    }

    #[test]
    fn learns_a_separable_problem() {
        let (rows, labels) = separable(60);
        let clf = GbdtClassifier::fit(small_params(), &rows, &labels).unwrap();

        let probs = clf.predict_proba(&rows).unwrap();
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
        let predicted = clf.predict(&rows).unwrap();
        let correct = predicted.iter().zip(labels.iter()).filter(|(p, l)| p == l).count();
        assert!(correct >= 54, "only {} of 60 correct", correct);
    }

    #[test]
    fn rejects_wrong_width_at_prediction() {
        let (rows, labels) = separable(20);
        let clf = GbdtClassifier::fit(small_params(), &rows, &labels).unwrap();
        let err = clf.predict_proba(&[vec![1.0]]).unwrap_err();
        assert!(matches!(err, ModelError::FeatureMismatch { expected: 3, got: 1 }));
    }

    #[test]
    fn rejects_empty_training_set() {
        assert!(GbdtClassifier::fit(small_params(), &[], &[]).is_err());
    }

    #[test]
    fn artifact_round_trip_predicts_the_same() {
        let config = FeatureConfig::default();
        let columns = input_columns(&config.feature_names());
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let mut row = vec![(i % 9) as f64; columns.len()];
                row[1] = if i % 2 == 0 { 0.05 } else { -0.05 };
                row
            })
            .collect();
        let labels: Vec<bool> = rows.iter().map(|r| r[1] > 0.0).collect();

        let artifact = ModelArtifact {
            classifier: GbdtClassifier::fit(small_params(), &rows, &labels).unwrap(),
            encoder: LabelEncoder::fit(["bitcoin", "ethereum"]),
            feature_config: config,
            input_columns: columns,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.bin");
        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded.encoder, artifact.encoder);
        assert_eq!(loaded.feature_config, artifact.feature_config);
        assert_eq!(
            loaded.classifier.predict_proba(&rows[..4]).unwrap(),
            artifact.classifier.predict_proba(&rows[..4]).unwrap()
        );
    }

    #[test]
    fn missing_model_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelArtifact::load(&dir.path().join("absent.bin")).err().unwrap();
        assert!(matches!(err, ModelError::Io(_)));
    }
}
