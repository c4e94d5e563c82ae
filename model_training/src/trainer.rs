use feature_processing::dataset::Dataset;
use feature_processing::misc::FeatureConfig;
use log::info;
use thiserror::Error;

use crate::encoder::LabelEncoder;
use crate::metrics::{ClassificationReport, ConfusionMatrix};
use crate::model::{GbdtClassifier, GbmParams, ModelArtifact, ModelError, input_columns, input_row};
use crate::split::stratified_split;

pub const TEST_RATIO: f64 = 0.2;
pub const SPLIT_SEED: u64 = 42;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Dataset has only one label class; nothing to learn")]
    SingleClass,

    #[error("Dataset features {found:?} do not match the pipeline features {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub struct TrainingOutcome {
    pub artifact: ModelArtifact,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Encodes coins, splits 80/20 stratified, fits the classifier and scores it on
/// the held-out rows.
pub fn train(
    dataset: &Dataset,
    feature_config: FeatureConfig,
    params: GbmParams,
) -> Result<TrainingOutcome, TrainError> {
    if dataset.is_empty() {
        return Err(TrainError::EmptyDataset);
    }
    let expected = feature_config.feature_names();
    if dataset.feature_names != expected {
        return Err(TrainError::FeatureMismatch {
            expected,
            found: dataset.feature_names.clone(),
        });
    }

    let labels: Vec<bool> = dataset.records.iter().map(|r| r.label).collect();
    if labels.iter().all(|l| *l) || labels.iter().all(|l| !*l) {
        return Err(TrainError::SingleClass);
    }

    let encoder = LabelEncoder::fit(dataset.records.iter().map(|r| r.coin.id()));
    info!("Encoded coins: {:?}", encoder.classes());

    let rows = dataset
        .records
        .iter()
        .map(|r| Ok(input_row(r.volume, &r.features, encoder.transform(r.coin.id())?)))
        .collect::<Result<Vec<Vec<f64>>, ModelError>>()?;

    let split = stratified_split(&labels, TEST_RATIO, SPLIT_SEED);
    let pick_rows = |idx: &[usize]| idx.iter().map(|&i| rows[i].clone()).collect::<Vec<_>>();
    let pick_labels = |idx: &[usize]| idx.iter().map(|&i| labels[i]).collect::<Vec<_>>();

    let (x_train, y_train) = (pick_rows(&split.train), pick_labels(&split.train));
    let (x_test, y_test) = (pick_rows(&split.test), pick_labels(&split.test));
    info!("Split {} rows into {} train / {} test", rows.len(), x_train.len(), x_test.len());

    let classifier = GbdtClassifier::fit(params, &x_train, &y_train)?;

    let y_pred = classifier.predict(&x_test)?;
    let confusion = ConfusionMatrix::from_predictions(&y_test, &y_pred);
    let report = ClassificationReport::from_confusion(&confusion);

    let artifact = ModelArtifact {
        classifier,
        encoder,
        input_columns: input_columns(&feature_config.feature_names()),
        feature_config,
    };

    Ok(TrainingOutcome {
        artifact,
        report,
        confusion,
        train_rows: x_train.len(),
        test_rows: x_test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveDate};
    use data_ingestion::coins::Coin;
    use feature_processing::dataset::TrainingRecord;
    use feature_processing::labels::{LABEL_HORIZON, label_name};

    fn synthetic_dataset(coins: &[Coin], per_coin: usize) -> Dataset {
        let config = FeatureConfig::default();
        let mut dataset = Dataset::new(config.feature_names(), label_name(LABEL_HORIZON));
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for &coin in coins {
            for i in 0..per_coin {
                let signal = if i % 3 == 0 { 0.04 } else { -0.03 };
                let mut features = vec![0.0; 7];
                features[0] = signal;
                features[6] = signal / 2.0;
                features[5] = 1.0 + (i % 4) as f64 * 0.1;
                dataset.records.push(TrainingRecord {
                    coin,
                    date: start + Days::new(i as u64),
                    price: 100.0,
                    volume: 1_000.0 + i as f64,
                    market_cap: 1e6,
                    features,
                    label: signal > 0.0,
                });
            }
        }
        dataset
    }

    fn quick() -> GbmParams {
        GbmParams {
            n_estimators: 20,
            max_depth: 3,
            ..GbmParams::default()
        }
    }

    #[test]
    fn trains_and_scores_held_out_rows() {
        let dataset = synthetic_dataset(&[Coin::Bitcoin, Coin::Ethereum, Coin::Solana], 30);
        let outcome = train(&dataset, FeatureConfig::default(), quick()).unwrap();

        assert_eq!(outcome.train_rows + outcome.test_rows, 90);
        assert_eq!(outcome.test_rows, 18);
        assert_eq!(outcome.confusion.total(), 18);
        assert!(outcome.report.accuracy > 0.9, "accuracy {}", outcome.report.accuracy);
    }

    #[test]
    fn artifact_carries_observed_encoder_and_layout() {
        let dataset = synthetic_dataset(&[Coin::Solana, Coin::Bitcoin], 20);
        let outcome = train(&dataset, FeatureConfig::default(), quick()).unwrap();
        let artifact = outcome.artifact;

        assert_eq!(artifact.encoder.classes(), ["bitcoin", "solana"]);
        assert_eq!(artifact.input_columns.first().map(String::as_str), Some("volume"));
        assert_eq!(artifact.input_columns.last().map(String::as_str), Some("coin_encoded"));
        assert_eq!(artifact.input_columns.len(), 9);
        assert!(!artifact.input_columns.iter().any(|c| c == "price" || c == "market_cap" || c == "date"));
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let dataset = synthetic_dataset(&[], 0);
        assert!(matches!(
            train(&dataset, FeatureConfig::default(), quick()),
            Err(TrainError::EmptyDataset)
        ));
    }

    #[test]
    fn single_class_is_rejected() {
        let mut dataset = synthetic_dataset(&[Coin::Bitcoin], 10);
        dataset.records.iter_mut().for_each(|r| r.label = true);
        assert!(matches!(
            train(&dataset, FeatureConfig::default(), quick()),
            Err(TrainError::SingleClass)
        ));
    }

    #[test]
    fn mismatched_feature_columns_are_rejected() {
        let dataset = synthetic_dataset(&[Coin::Bitcoin], 10);
        let config = FeatureConfig {
            volume_spike_windows: vec![5],
            ..FeatureConfig::default()
        };
        assert!(matches!(
            train(&dataset, config, quick()),
            Err(TrainError::FeatureMismatch { .. })
        ));
    }
}
