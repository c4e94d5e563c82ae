use chrono::NaiveDate;
use data_ingestion::coins::Coin;
use data_ingestion::fetcher::MarketDataSource;
use log::{info, warn};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::FeatureError;
use crate::labels::{LABEL_HORIZON, label_expr, label_name};
use crate::misc::{COIN, DATE, FeatureConfig, MARKET_CAP, PRICE, VOLUME};
use crate::processor::{feature_lazy, rows_from_frame};

/// One labelled day of one coin.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRecord {
    pub coin: Coin,
    pub date: NaiveDate,
    pub price: f64,
    pub volume: f64,
    pub market_cap: f64,
    pub features: Vec<f64>,
    pub label: bool,
}

/// The concatenated multi-coin training table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub label_name: String,
    pub records: Vec<TrainingRecord>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>, label_name: String) -> Self {
        Self {
            feature_names,
            label_name,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn coins(&self) -> BTreeSet<Coin> {
        self.records.iter().map(|r| r.coin).collect()
    }

    fn header(&self) -> Vec<String> {
        let mut header = vec![
            DATE.to_string(),
            PRICE.to_string(),
            VOLUME.to_string(),
            MARKET_CAP.to_string(),
        ];
        header.extend(self.feature_names.iter().cloned());
        header.push(self.label_name.clone());
        header.push(COIN.to_string());
        header
    }

    /// `date,price,volume,market_cap,<features..>,<label>,coin`
    pub fn write_csv(&self, path: &Path) -> Result<(), FeatureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.header())?;
        for r in &self.records {
            let mut row = vec![
                r.date.to_string(),
                r.price.to_string(),
                r.volume.to_string(),
                r.market_cap.to_string(),
            ];
            row.extend(r.features.iter().map(|v| v.to_string()));
            row.push(if r.label { "1" } else { "0" }.to_string());
            row.push(r.coin.id().to_string());
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a file produced by `write_csv`. Every column that is not a raw,
    /// label or coin column is treated as a feature, in header order.
    pub fn read_csv(path: &Path, label_name: &str) -> Result<Self, FeatureError> {
        let mut reader = csv::Reader::from_path(path)?;
        let header = reader.headers()?.clone();

        let index_of = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| FeatureError::MissingColumn(name.to_string()))
        };
        let date_idx = index_of(DATE)?;
        let price_idx = index_of(PRICE)?;
        let volume_idx = index_of(VOLUME)?;
        let cap_idx = index_of(MARKET_CAP)?;
        let label_idx = index_of(label_name)?;
        let coin_idx = index_of(COIN)?;

        let reserved = [date_idx, price_idx, volume_idx, cap_idx, label_idx, coin_idx];
        let feature_cols: Vec<(usize, String)> = header
            .iter()
            .enumerate()
            .filter(|(i, _)| !reserved.contains(i))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut dataset = Dataset::new(
            feature_cols.iter().map(|(_, name)| name.clone()).collect(),
            label_name.to_string(),
        );

        for result in reader.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let field = |idx: usize| record.get(idx).unwrap_or("");
            let invalid = |idx: usize| FeatureError::InvalidValue {
                column: header.get(idx).unwrap_or("").to_string(),
                value: field(idx).to_string(),
                line,
            };
            let number = |idx: usize| field(idx).parse::<f64>().map_err(|_| invalid(idx));

            let features = feature_cols
                .iter()
                .map(|(idx, _)| number(*idx))
                .collect::<Result<Vec<f64>, FeatureError>>()?;

            let label = match field(label_idx) {
                "1" | "true" | "True" => true,
                "0" | "false" | "False" => false,
                _ => return Err(invalid(label_idx)),
            };

            dataset.records.push(TrainingRecord {
                coin: field(coin_idx).parse().map_err(|_| invalid(coin_idx))?,
                date: field(date_idx).parse().map_err(|_| invalid(date_idx))?,
                price: number(price_idx)?,
                volume: number(volume_idx)?,
                market_cap: number(cap_idx)?,
                features,
                label,
            });
        }

        Ok(dataset)
    }
}

/// What happened to one coin during a build.
#[derive(Debug, Clone, PartialEq)]
pub enum CoinOutcome {
    Included { coin: Coin, rows: usize },
    Skipped { coin: Coin, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub outcomes: Vec<CoinOutcome>,
}

impl BuildReport {
    pub fn included(&self) -> Vec<Coin> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                CoinOutcome::Included { coin, .. } => Some(*coin),
                CoinOutcome::Skipped { .. } => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<(Coin, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                CoinOutcome::Skipped { coin, reason } => Some((*coin, reason.as_str())),
                CoinOutcome::Included { .. } => None,
            })
            .collect()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match outcome {
                CoinOutcome::Included { coin, rows } => writeln!(f, "{:<10} included ({} rows)", coin, rows)?,
                CoinOutcome::Skipped { coin, reason } => writeln!(f, "{:<10} skipped: {}", coin, reason)?,
            }
        }
        Ok(())
    }
}

/// Fetch -> features -> label for each coin, concatenated into one dataset.
pub struct DatasetBuilder<S> {
    source: S,
    days: u32,
    feature_config: FeatureConfig,
    horizon: usize,
}

impl<S: MarketDataSource> DatasetBuilder<S> {
    pub fn new(source: S, days: u32) -> Self {
        Self {
            source,
            days,
            feature_config: FeatureConfig::default(),
            horizon: LABEL_HORIZON,
        }
    }

    pub fn with_feature_config(mut self, feature_config: FeatureConfig) -> Self {
        self.feature_config = feature_config;
        self
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        &self.feature_config
    }

    pub fn empty_dataset(&self) -> Dataset {
        Dataset::new(self.feature_config.feature_names(), label_name(self.horizon))
    }

    /// Labelled rows for one coin; rows missing a feature or a lookahead are dropped.
    pub async fn process_coin(&self, coin: Coin) -> Result<Vec<TrainingRecord>, FeatureError> {
        let series = self.source.fetch(coin, self.days).await?;
        if series.is_empty() {
            return Ok(Vec::new());
        }

        let label = label_name(self.horizon);
        let df = feature_lazy(&series, &self.feature_config)?
            .with_column(label_expr(self.horizon))
            .drop_nulls(None)
            .collect()?;

        let labels = df.column(&label)?.bool()?;
        let rows = rows_from_frame(&df, &series, &self.feature_config.feature_names())?;

        Ok(rows
            .into_iter()
            .filter_map(|(i, row)| {
                labels.get(i).map(|up| TrainingRecord {
                    coin,
                    date: row.date,
                    price: row.price,
                    volume: row.volume,
                    market_cap: row.market_cap,
                    features: row.features,
                    label: up,
                })
            })
            .collect())
    }

    /// Best effort: a coin that fails is logged, reported and left out.
    pub async fn build(&self, coins: &[Coin]) -> (Dataset, BuildReport) {
        let mut dataset = self.empty_dataset();
        let mut report = BuildReport::default();

        for &coin in coins {
            info!("Processing {}", coin);
            match self.process_coin(coin).await {
                Ok(records) => {
                    report.outcomes.push(CoinOutcome::Included {
                        coin,
                        rows: records.len(),
                    });
                    dataset.records.extend(records);
                }
                Err(e) => {
                    warn!("Skipping {} due to error: {}", coin, e);
                    report.outcomes.push(CoinOutcome::Skipped {
                        coin,
                        reason: e.to_string(),
                    });
                }
            }
        }

        (dataset, report)
    }
}

/// `{dir}/{coin}_{days}d_processed.csv`
pub fn processed_path(dir: &Path, coin: Coin, days: u32) -> PathBuf {
    dir.join(format!("{}_{}d_processed.csv", coin, days))
}
