use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE: &str = "date";
pub const PRICE: &str = "price";
pub const VOLUME: &str = "volume";
pub const MARKET_CAP: &str = "market_cap";
pub const COIN: &str = "coin";
pub const MOMENTUM: &str = "momentum";
/// Position of a row in the source series; joins derived columns back onto it.
pub const ROW: &str = "row";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomentumWindows {
    pub short: usize,
    pub long: usize,
}

/// Window parameters of the feature pipeline. Training and inference must use
/// the same value; it is persisted next to the model for that reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub pct_change_windows: Vec<usize>,
    pub volatility_windows: Vec<usize>,
    pub volume_spike_windows: Vec<usize>,
    pub momentum: Option<MomentumWindows>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            pct_change_windows: vec![1, 3, 5],
            volatility_windows: vec![3, 5],
            volume_spike_windows: vec![3],
            momentum: Some(MomentumWindows { short: 1, long: 3 }),
        }
    }
}

impl FeatureConfig {
    /// Derived column names, in output order.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        names.extend(self.pct_change_windows.iter().map(|w| pct_change_name(*w)));
        names.extend(self.volatility_windows.iter().map(|w| volatility_name(*w)));
        names.extend(self.volume_spike_windows.iter().map(|w| volume_spike_name(*w)));
        if self.momentum.is_some() {
            names.push(MOMENTUM.to_string());
        }
        names
    }

    /// Leading rows for which at least one feature is always undefined.
    pub fn warmup(&self) -> usize {
        let pct = self.pct_change_windows.iter().copied().max().unwrap_or(0);
        // std over `w` daily changes needs `w + 1` prices
        let vol = self.volatility_windows.iter().copied().max().unwrap_or(0);
        let spike = self
            .volume_spike_windows
            .iter()
            .map(|w| w.saturating_sub(1))
            .max()
            .unwrap_or(0);
        let momentum = self.momentum.map(|m| m.short.max(m.long)).unwrap_or(0);
        pct.max(vol).max(spike).max(momentum)
    }
}

pub fn pct_change_name(window: usize) -> String {
    format!("pct_change_{}d", window)
}

pub fn volatility_name(window: usize) -> String {
    format!("volatility_{}d", window)
}

pub fn volume_spike_name(window: usize) -> String {
    format!("volume_spike_{}d", window)
}

/// A day of the series with every derived feature defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub price: f64,
    pub volume: f64,
    pub market_cap: f64,
    /// Values in `FeatureTable::feature_names` order.
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub feature_names: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let idx = self.feature_names.iter().position(|n| n == name)?;
        self.rows.get(row).map(|r| r.features[idx])
    }
}
