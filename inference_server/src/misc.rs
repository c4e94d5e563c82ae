use chrono::NaiveDate;
use data_ingestion::coins::Coin;
use serde::Serialize;

/// The single model input row, with its column names, as shown to users.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub columns: Vec<String>,
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn get(&self, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.values.get(idx).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    High,
    Moderate,
    Unlikely,
}

impl Outlook {
    pub fn from_probability(p: f64) -> Self {
        if p > 0.7 {
            Outlook::High
        } else if p > 0.5 {
            Outlook::Moderate
        } else {
            Outlook::Unlikely
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outlook::High => "High upward potential detected!",
            Outlook::Moderate => "Moderate upward likelihood",
            Outlook::Unlikely => "Unlikely to rise, stay cautious",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub coin: Coin,
    /// Day of the feature row the prediction was made from.
    pub date: NaiveDate,
    /// P(price higher in three days), rounded to 4 decimals.
    pub probability: f64,
    pub outlook: Outlook,
    pub features: FeatureVector,
}

impl Prediction {
    pub fn headline(&self) -> String {
        format!(
            "{} has a {:.2}% chance of going UP in the next 3 days.",
            self.coin.display_name(),
            self.probability * 100.0
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub price: f64,
}

pub fn round4(p: f64) -> f64 {
    (p * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlook_thresholds() {
        assert_eq!(Outlook::from_probability(0.71), Outlook::High);
        assert_eq!(Outlook::from_probability(0.7), Outlook::Moderate);
        assert_eq!(Outlook::from_probability(0.51), Outlook::Moderate);
        assert_eq!(Outlook::from_probability(0.5), Outlook::Unlikely);
    }

    #[test]
    fn rounds_to_four_decimals() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(0.73), 0.73);
    }

    #[test]
    fn headline_uses_percentage() {
        let prediction = Prediction {
            coin: Coin::Solana,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            probability: 0.6543,
            outlook: Outlook::Moderate,
            features: FeatureVector {
                columns: vec![],
                values: vec![],
            },
        };
        assert_eq!(
            prediction.headline(),
            "Solana has a 65.43% chance of going UP in the next 3 days."
        );
    }
}
