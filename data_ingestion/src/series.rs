use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::coins::Coin;

/// One day of market data for a coin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub price: f64,
    pub volume: f64,
    pub market_cap: f64,
}

/// Chronologically ordered daily history of one coin, one record per date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    coin: Coin,
    records: Vec<DailyRecord>,
}

impl PriceSeries {
    /// Sorts the records by date. When a date occurs more than once the
    /// observation that came last in the input is kept.
    pub fn new(coin: Coin, mut records: Vec<DailyRecord>) -> Self {
        // stable sort keeps input order within a date
        records.sort_by_key(|r| r.date);

        let mut deduped: Vec<DailyRecord> = Vec::with_capacity(records.len());
        for record in records {
            match deduped.last_mut() {
                Some(last) if last.date == record.date => *last = record,
                _ => deduped.push(record),
            }
        }

        Self {
            coin,
            records: deduped,
        }
    }

    pub fn coin(&self) -> Coin {
        self.coin
    }

    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.price).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.volume).collect()
    }

    /// The most recent `n` records (all of them if the series is shorter).
    pub fn tail(&self, n: usize) -> PriceSeries {
        let start = self.records.len().saturating_sub(n);
        Self {
            coin: self.coin,
            records: self.records[start..].to_vec(),
        }
    }
}
