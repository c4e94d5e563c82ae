use data_ingestion::series::PriceSeries;
use polars::prelude::*;

use crate::error::FeatureError;
use crate::misc::{PRICE, ROW};

/// Days ahead the training label looks.
pub const LABEL_HORIZON: usize = 3;

pub fn label_name(horizon: usize) -> String {
    format!("will_price_go_up_{}d", horizon)
}

/// `price[t + horizon] > price[t]`; null where the lookahead runs past the series.
/// Training only: inference never has the future price.
pub fn label_expr(horizon: usize) -> Expr {
    col(PRICE)
        .shift(lit(-(horizon as i64)))
        .gt(col(PRICE))
        .alias(&label_name(horizon))
}

/// `(row, label)` for every row whose lookahead is inside the series.
pub fn generate_labels(series: &PriceSeries, horizon: usize) -> Result<Vec<(usize, bool)>, FeatureError> {
    if series.is_empty() {
        return Ok(Vec::new());
    }

    let rows: Vec<u32> = (0..series.len() as u32).collect();
    let df = DataFrame::new(vec![
        Series::new(ROW, rows),
        Series::new(PRICE, series.prices()),
    ])?
    .lazy()
    .with_column(label_expr(horizon))
    .drop_nulls(None)
    .collect()?;

    let positions = df.column(ROW)?.u32()?;
    let labels = df.column(&label_name(horizon))?.bool()?;

    Ok(positions
        .into_iter()
        .zip(labels.into_iter())
        .filter_map(|(pos, label)| Some((pos? as usize, label?)))
        .collect())
}
