use data_ingestion::series::PriceSeries;
use polars::prelude::*;

use crate::error::FeatureError;
use crate::misc::{
    FeatureConfig, FeatureRow, FeatureTable, MOMENTUM, PRICE, ROW, VOLUME, pct_change_name,
    volatility_name, volume_spike_name,
};

/// Raw columns the feature expressions read from.
fn series_frame(series: &PriceSeries) -> PolarsResult<DataFrame> {
    let rows: Vec<u32> = (0..series.len() as u32).collect();
    DataFrame::new(vec![
        Series::new(ROW, rows),
        Series::new(PRICE, series.prices()),
        Series::new(VOLUME, series.volumes()),
    ])
}

/// Fixed-size window that stays null until `size` valid values are available.
fn window(size: usize) -> RollingOptions {
    RollingOptions {
        window_size: Duration::parse(&format!("{}i", size)),
        min_periods: size,
        ..Default::default()
    }
}

/// `(x[t] - x[t-periods]) / x[t-periods]`, null for the first `periods` rows.
fn pct_change(expr: Expr, periods: usize) -> Expr {
    expr.pct_change(lit(periods as i64))
}

/// One expression per derived column, named as in `FeatureConfig::feature_names`.
pub fn feature_exprs(config: &FeatureConfig) -> Vec<Expr> {
    let mut exprs = Vec::new();

    for &w in &config.pct_change_windows {
        exprs.push(pct_change(col(PRICE), w).alias(&pct_change_name(w)));
    }

    // Volatility is the sample std of daily changes, not of prices
    for &w in &config.volatility_windows {
        exprs.push(
            pct_change(col(PRICE), 1)
                .rolling_std(window(w))
                .alias(&volatility_name(w)),
        );
    }

    for &w in &config.volume_spike_windows {
        exprs.push(
            (col(VOLUME) / col(VOLUME).rolling_mean(window(w))).alias(&volume_spike_name(w)),
        );
    }

    // The long leg is divided by its own window length
    if let Some(m) = config.momentum {
        exprs.push(
            (pct_change(col(PRICE), m.short)
                - pct_change(col(PRICE), m.long) / lit(m.long as f64))
            .alias(MOMENTUM),
        );
    }

    exprs
}

/// Row, price, volume and every feature column; undefined cells are null.
pub fn feature_lazy(series: &PriceSeries, config: &FeatureConfig) -> Result<LazyFrame, FeatureError> {
    let df = series_frame(series)?;
    Ok(df.lazy().with_columns(feature_exprs(config)))
}

/// Same row count as the input series, warmup rows left null.
pub fn feature_frame(series: &PriceSeries, config: &FeatureConfig) -> Result<DataFrame, FeatureError> {
    Ok(feature_lazy(series, config)?.collect()?)
}

/// Feature rows for every day where all features are defined.
pub fn derive_features(series: &PriceSeries, config: &FeatureConfig) -> Result<FeatureTable, FeatureError> {
    let feature_names = config.feature_names();
    if series.is_empty() {
        return Ok(FeatureTable {
            feature_names,
            rows: Vec::new(),
        });
    }

    let df = feature_lazy(series, config)?
        // Drop null values created by window operations
        .drop_nulls(None)
        .collect()?;

    let rows = rows_from_frame(&df, series, &feature_names)?
        .into_iter()
        .map(|(_, row)| row)
        .collect();

    Ok(FeatureTable { feature_names, rows })
}

/// The most recent fully defined row, if the series is long enough to have one.
pub fn latest_features(
    series: &PriceSeries,
    config: &FeatureConfig,
) -> Result<Option<FeatureRow>, FeatureError> {
    let mut table = derive_features(series, config)?;
    Ok(table.rows.pop())
}

/// Joins derived columns back onto the series by row position. Rows with a
/// null or NaN feature are skipped; each kept row comes with its index in `df`.
pub(crate) fn rows_from_frame(
    df: &DataFrame,
    series: &PriceSeries,
    feature_names: &[String],
) -> Result<Vec<(usize, FeatureRow)>, FeatureError> {
    let positions = df.column(ROW)?.u32()?;
    let columns = feature_names
        .iter()
        .map(|name| Ok(df.column(name.as_str())?.f64()?.clone()))
        .collect::<Result<Vec<Float64Chunked>, FeatureError>>()?;

    let mut out = Vec::with_capacity(df.height());
    'rows: for i in 0..df.height() {
        let Some(pos) = positions.get(i) else {
            continue;
        };
        let mut features = Vec::with_capacity(columns.len());
        for column in &columns {
            match column.get(i) {
                Some(v) if !v.is_nan() => features.push(v),
                _ => continue 'rows,
            }
        }

        let record = series.records()[pos as usize];
        out.push((
            i,
            FeatureRow {
                date: record.date,
                price: record.price,
                volume: record.volume,
                market_cap: record.market_cap,
                features,
            },
        ));
    }

    Ok(out)
}
