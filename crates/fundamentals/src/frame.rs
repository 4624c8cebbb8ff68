//! Conversion of observations into polars DataFrames.

use fundamentals_core::{FundamentalsError, Observation, Result};
use polars::prelude::{Column, DataFrame};

/// Column names of an observations frame, in order.
pub const OBSERVATION_COLUMNS: [&str; 8] = [
    "id",
    "ticker",
    "period",
    "year",
    "month",
    "statement_block",
    "metric_name",
    "value",
];

/// Builds a frame with one row per observation, in input order.
///
/// # Errors
/// Returns [`FundamentalsError::Frame`] if polars rejects the columns.
pub fn observations_to_frame(observations: &[Observation]) -> Result<DataFrame> {
    let ids: Vec<i64> = observations.iter().map(|o| o.id).collect();
    let tickers: Vec<&str> = observations.iter().map(|o| o.ticker.as_str()).collect();
    let periods: Vec<&str> = observations.iter().map(|o| o.period.as_str()).collect();
    let years: Vec<&str> = observations.iter().map(|o| o.year.as_str()).collect();
    let months: Vec<&str> = observations.iter().map(|o| o.month.as_str()).collect();
    let blocks: Vec<&str> = observations
        .iter()
        .map(|o| o.metric_type.statement_block.as_str())
        .collect();
    let names: Vec<&str> = observations
        .iter()
        .map(|o| o.metric_type.name.as_str())
        .collect();
    let values: Vec<f64> = observations.iter().map(|o| o.value).collect();

    let [id, ticker, period, year, month, block, name, value] = OBSERVATION_COLUMNS;
    DataFrame::new(vec![
        Column::new(id.into(), ids),
        Column::new(ticker.into(), tickers),
        Column::new(period.into(), periods),
        Column::new(year.into(), years),
        Column::new(month.into(), months),
        Column::new(block.into(), blocks),
        Column::new(name.into(), names),
        Column::new(value.into(), values),
    ])
    .map_err(|e| FundamentalsError::Frame(e.to_string()))
}
