//! Core data types for the fundamentals store.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Ticker`] - Ticker symbol, taken verbatim from the source file name
//! - [`MetricTypeId`] - Stable catalog identity
//! - [`MetricType`] - Catalog entry for a (statement block, metric name) pair
//! - [`NewObservation`] - Extracted fact awaiting persistence
//! - [`Observation`] - Stored fact joined with its catalog entry
//! - [`ObservationQuery`] - Filter predicates over observations
//! - [`YearMonth`] / [`Availability`] - Per-ticker availability summary

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::period::{PeriodType, StatementBlock};

/// A ticker symbol.
///
/// Tickers are not validated or case-folded; queries match them exactly as
/// they were ingested.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticker(String);

impl Ticker {
    /// Creates a new ticker from a string.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the ticker as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Ticker {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Stable surrogate key of a catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricTypeId(i64);

impl MetricTypeId {
    /// Wraps a raw storage id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw storage id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MetricTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog entry: one metric name under one statement block.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricType {
    /// Stable identity, assigned on first sight.
    pub id: MetricTypeId,
    /// Statement block the metric is reported under.
    #[serde(rename = "type")]
    pub statement_block: StatementBlock,
    /// Metric label as it appears in source data.
    pub name: String,
}

impl MetricType {
    /// Creates a new catalog entry.
    #[must_use]
    pub fn new(id: MetricTypeId, statement_block: StatementBlock, name: impl Into<String>) -> Self {
        Self {
            id,
            statement_block,
            name: name.into(),
        }
    }
}

/// A fiscal (year, month) pair, kept exactly as labeled in the source.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    /// Fiscal year component.
    pub year: String,
    /// Fiscal month component.
    pub month: String,
}

impl YearMonth {
    /// Creates a new year/month pair.
    #[must_use]
    pub fn new(year: impl Into<String>, month: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            month: month.into(),
        }
    }
}

/// An extracted fact that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewObservation {
    /// Ticker the fact belongs to.
    pub ticker: Ticker,
    /// Reporting granularity.
    pub period: PeriodType,
    /// Fiscal year.
    pub year: String,
    /// Fiscal month.
    pub month: String,
    /// Catalog identity of the metric.
    pub metric_type_id: MetricTypeId,
    /// Reported value.
    pub value: f64,
}

impl NewObservation {
    /// The (ticker, period, year, month, metric) tuple that must be unique in storage.
    #[must_use]
    pub fn unique_key(&self) -> (&Ticker, PeriodType, &str, &str, MetricTypeId) {
        (
            &self.ticker,
            self.period,
            &self.year,
            &self.month,
            self.metric_type_id,
        )
    }
}

/// A stored fact joined with its catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Storage id.
    pub id: i64,
    /// Ticker the fact belongs to.
    pub ticker: Ticker,
    /// Reporting granularity.
    pub period: PeriodType,
    /// Fiscal year.
    pub year: String,
    /// Fiscal month.
    pub month: String,
    /// Catalog identity of the metric.
    #[serde(rename = "fundamental_data_type_id")]
    pub metric_type_id: MetricTypeId,
    /// Reported value.
    pub value: f64,
    /// The joined catalog entry.
    #[serde(rename = "data_type")]
    pub metric_type: MetricType,
}

/// Filter predicates over stored observations.
///
/// The ticker is mandatory; every other predicate is an optional exact match.
/// All predicates that are set are ANDed together.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationQuery {
    /// Ticker to match exactly.
    pub ticker: Ticker,
    /// Reporting granularity.
    pub period: Option<PeriodType>,
    /// Fiscal year.
    pub year: Option<String>,
    /// Fiscal month.
    pub month: Option<String>,
    /// Statement block of the joined catalog entry.
    pub statement_block: Option<StatementBlock>,
    /// Metric name of the joined catalog entry.
    pub metric_name: Option<String>,
}

impl ObservationQuery {
    /// Creates a query matching every observation of a ticker.
    #[must_use]
    pub fn new(ticker: impl Into<Ticker>) -> Self {
        Self {
            ticker: ticker.into(),
            ..Default::default()
        }
    }

    /// Restricts the query to one period type.
    #[must_use]
    pub const fn with_period(mut self, period: PeriodType) -> Self {
        self.period = Some(period);
        self
    }

    /// Restricts the query to one fiscal year.
    #[must_use]
    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    /// Restricts the query to one fiscal month.
    #[must_use]
    pub fn with_month(mut self, month: impl Into<String>) -> Self {
        self.month = Some(month.into());
        self
    }

    /// Restricts the query to one statement block.
    #[must_use]
    pub const fn with_statement_block(mut self, block: StatementBlock) -> Self {
        self.statement_block = Some(block);
        self
    }

    /// Restricts the query to one metric name.
    #[must_use]
    pub fn with_metric_name(mut self, name: impl Into<String>) -> Self {
        self.metric_name = Some(name.into());
        self
    }

    /// Returns true if the observation satisfies every predicate.
    #[must_use]
    pub fn matches(&self, observation: &Observation) -> bool {
        observation.ticker == self.ticker
            && self.period.is_none_or(|p| observation.period == p)
            && self.year.as_ref().is_none_or(|y| &observation.year == y)
            && self.month.as_ref().is_none_or(|m| &observation.month == m)
            && self
                .statement_block
                .is_none_or(|b| observation.metric_type.statement_block == b)
            && self
                .metric_name
                .as_ref()
                .is_none_or(|n| &observation.metric_type.name == n)
    }
}

/// Distinct (year, month) pairs present for a ticker, grouped by period type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Availability(BTreeMap<PeriodType, Vec<YearMonth>>);

impl Availability {
    /// Creates an empty summary.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Appends a pair under a period type. Callers are responsible for uniqueness.
    pub fn push(&mut self, period: PeriodType, entry: YearMonth) {
        self.0.entry(period).or_default().push(entry);
    }

    /// Returns the pairs recorded for a period type.
    #[must_use]
    pub fn get(&self, period: PeriodType) -> Option<&[YearMonth]> {
        self.0.get(&period).map(Vec::as_slice)
    }

    /// Returns true if no period type has any pair.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
