//! Storage trait for the metric catalog and observations.
//!
//! This module defines the [`FundamentalsStore`] trait, the transactional
//! client that the ingestion pipeline and the query engine are handed.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::Result,
    period::{PeriodType, StatementBlock},
    types::{
        MetricType, MetricTypeId, NewObservation, Observation, ObservationQuery, Ticker, YearMonth,
    },
};

/// Transactional storage for catalog entries and observations.
///
/// Implementations enforce two uniqueness constraints: (statement block,
/// metric name) on the catalog, and (ticker, period, year, month, metric type)
/// on observations. Writes that hit either constraint are skipped, never
/// surfaced as errors and never overwrite existing rows.
#[async_trait]
pub trait FundamentalsStore: Send + Sync + Debug {
    /// Returns every catalog entry, ordered by id.
    async fn metric_types(&self) -> Result<Vec<MetricType>>;

    /// Inserts a catalog entry.
    ///
    /// Returns `Ok(Some(id))` with the newly assigned id, or `Ok(None)` if the
    /// pair already exists.
    async fn insert_metric_type(
        &self,
        statement_block: StatementBlock,
        name: &str,
    ) -> Result<Option<MetricTypeId>>;

    /// Looks up the id of an existing catalog entry.
    async fn find_metric_type(
        &self,
        statement_block: StatementBlock,
        name: &str,
    ) -> Result<Option<MetricTypeId>>;

    /// Inserts observations as one atomic unit, skipping rows that conflict
    /// with an existing fact.
    ///
    /// Returns the number of rows actually inserted. If any row fails for a
    /// reason other than a uniqueness conflict, nothing is committed.
    async fn insert_observations(&self, rows: &[NewObservation]) -> Result<usize>;

    /// Returns the observations matching a query, joined with their catalog
    /// entries and ordered by id. An empty result is not an error here.
    async fn observations(&self, query: &ObservationQuery) -> Result<Vec<Observation>>;

    /// Returns the distinct tickers that have at least one observation.
    async fn tickers(&self) -> Result<Vec<Ticker>>;

    /// Returns the distinct (period, year, month) combinations stored for a
    /// ticker, ordered by period then year then month.
    async fn periods(&self, ticker: &Ticker) -> Result<Vec<(PeriodType, YearMonth)>>;

    /// Returns the total number of stored observations.
    async fn observation_count(&self) -> Result<usize>;
}
