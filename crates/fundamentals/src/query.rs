//! Read-side operations over a fundamentals store.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use fundamentals_core::{
    Availability, FundamentalsError, FundamentalsStore, MetricType, Observation, ObservationQuery,
    Result, Ticker,
};
use polars::prelude::DataFrame;
use tracing::{debug, instrument};

use crate::frame::observations_to_frame;

/// Serves catalog, observation, ticker and availability queries.
///
/// # Example
///
/// ```rust,ignore
/// use fundamentals::{ObservationQuery, PeriodType, QueryEngine, SqliteStore};
/// use std::sync::Arc;
///
/// let engine = QueryEngine::new(Arc::new(SqliteStore::new("fundamentals.db")?));
/// let rows = engine
///     .query_observations(&ObservationQuery::new("XYZ").with_period(PeriodType::Annual))
///     .await?;
/// ```
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn FundamentalsStore>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("store", &"configured")
            .finish()
    }
}

impl QueryEngine {
    /// Creates an engine reading from a store.
    #[must_use]
    pub fn new(store: Arc<dyn FundamentalsStore>) -> Self {
        Self { store }
    }

    /// Returns the full metric catalog, ordered by id.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn list_data_types(&self) -> Result<Vec<MetricType>> {
        self.store.metric_types().await
    }

    /// Returns the observations matching a query, each with its catalog entry.
    ///
    /// # Errors
    /// Returns [`FundamentalsError::NotFound`] if nothing matches,
    /// [`FundamentalsError::InvalidParameter`] if the ticker is blank, or an
    /// error if the store fails.
    #[instrument(skip(self, query), fields(ticker = %query.ticker))]
    pub async fn query_observations(&self, query: &ObservationQuery) -> Result<Vec<Observation>> {
        require_ticker(&query.ticker)?;
        let rows = self.store.observations(query).await?;
        if rows.is_empty() {
            debug!("No observations matched");
            return Err(FundamentalsError::not_found(query.ticker.as_str()));
        }
        debug!("Matched {} observations", rows.len());
        Ok(rows)
    }

    /// Returns every ticker with at least one observation.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    pub async fn list_tickers(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .tickers()
            .await?
            .into_iter()
            .map(|t| t.as_str().to_string())
            .collect())
    }

    /// Summarizes the fiscal periods held for a ticker.
    ///
    /// Each (year, month) appears at most once per period type, ordered by
    /// year then month.
    ///
    /// # Errors
    /// Returns [`FundamentalsError::NotFound`] if the ticker has no
    /// observations, [`FundamentalsError::InvalidParameter`] if it is blank,
    /// or an error if the store fails.
    #[instrument(skip(self, ticker), fields(ticker = %ticker))]
    pub async fn availability(&self, ticker: &Ticker) -> Result<Availability> {
        require_ticker(ticker)?;
        let mut periods = self.store.periods(ticker).await?;
        periods.sort();

        let mut seen = HashSet::new();
        let mut availability = Availability::new();
        for (period, entry) in periods {
            if seen.insert((period, entry.clone())) {
                availability.push(period, entry);
            }
        }
        if availability.is_empty() {
            return Err(FundamentalsError::not_found(ticker.as_str()));
        }
        Ok(availability)
    }

    /// Runs [`Self::query_observations`] and returns the rows as a DataFrame.
    ///
    /// # Errors
    /// Same as [`Self::query_observations`], plus
    /// [`FundamentalsError::Frame`] if the frame cannot be built.
    pub async fn observations_frame(&self, query: &ObservationQuery) -> Result<DataFrame> {
        let rows = self.query_observations(query).await?;
        observations_to_frame(&rows)
    }
}

fn require_ticker(ticker: &Ticker) -> Result<()> {
    if ticker.as_str().trim().is_empty() {
        return Err(FundamentalsError::InvalidParameter(
            "ticker must not be empty".to_string(),
        ));
    }
    Ok(())
}
