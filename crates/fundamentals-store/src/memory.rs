//! In-memory store implementation.

use async_trait::async_trait;
use fundamentals_core::{
    FundamentalsError, FundamentalsStore, MetricType, MetricTypeId, NewObservation, Observation,
    ObservationQuery, PeriodType, Result, StatementBlock, Ticker, YearMonth,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Key of the catalog uniqueness constraint.
type CatalogKey = (StatementBlock, String);

/// Key of the observation uniqueness constraint.
type ObservationKey = (Ticker, PeriodType, String, String, MetricTypeId);

fn observation_key(row: &NewObservation) -> ObservationKey {
    let (ticker, period, year, month, metric_type_id) = row.unique_key();
    (ticker.clone(), period, year.to_string(), month.to_string(), metric_type_id)
}

#[derive(Debug, Default)]
struct State {
    metric_types: Vec<MetricType>,
    catalog_index: HashMap<CatalogKey, MetricTypeId>,
    observations: Vec<Observation>,
    observation_keys: HashSet<ObservationKey>,
    next_metric_type_id: i64,
    next_observation_id: i64,
}

impl State {
    fn metric_type(&self, id: MetricTypeId) -> Option<&MetricType> {
        self.metric_types.iter().find(|m| m.id == id)
    }
}

/// In-memory store for testing and tooling.
///
/// All data lives behind a single `RwLock`, so a call to
/// [`FundamentalsStore::insert_observations`] is applied as one unit: rows are
/// validated first and nothing is written if any of them references an
/// unknown catalog entry. Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FundamentalsStore for InMemoryStore {
    #[instrument(skip(self))]
    async fn metric_types(&self) -> Result<Vec<MetricType>> {
        Ok(self.state.read().await.metric_types.clone())
    }

    #[instrument(skip(self), fields(block = %statement_block))]
    async fn insert_metric_type(
        &self,
        statement_block: StatementBlock,
        name: &str,
    ) -> Result<Option<MetricTypeId>> {
        let mut state = self.state.write().await;
        let key = (statement_block, name.to_string());
        if state.catalog_index.contains_key(&key) {
            return Ok(None);
        }

        state.next_metric_type_id += 1;
        let id = MetricTypeId::new(state.next_metric_type_id);
        state
            .metric_types
            .push(MetricType::new(id, statement_block, name));
        state.catalog_index.insert(key, id);
        Ok(Some(id))
    }

    #[instrument(skip(self), fields(block = %statement_block))]
    async fn find_metric_type(
        &self,
        statement_block: StatementBlock,
        name: &str,
    ) -> Result<Option<MetricTypeId>> {
        let state = self.state.read().await;
        Ok(state
            .catalog_index
            .get(&(statement_block, name.to_string()))
            .copied())
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_observations(&self, rows: &[NewObservation]) -> Result<usize> {
        let mut state = self.state.write().await;

        if let Some(row) = rows
            .iter()
            .find(|row| state.metric_type(row.metric_type_id).is_none())
        {
            return Err(FundamentalsError::Storage(format!(
                "Unknown metric type {} for ticker {}",
                row.metric_type_id, row.ticker
            )));
        }

        let mut inserted = 0usize;
        for row in rows {
            let Some(metric_type) = state.metric_type(row.metric_type_id).cloned() else {
                continue;
            };
            if !state.observation_keys.insert(observation_key(row)) {
                continue;
            }

            state.next_observation_id += 1;
            let id = state.next_observation_id;
            state.observations.push(Observation {
                id,
                ticker: row.ticker.clone(),
                period: row.period,
                year: row.year.clone(),
                month: row.month.clone(),
                metric_type_id: row.metric_type_id,
                value: row.value,
                metric_type,
            });
            inserted += 1;
        }

        debug!("Inserted {} of {} observations", inserted, rows.len());
        Ok(inserted)
    }

    #[instrument(skip(self), fields(ticker = %query.ticker))]
    async fn observations(&self, query: &ObservationQuery) -> Result<Vec<Observation>> {
        let state = self.state.read().await;
        Ok(state
            .observations
            .iter()
            .filter(|o| query.matches(o))
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn tickers(&self) -> Result<Vec<Ticker>> {
        let state = self.state.read().await;
        let tickers: BTreeSet<&Ticker> = state.observations.iter().map(|o| &o.ticker).collect();
        Ok(tickers.into_iter().cloned().collect())
    }

    #[instrument(skip(self, ticker), fields(ticker = %ticker))]
    async fn periods(&self, ticker: &Ticker) -> Result<Vec<(PeriodType, YearMonth)>> {
        let state = self.state.read().await;
        let periods: BTreeSet<(PeriodType, YearMonth)> = state
            .observations
            .iter()
            .filter(|o| &o.ticker == ticker)
            .map(|o| (o.period, YearMonth::new(o.year.as_str(), o.month.as_str())))
            .collect();
        Ok(periods.into_iter().collect())
    }

    #[instrument(skip(self))]
    async fn observation_count(&self) -> Result<usize> {
        Ok(self.state.read().await.observations.len())
    }
}
