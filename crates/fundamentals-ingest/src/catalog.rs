//! Metric catalog discovery and reconciliation.
//!
//! Catalog identities are resolved in two passes before any observation is
//! extracted. [`DiscoveredMetrics`] collects every (statement block, metric
//! name) pair used anywhere in the corpus; [`CatalogBuilder::reconcile`]
//! then persists the missing pairs and freezes the complete mapping into a
//! [`MetricCatalog`]. Extraction only ever reads that mapping.

use fundamentals_core::{
    FundamentalsError, FundamentalsStore, MetricTypeId, Result, StatementBlock,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::document::SourceDocument;

/// Metric names found in the corpus, per statement block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscoveredMetrics {
    metrics: BTreeMap<StatementBlock, BTreeSet<String>>,
}

impl DiscoveredMetrics {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the metric names of every recognized block in both period sections.
    pub fn observe(&mut self, document: &SourceDocument) {
        for (_, section) in document.sections() {
            for (block, metrics) in section.recognized_blocks() {
                let names = self.metrics.entry(block).or_default();
                for name in metrics.keys() {
                    if !names.contains(name) {
                        names.insert(name.clone());
                    }
                }
            }
        }
    }

    /// Returns true if the pair was seen.
    #[must_use]
    pub fn contains(&self, block: StatementBlock, name: &str) -> bool {
        self.metrics.get(&block).is_some_and(|names| names.contains(name))
    }

    /// Returns the number of distinct pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.metrics.values().map(BTreeSet::len).sum()
    }

    /// Returns true if nothing was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every pair, grouped by block in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (StatementBlock, &str)> {
        self.metrics
            .iter()
            .flat_map(|(block, names)| names.iter().map(move |name| (*block, name.as_str())))
    }
}

/// Collects the metrics used by a set of documents.
pub fn discover<'a>(documents: impl IntoIterator<Item = &'a SourceDocument>) -> DiscoveredMetrics {
    let mut discovered = DiscoveredMetrics::new();
    for document in documents {
        discovered.observe(document);
    }
    discovered
}

/// Immutable mapping from (statement block, metric name) to catalog identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricCatalog {
    ids: HashMap<StatementBlock, HashMap<String, MetricTypeId>>,
    created: usize,
}

impl MetricCatalog {
    /// Resolves a metric to its catalog identity.
    #[must_use]
    pub fn get(&self, block: StatementBlock, name: &str) -> Option<MetricTypeId> {
        self.ids.get(&block)?.get(name).copied()
    }

    /// Returns the number of resolvable pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.values().map(HashMap::len).sum()
    }

    /// Returns true if nothing can be resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns how many entries the build that produced this catalog inserted.
    #[must_use]
    pub const fn created(&self) -> usize {
        self.created
    }

    fn insert(&mut self, block: StatementBlock, name: &str, id: MetricTypeId) {
        self.ids.entry(block).or_default().insert(name.to_string(), id);
    }
}

impl FromIterator<(StatementBlock, String, MetricTypeId)> for MetricCatalog {
    fn from_iter<I: IntoIterator<Item = (StatementBlock, String, MetricTypeId)>>(iter: I) -> Self {
        let mut catalog = Self::default();
        for (block, name, id) in iter {
            catalog.insert(block, &name, id);
        }
        catalog
    }
}

/// Reconciles discovered metrics against the persisted catalog.
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    store: Arc<dyn FundamentalsStore>,
}

impl CatalogBuilder {
    /// Creates a builder writing to the given store.
    #[must_use]
    pub fn new(store: Arc<dyn FundamentalsStore>) -> Self {
        Self { store }
    }

    /// Builds the complete catalog for a set of discovered metrics.
    ///
    /// Existing entries are loaded with one store call. Each discovered pair
    /// not yet present is inserted; if the insert reports a conflict (another
    /// builder got there first) the id is read back instead.
    ///
    /// # Errors
    /// Returns an error if the store fails.
    #[instrument(skip(self, discovered), fields(discovered = discovered.len()))]
    pub async fn reconcile(&self, discovered: &DiscoveredMetrics) -> Result<MetricCatalog> {
        let mut catalog: MetricCatalog = self
            .store
            .metric_types()
            .await?
            .into_iter()
            .map(|m| (m.statement_block, m.name, m.id))
            .collect();
        debug!("Loaded {} existing catalog entries", catalog.len());

        for (block, name) in discovered.iter() {
            if catalog.get(block, name).is_some() {
                continue;
            }

            let id = match self.store.insert_metric_type(block, name).await? {
                Some(id) => {
                    catalog.created += 1;
                    id
                }
                None => {
                    debug!(block = %block, name, "Catalog entry created concurrently, re-reading");
                    self.store
                        .find_metric_type(block, name)
                        .await?
                        .ok_or_else(|| {
                            FundamentalsError::Storage(format!(
                                "Catalog entry {block}/{name} conflicted on insert but cannot be read"
                            ))
                        })?
                }
            };
            catalog.insert(block, name, id);
        }

        info!(
            entries = catalog.len(),
            created = catalog.created,
            "Metric catalog reconciled"
        );
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundamentals_core::{
        MetricType, NewObservation, Observation, ObservationQuery, PeriodType, Ticker, YearMonth,
    };
    use fundamentals_store::{InMemoryStore, SqliteStore};
    use serde_json::json;

    fn document(value: serde_json::Value) -> SourceDocument {
        serde_json::from_value(value).unwrap()
    }

    fn corpus() -> Vec<SourceDocument> {
        vec![
            document(json!({"financials": {
                "annuals": {
                    "Fiscal Year": ["2022-12"],
                    "income_statement": {"Revenue": ["1"], "Net Income": ["2"]},
                    "not_a_block": {"Ignored": ["3"]}
                },
                "quarterly": {
                    "Fiscal Year": ["2022-09"],
                    "income_statement": {"Revenue": ["1"]},
                    "balance_sheet": {"Cash": ["4"]}
                }
            }})),
            document(json!({"financials": {
                "annuals": {
                    "Fiscal Year": ["2022-03"],
                    "income_statement": {"Revenue": ["7"]},
                    "per_share_data_array": {"EPS": ["0.5"]}
                }
            }})),
            document(json!({"other": {}})),
        ]
    }

    #[test]
    fn test_discovery_collapses_duplicates() {
        let discovered = discover(&corpus());

        assert_eq!(discovered.len(), 4);
        assert!(discovered.contains(StatementBlock::IncomeStatement, "Revenue"));
        assert!(discovered.contains(StatementBlock::IncomeStatement, "Net Income"));
        assert!(discovered.contains(StatementBlock::BalanceSheet, "Cash"));
        assert!(discovered.contains(StatementBlock::PerShareData, "EPS"));
        assert!(!discovered.contains(StatementBlock::Other, "Ignored"));
    }

    #[tokio::test]
    async fn test_reconcile_assigns_ids() {
        let store = Arc::new(InMemoryStore::new());
        let builder = CatalogBuilder::new(store.clone());

        let catalog = builder.reconcile(&discover(&corpus())).await.unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.created(), 4);
        assert!(catalog.get(StatementBlock::BalanceSheet, "Cash").is_some());
        assert!(catalog.get(StatementBlock::BalanceSheet, "Revenue").is_none());
        assert_eq!(store.metric_types().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let builder = CatalogBuilder::new(store.clone());
        let discovered = discover(&corpus());

        let first = builder.reconcile(&discovered).await.unwrap();
        let second = builder.reconcile(&discovered).await.unwrap();

        assert_eq!(second.created(), 0);
        for (block, name) in discovered.iter() {
            assert_eq!(first.get(block, name), second.get(block, name));
        }
        assert_eq!(store.metric_types().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_reconcile_keeps_existing_ids() {
        let store = Arc::new(InMemoryStore::new());
        let existing = store
            .insert_metric_type(StatementBlock::BalanceSheet, "Cash")
            .await
            .unwrap()
            .unwrap();

        let catalog = CatalogBuilder::new(store)
            .reconcile(&discover(&corpus()))
            .await
            .unwrap();
        assert_eq!(catalog.get(StatementBlock::BalanceSheet, "Cash"), Some(existing));
        assert_eq!(catalog.created(), 3);
    }

    /// Store whose catalog reads are stale, as if another builder inserted
    /// every entry between our load and our inserts.
    #[derive(Debug)]
    struct RacingStore {
        inner: InMemoryStore,
    }

    #[async_trait::async_trait]
    impl FundamentalsStore for RacingStore {
        async fn metric_types(&self) -> Result<Vec<MetricType>> {
            Ok(Vec::new())
        }

        async fn insert_metric_type(
            &self,
            statement_block: StatementBlock,
            name: &str,
        ) -> Result<Option<MetricTypeId>> {
            self.inner.insert_metric_type(statement_block, name).await?;
            Ok(None)
        }

        async fn find_metric_type(
            &self,
            statement_block: StatementBlock,
            name: &str,
        ) -> Result<Option<MetricTypeId>> {
            self.inner.find_metric_type(statement_block, name).await
        }

        async fn insert_observations(
            &self,
            rows: &[NewObservation],
        ) -> Result<usize> {
            self.inner.insert_observations(rows).await
        }

        async fn observations(
            &self,
            query: &ObservationQuery,
        ) -> Result<Vec<Observation>> {
            self.inner.observations(query).await
        }

        async fn tickers(&self) -> Result<Vec<Ticker>> {
            self.inner.tickers().await
        }

        async fn periods(
            &self,
            ticker: &Ticker,
        ) -> Result<Vec<(PeriodType, YearMonth)>> {
            self.inner.periods(ticker).await
        }

        async fn observation_count(&self) -> Result<usize> {
            self.inner.observation_count().await
        }
    }

    #[tokio::test]
    async fn test_reconcile_rereads_on_conflict() {
        let store = Arc::new(RacingStore {
            inner: InMemoryStore::new(),
        });

        let catalog = CatalogBuilder::new(store.clone())
            .reconcile(&discover(&corpus()))
            .await
            .unwrap();

        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.created(), 0);
        let cash = store
            .inner
            .find_metric_type(StatementBlock::BalanceSheet, "Cash")
            .await
            .unwrap();
        assert_eq!(catalog.get(StatementBlock::BalanceSheet, "Cash"), cash);
    }
}
