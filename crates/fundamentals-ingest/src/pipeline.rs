//! The ingestion pipeline: discover, reconcile, then extract and load.

use chrono::{DateTime, Utc};
use fundamentals_core::{FundamentalsStore, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::catalog::{CatalogBuilder, DiscoveredMetrics};
use crate::corpus::Corpus;
use crate::extract::extract_rows;
use crate::loader::{BatchLoader, DEFAULT_CHUNK_SIZE};

/// Ingestion tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngestConfig {
    /// Rows written per atomic chunk.
    pub chunk_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl IngestConfig {
    /// Sets the chunk size. Zero is treated as one.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Summary of one ingestion run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Documents found in the folder, unreadable ones included.
    pub files_scanned: usize,
    /// Documents that could not be read or parsed.
    pub files_skipped: usize,
    /// Distinct (statement block, metric name) pairs in the corpus.
    pub metrics_discovered: usize,
    /// Catalog entries this run created.
    pub metric_types_created: usize,
    /// Observations extracted from the documents.
    pub rows_extracted: usize,
    /// Raw values that did not become observations.
    pub values_dropped: usize,
    /// Metrics skipped for lack of a catalog identity.
    pub unmapped_metrics: usize,
    /// Observations newly stored; the rest already existed.
    pub rows_inserted: usize,
    /// Chunks committed.
    pub chunks_committed: usize,
}

/// Runs ingestions against a store.
#[derive(Debug, Clone)]
pub struct Ingestor {
    store: Arc<dyn FundamentalsStore>,
    config: IngestConfig,
}

impl Ingestor {
    /// Creates an ingestor with the default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn FundamentalsStore>) -> Self {
        Self {
            store,
            config: IngestConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub const fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    /// Ingests every `.json` document directly inside a folder.
    ///
    /// # Errors
    /// Returns an error if the folder cannot be listed or the store fails.
    pub async fn ingest_dir(&self, dir: impl AsRef<Path>) -> Result<IngestReport> {
        let corpus = Corpus::open(dir).await?;
        self.run(&corpus).await
    }

    /// Ingests a corpus.
    ///
    /// Every document is read twice: once to discover the metrics it uses and
    /// once to extract its rows, so the whole catalog is settled before any
    /// observation is written. Documents that cannot be read or parsed are
    /// logged and skipped in both passes.
    ///
    /// # Errors
    /// Returns an error if the store fails. Chunks committed before the
    /// failure stay committed; re-running the ingestion completes the load.
    #[instrument(skip(self, corpus), fields(files = corpus.len()))]
    pub async fn run(&self, corpus: &Corpus) -> Result<IngestReport> {
        let started_at = Utc::now();
        info!("Starting ingestion of {} files", corpus.len());
        let files_scanned = corpus.len() + corpus.unreadable().len();

        // Discover
        let mut discovered = DiscoveredMetrics::new();
        let mut skipped: HashSet<PathBuf> = corpus.unreadable().iter().cloned().collect();
        for entry in corpus.entries() {
            match entry.load().await {
                Ok(document) => discovered.observe(&document),
                Err(e) => {
                    warn!(ticker = %entry.ticker, error = %e, "Skipping unreadable document");
                    skipped.insert(entry.path.clone());
                }
            }
        }
        info!(metrics = discovered.len(), skipped = skipped.len(), "Discovery complete");

        // Reconcile
        let catalog = CatalogBuilder::new(self.store.clone())
            .reconcile(&discovered)
            .await?;

        // Extract and load
        let mut loader = BatchLoader::new(self.store.clone(), self.config.chunk_size);
        let mut rows_extracted = 0;
        let mut values_dropped = 0;
        let mut unmapped_metrics = 0;
        for entry in corpus.entries() {
            if skipped.contains(&entry.path) {
                continue;
            }
            let document = match entry.load().await {
                Ok(document) => document,
                Err(e) => {
                    warn!(ticker = %entry.ticker, error = %e, "Document became unreadable, skipping");
                    skipped.insert(entry.path.clone());
                    continue;
                }
            };

            let extraction = extract_rows(&entry.ticker, &document, &catalog);
            rows_extracted += extraction.rows.len();
            values_dropped += extraction.dropped_values;
            unmapped_metrics += extraction.unmapped_metrics;
            loader.push(extraction.rows).await?;
        }
        let stats = loader.finish().await?;

        let report = IngestReport {
            started_at,
            finished_at: Utc::now(),
            files_scanned,
            files_skipped: skipped.len(),
            metrics_discovered: discovered.len(),
            metric_types_created: catalog.created(),
            rows_extracted,
            values_dropped,
            unmapped_metrics,
            rows_inserted: stats.rows_inserted,
            chunks_committed: stats.chunks_committed,
        };

        info!(
            files = report.files_scanned,
            skipped = report.files_skipped,
            extracted = report.rows_extracted,
            inserted = report.rows_inserted,
            "Ingestion complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundamentals_core::{ObservationQuery, PeriodType, StatementBlock, Ticker};
    use fundamentals_store::SqliteStore;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: &serde_json::Value) {
        std::fs::write(dir.join(name), serde_json::to_string(value).unwrap()).unwrap();
    }

    fn xyz() -> serde_json::Value {
        json!({"financials": {"annuals": {
            "Fiscal Year": ["2022-03", "2023-03"],
            "income_statement": {"Revenue": ["1500.0", "N/A"]}
        }}})
    }

    #[tokio::test]
    async fn test_ingests_folder() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "XYZ.json", &xyz());
        write(
            dir.path(),
            "ABC.json",
            &json!({"financials": {"quarterly": {
                "Fiscal Year": ["2022-06", "TTM"],
                "balance_sheet": {"Cash": [10, 11]}
            }}}),
        );
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let report = Ingestor::new(store.clone()).ingest_dir(dir.path()).await.unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_skipped, 0);
        assert_eq!(report.metrics_discovered, 2);
        assert_eq!(report.metric_types_created, 2);
        assert_eq!(report.rows_extracted, 2);
        assert_eq!(report.values_dropped, 2);
        assert_eq!(report.rows_inserted, 2);
        assert_eq!(report.chunks_committed, 1);
        assert!(report.finished_at >= report.started_at);

        let rows = store
            .observations(&ObservationQuery::new(Ticker::new("XYZ")))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period, PeriodType::Annual);
        assert_eq!((rows[0].year.as_str(), rows[0].month.as_str()), ("2022", "03"));
        assert_eq!(rows[0].value, 1500.0);
        assert_eq!(rows[0].metric_type.statement_block, StatementBlock::IncomeStatement);
        assert_eq!(rows[0].metric_type.name, "Revenue");
    }

    #[tokio::test]
    async fn test_rerun_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "XYZ.json", &xyz());

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = Ingestor::new(store.clone());
        ingestor.ingest_dir(dir.path()).await.unwrap();
        let catalog_before = store.metric_types().await.unwrap();

        let report = ingestor.ingest_dir(dir.path()).await.unwrap();
        assert_eq!(report.rows_extracted, 1);
        assert_eq!(report.rows_inserted, 0);
        assert_eq!(report.metric_types_created, 0);
        assert_eq!(store.observation_count().await.unwrap(), 1);
        assert_eq!(store.metric_types().await.unwrap(), catalog_before);
    }

    #[tokio::test]
    async fn test_overlapping_files_keep_first_value() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "XYZ.json", &xyz());

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ingestor = Ingestor::new(store.clone());
        ingestor.ingest_dir(dir.path()).await.unwrap();

        // Same fact with a different value, plus one new fact
        write(
            dir.path(),
            "XYZ.json",
            &json!({"financials": {"annuals": {
                "Fiscal Year": ["2022-03", "2024-03"],
                "income_statement": {"Revenue": ["9999", "1700"]}
            }}}),
        );
        let report = ingestor.ingest_dir(dir.path()).await.unwrap();
        assert_eq!(report.rows_inserted, 1);

        let rows = store
            .observations(&ObservationQuery::new(Ticker::new("XYZ")).with_year("2022"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 1500.0);
    }

    #[tokio::test]
    async fn test_bad_document_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "XYZ.json", &xyz());
        std::fs::write(dir.path().join("BROKEN.json"), "{\"financials\": [").unwrap();

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let report = Ingestor::new(store.clone())
            .with_config(IngestConfig::default().with_chunk_size(1))
            .ingest_dir(dir.path())
            .await
            .unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(store.tickers().await.unwrap(), vec![Ticker::new("XYZ")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_documents_are_ingested() {
        let dir = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        write(target.path(), "xyz.json", &xyz());
        std::os::unix::fs::symlink(target.path().join("xyz.json"), dir.path().join("XYZ.json"))
            .unwrap();
        std::os::unix::fs::symlink(dir.path().join("absent.json"), dir.path().join("DEAD.json"))
            .unwrap();

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let report = Ingestor::new(store.clone()).ingest_dir(dir.path()).await.unwrap();

        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(store.tickers().await.unwrap(), vec![Ticker::new("XYZ")]);
    }

    #[tokio::test]
    async fn test_empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = Ingestor::new(store.clone()).ingest_dir(dir.path()).await.unwrap();
        assert_eq!(report.files_scanned, 0);
        assert_eq!(report.rows_inserted, 0);
        assert_eq!(report.chunks_committed, 0);
        assert!(store.metric_types().await.unwrap().is_empty());
    }
}
