//! Chunked, idempotent loading of extracted observations.

use fundamentals_core::{FundamentalsStore, NewObservation, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default number of rows written per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 50_000;

/// Counters for one loader.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Rows handed to the store.
    pub rows_attempted: usize,
    /// Rows the store actually inserted; the rest were already present.
    pub rows_inserted: usize,
    /// Chunks committed.
    pub chunks_committed: usize,
}

/// Buffers observations and writes them to the store in chunks.
///
/// Each chunk is written with one [`FundamentalsStore::insert_observations`]
/// call, so it commits entirely or not at all. Facts that are already stored
/// are skipped by the store, which makes reloading the same rows harmless.
#[derive(Debug)]
pub struct BatchLoader {
    store: Arc<dyn FundamentalsStore>,
    chunk_size: usize,
    buffer: Vec<NewObservation>,
    stats: LoadStats,
}

impl BatchLoader {
    /// Creates a loader flushing every `chunk_size` rows (at least one).
    #[must_use]
    pub fn new(store: Arc<dyn FundamentalsStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            buffer: Vec::new(),
            stats: LoadStats::default(),
        }
    }

    /// Returns the number of rows waiting to be written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the counters so far.
    #[must_use]
    pub const fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Buffers rows, flushing once a full chunk has accumulated.
    ///
    /// # Errors
    /// Returns an error if a flush fails; chunks committed before it stay committed.
    pub async fn push(&mut self, rows: Vec<NewObservation>) -> Result<()> {
        self.buffer.extend(rows);
        if self.buffer.len() >= self.chunk_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Writes every buffered row, one chunk per store call. Does nothing if
    /// the buffer is empty.
    ///
    /// # Errors
    /// Returns the first store error; the failing chunk is not committed.
    #[instrument(skip(self), fields(pending = self.buffer.len()))]
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let rows = std::mem::take(&mut self.buffer);
        for chunk in rows.chunks(self.chunk_size) {
            let inserted = self.store.insert_observations(chunk).await?;
            self.stats.rows_attempted += chunk.len();
            self.stats.rows_inserted += inserted;
            self.stats.chunks_committed += 1;
            debug!(
                rows = chunk.len(),
                inserted,
                chunk = self.stats.chunks_committed,
                "Committed chunk"
            );
        }
        Ok(())
    }

    /// Flushes the remaining rows and returns the final counters.
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    pub async fn finish(mut self) -> Result<LoadStats> {
        self.flush().await?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundamentals_core::{MetricTypeId, PeriodType, StatementBlock, Ticker};
    use fundamentals_store::{InMemoryStore, SqliteStore};

    fn rows(metric: MetricTypeId, years: std::ops::Range<u32>) -> Vec<NewObservation> {
        years
            .map(|year| NewObservation {
                ticker: Ticker::new("AAPL"),
                period: PeriodType::Annual,
                year: year.to_string(),
                month: "09".to_string(),
                metric_type_id: metric,
                value: f64::from(year),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = Arc::new(InMemoryStore::new());
        let loader = BatchLoader::new(store.clone(), 10);

        let stats = loader.finish().await.unwrap();
        assert_eq!(stats, LoadStats::default());
        assert_eq!(store.observation_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_flushes_in_chunks() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let metric = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap()
            .unwrap();

        let mut loader = BatchLoader::new(store.clone(), 4);
        loader.push(rows(metric, 2000..2003)).await.unwrap();
        assert_eq!(loader.pending(), 3);
        assert_eq!(loader.stats().chunks_committed, 0);

        // Crossing the threshold flushes everything buffered, one chunk per four rows
        loader.push(rows(metric, 2003..2009)).await.unwrap();
        assert_eq!(loader.pending(), 0);
        assert_eq!(loader.stats().chunks_committed, 3);

        loader.push(rows(metric, 2009..2010)).await.unwrap();
        let stats = loader.finish().await.unwrap();

        assert_eq!(stats.rows_attempted, 10);
        assert_eq!(stats.rows_inserted, 10);
        assert_eq!(stats.chunks_committed, 4);
        assert_eq!(store.observation_count().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_reloading_adds_nothing() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let metric = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap()
            .unwrap();

        let mut first = BatchLoader::new(store.clone(), 3);
        first.push(rows(metric, 2000..2007)).await.unwrap();
        first.finish().await.unwrap();

        let mut second = BatchLoader::new(store.clone(), 100);
        second.push(rows(metric, 2000..2007)).await.unwrap();
        let stats = second.finish().await.unwrap();

        assert_eq!(stats.rows_attempted, 7);
        assert_eq!(stats.rows_inserted, 0);
        assert_eq!(store.observation_count().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_failed_chunk_keeps_earlier_chunks() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let metric = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap()
            .unwrap();

        let mut batch = rows(metric, 2000..2004);
        batch.extend(rows(MetricTypeId::new(404), 2004..2005));

        let mut loader = BatchLoader::new(store.clone(), 2);
        loader.push(batch).await.unwrap_err();

        // Earlier chunks stay committed; the chunk holding the bad row rolls back whole
        assert_eq!(loader.stats().chunks_committed, 2);
        assert_eq!(store.observation_count().await.unwrap(), 4);
    }
}
