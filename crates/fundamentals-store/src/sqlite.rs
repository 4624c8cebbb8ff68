//! SQLite-based store implementation.

use async_trait::async_trait;
use fundamentals_core::{
    FundamentalsError, FundamentalsStore, MetricType, MetricTypeId, NewObservation, Observation,
    ObservationQuery, PeriodType, Result, StatementBlock, Ticker, YearMonth,
};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument};

const INSERT_METRIC_TYPE: &str = "
    INSERT INTO fundamental_data_type (statement_block, metric_name)
    VALUES (?1, ?2)
    ON CONFLICT (statement_block, metric_name) DO NOTHING
    RETURNING id
";

const FIND_METRIC_TYPE: &str = "
    SELECT id FROM fundamental_data_type
    WHERE statement_block = ?1 AND metric_name = ?2
";

const SELECT_METRIC_TYPES: &str = "
    SELECT id, statement_block, metric_name FROM fundamental_data_type
    ORDER BY id
";

const INSERT_OBSERVATION: &str = "
    INSERT INTO fundamental_data
        (ticker, period, year, month, fundamental_data_type_id, value)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT (ticker, period, year, month, fundamental_data_type_id) DO NOTHING
";

const SELECT_OBSERVATIONS: &str = "
    SELECT d.id, d.ticker, d.period, d.year, d.month, d.fundamental_data_type_id, d.value,
           t.statement_block, t.metric_name
    FROM fundamental_data d
    JOIN fundamental_data_type t ON t.id = d.fundamental_data_type_id
    WHERE d.ticker = ?
";

/// Observation row as read from SQLite, before enum columns are parsed.
struct ObservationRow {
    id: i64,
    ticker: String,
    period: String,
    year: String,
    month: String,
    metric_type_id: i64,
    value: f64,
    statement_block: String,
    metric_name: String,
}

impl ObservationRow {
    fn into_observation(self) -> Result<Observation> {
        let metric_type_id = MetricTypeId::new(self.metric_type_id);
        Ok(Observation {
            id: self.id,
            ticker: Ticker::new(self.ticker),
            period: self.period.parse()?,
            year: self.year,
            month: self.month,
            metric_type_id,
            value: self.value,
            metric_type: MetricType::new(
                metric_type_id,
                self.statement_block.parse()?,
                self.metric_name,
            ),
        })
    }
}

fn storage_error(e: rusqlite::Error) -> FundamentalsError {
    FundamentalsError::Storage(e.to_string())
}

/// SQLite-based store for the metric catalog and observations.
///
/// The connection is guarded by a mutex; every write method runs in its own
/// transaction, so one call to [`FundamentalsStore::insert_observations`]
/// either commits every non-conflicting row or none of them.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an existing SQLite store without creating the file.
    ///
    /// # Errors
    /// Returns an error if the file does not exist, cannot be opened for
    /// writing, or schema creation fails.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            FundamentalsError::Storage(format!("Cannot open {}: {}", path.display(), e))
        })?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_error)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FundamentalsError::Storage(e.to_string()))
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(storage_error)?;

        // Metric catalog
        conn.execute(
            "CREATE TABLE IF NOT EXISTS fundamental_data_type (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                statement_block TEXT NOT NULL CHECK (statement_block IN (
                    'per_share_data_array', 'common_size_ratios', 'income_statement',
                    'balance_sheet', 'cashflow_statement', 'valuation_ratios',
                    'valuation_and_quality', 'other'
                )),
                metric_name TEXT NOT NULL,
                CONSTRAINT fundamental_data_type_unique UNIQUE (statement_block, metric_name)
            )",
            [],
        )
        .map_err(storage_error)?;

        // Observations
        conn.execute(
            "CREATE TABLE IF NOT EXISTS fundamental_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                period TEXT NOT NULL CHECK (period IN ('annuals', 'quarterly')),
                year TEXT NOT NULL,
                month TEXT NOT NULL,
                fundamental_data_type_id INTEGER NOT NULL
                    REFERENCES fundamental_data_type(id) ON DELETE CASCADE,
                value REAL NOT NULL,
                CONSTRAINT fundamental_data_unique
                    UNIQUE (ticker, period, year, month, fundamental_data_type_id)
            )",
            [],
        )
        .map_err(storage_error)?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_fundamental_data_ticker
             ON fundamental_data(ticker)",
            [],
        )
        .map_err(storage_error)?;

        debug!("SQLite store schema initialized");
        Ok(())
    }
}

#[async_trait]
impl FundamentalsStore for SqliteStore {
    #[instrument(skip(self))]
    async fn metric_types(&self) -> Result<Vec<MetricType>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(SELECT_METRIC_TYPES).map_err(storage_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(storage_error)?;

        let mut metric_types = Vec::new();
        for row in rows {
            let (id, block, name) = row.map_err(storage_error)?;
            metric_types.push(MetricType::new(MetricTypeId::new(id), block.parse()?, name));
        }

        debug!("Loaded {} catalog entries", metric_types.len());
        Ok(metric_types)
    }

    #[instrument(skip(self), fields(block = %statement_block))]
    async fn insert_metric_type(
        &self,
        statement_block: StatementBlock,
        name: &str,
    ) -> Result<Option<MetricTypeId>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                INSERT_METRIC_TYPE,
                params![statement_block.as_str(), name],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(storage_error)?;

        Ok(id.map(MetricTypeId::new))
    }

    #[instrument(skip(self), fields(block = %statement_block))]
    async fn find_metric_type(
        &self,
        statement_block: StatementBlock,
        name: &str,
    ) -> Result<Option<MetricTypeId>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                FIND_METRIC_TYPE,
                params![statement_block.as_str(), name],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(storage_error)?;

        Ok(id.map(MetricTypeId::new))
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert_observations(&self, rows: &[NewObservation]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().map_err(storage_error)?;

        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare_cached(INSERT_OBSERVATION).map_err(storage_error)?;
            for row in rows {
                inserted += stmt
                    .execute(params![
                        row.ticker.as_str(),
                        row.period.as_str(),
                        row.year,
                        row.month,
                        row.metric_type_id.get(),
                        row.value
                    ])
                    .map_err(storage_error)?;
            }
        }

        tx.commit().map_err(storage_error)?;
        debug!(
            "Inserted {} of {} observations ({} already present)",
            inserted,
            rows.len(),
            rows.len() - inserted
        );
        Ok(inserted)
    }

    #[instrument(skip(self), fields(ticker = %query.ticker))]
    async fn observations(&self, query: &ObservationQuery) -> Result<Vec<Observation>> {
        let mut sql = String::from(SELECT_OBSERVATIONS);
        let mut values = vec![query.ticker.as_str().to_string()];

        if let Some(period) = query.period {
            sql.push_str(" AND d.period = ?");
            values.push(period.as_str().to_string());
        }
        if let Some(year) = &query.year {
            sql.push_str(" AND d.year = ?");
            values.push(year.clone());
        }
        if let Some(month) = &query.month {
            sql.push_str(" AND d.month = ?");
            values.push(month.clone());
        }
        if let Some(block) = query.statement_block {
            sql.push_str(" AND t.statement_block = ?");
            values.push(block.as_str().to_string());
        }
        if let Some(name) = &query.metric_name {
            sql.push_str(" AND t.metric_name = ?");
            values.push(name.clone());
        }
        sql.push_str(" ORDER BY d.id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(storage_error)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(ObservationRow {
                    id: row.get(0)?,
                    ticker: row.get(1)?,
                    period: row.get(2)?,
                    year: row.get(3)?,
                    month: row.get(4)?,
                    metric_type_id: row.get(5)?,
                    value: row.get(6)?,
                    statement_block: row.get(7)?,
                    metric_name: row.get(8)?,
                })
            })
            .map_err(storage_error)?;

        let mut observations = Vec::new();
        for row in rows {
            observations.push(row.map_err(storage_error)?.into_observation()?);
        }

        debug!("Found {} observations", observations.len());
        Ok(observations)
    }

    #[instrument(skip(self))]
    async fn tickers(&self) -> Result<Vec<Ticker>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM fundamental_data ORDER BY ticker")
            .map_err(storage_error)?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(storage_error)?;

        let mut tickers = Vec::new();
        for row in rows {
            tickers.push(Ticker::new(row.map_err(storage_error)?));
        }
        Ok(tickers)
    }

    #[instrument(skip(self, ticker), fields(ticker = %ticker))]
    async fn periods(&self, ticker: &Ticker) -> Result<Vec<(PeriodType, YearMonth)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT period, year, month FROM fundamental_data
                 WHERE ticker = ?1
                 ORDER BY period, year, month",
            )
            .map_err(storage_error)?;

        let rows = stmt
            .query_map(params![ticker.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(storage_error)?;

        let mut periods = Vec::new();
        for row in rows {
            let (period, year, month) = row.map_err(storage_error)?;
            periods.push((period.parse()?, YearMonth::new(year, month)));
        }
        Ok(periods)
    }

    #[instrument(skip(self))]
    async fn observation_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count = conn
            .query_row("SELECT COUNT(*) FROM fundamental_data", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(storage_error)?;

        usize::try_from(count).map_err(|e| FundamentalsError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fact(ticker: &str, year: &str, metric: MetricTypeId, value: f64) -> NewObservation {
        NewObservation {
            ticker: Ticker::new(ticker),
            period: PeriodType::Annual,
            year: year.to_string(),
            month: "12".to_string(),
            metric_type_id: metric,
            value,
        }
    }

    #[tokio::test]
    async fn test_sqlite_store_initialization() {
        let store = SqliteStore::in_memory();
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_metric_type_conflict_returns_none() {
        let store = SqliteStore::in_memory().unwrap();

        let id = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap()
            .expect("first insert assigns an id");

        let again = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap();
        assert!(again.is_none());

        let found = store
            .find_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap();
        assert_eq!(found, Some(id));

        // Same name under another block is a different entry
        let other = store
            .insert_metric_type(StatementBlock::BalanceSheet, "Revenue")
            .await
            .unwrap();
        assert!(other.is_some());
        assert_ne!(other, Some(id));

        assert_eq!(store.metric_types().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_observations_skips_conflicts() {
        let store = SqliteStore::in_memory().unwrap();
        let revenue = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap()
            .unwrap();

        let rows = vec![
            fact("AAPL", "2022", revenue, 1.0),
            fact("AAPL", "2023", revenue, 2.0),
        ];
        assert_eq!(store.insert_observations(&rows).await.unwrap(), 2);

        // Conflicting fact with a different value is discarded, not overwritten
        let rows = vec![
            fact("AAPL", "2022", revenue, 99.0),
            fact("AAPL", "2024", revenue, 3.0),
        ];
        assert_eq!(store.insert_observations(&rows).await.unwrap(), 1);
        assert_eq!(store.observation_count().await.unwrap(), 3);

        let stored = store
            .observations(&ObservationQuery::new("AAPL").with_year("2022"))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].value, 1.0);
    }

    #[tokio::test]
    async fn test_failed_chunk_commits_nothing() {
        let store = SqliteStore::in_memory().unwrap();
        let revenue = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap()
            .unwrap();

        let rows = vec![
            fact("AAPL", "2022", revenue, 1.0),
            fact("AAPL", "2023", MetricTypeId::new(9_999), 2.0),
        ];
        let result = store.insert_observations(&rows).await;
        assert!(matches!(result, Err(FundamentalsError::Storage(_))));
        assert_eq!(store.observation_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_observation_filters() {
        let store = SqliteStore::in_memory().unwrap();
        let revenue = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap()
            .unwrap();
        let cash = store
            .insert_metric_type(StatementBlock::BalanceSheet, "Cash")
            .await
            .unwrap()
            .unwrap();

        let mut quarterly = fact("AAPL", "2023", revenue, 5.0);
        quarterly.period = PeriodType::Quarterly;
        quarterly.month = "06".to_string();

        store
            .insert_observations(&[
                fact("AAPL", "2022", revenue, 1.0),
                fact("AAPL", "2022", cash, 2.0),
                quarterly,
                fact("MSFT", "2022", revenue, 3.0),
            ])
            .await
            .unwrap();

        let all = store
            .observations(&ObservationQuery::new("AAPL"))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let by_block = store
            .observations(
                &ObservationQuery::new("AAPL").with_statement_block(StatementBlock::BalanceSheet),
            )
            .await
            .unwrap();
        assert_eq!(by_block.len(), 1);
        assert_eq!(by_block[0].metric_type.name, "Cash");

        let by_period = store
            .observations(
                &ObservationQuery::new("AAPL")
                    .with_period(PeriodType::Quarterly)
                    .with_month("06")
                    .with_metric_name("Revenue"),
            )
            .await
            .unwrap();
        assert_eq!(by_period.len(), 1);
        assert_eq!(by_period[0].value, 5.0);

        let none = store
            .observations(&ObservationQuery::new("AAPL").with_year("1999"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_tickers_and_periods_are_distinct() {
        let store = SqliteStore::in_memory().unwrap();
        let revenue = store
            .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
            .await
            .unwrap()
            .unwrap();
        let cash = store
            .insert_metric_type(StatementBlock::BalanceSheet, "Cash")
            .await
            .unwrap()
            .unwrap();

        store
            .insert_observations(&[
                fact("AAPL", "2022", revenue, 1.0),
                fact("AAPL", "2022", cash, 2.0),
                fact("AAPL", "2021", cash, 2.0),
                fact("MSFT", "2022", revenue, 3.0),
            ])
            .await
            .unwrap();

        let tickers = store.tickers().await.unwrap();
        assert_eq!(tickers, vec![Ticker::new("AAPL"), Ticker::new("MSFT")]);

        let periods = store.periods(&Ticker::new("AAPL")).await.unwrap();
        assert_eq!(
            periods,
            vec![
                (PeriodType::Annual, YearMonth::new("2021", "12")),
                (PeriodType::Annual, YearMonth::new("2022", "12")),
            ]
        );
    }

    #[tokio::test]
    async fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fundamentals.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            let revenue = store
                .insert_metric_type(StatementBlock::IncomeStatement, "Revenue")
                .await
                .unwrap()
                .unwrap();
            store
                .insert_observations(&[fact("AAPL", "2022", revenue, 1.0)])
                .await
                .unwrap();
        }

        let store = SqliteStore::open_existing(&path).unwrap();
        assert_eq!(store.observation_count().await.unwrap(), 1);
        assert_eq!(store.metric_types().await.unwrap().len(), 1);
    }

    #[test]
    fn test_open_existing_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.db");

        let err = SqliteStore::open_existing(&path).unwrap_err();
        assert!(matches!(err, FundamentalsError::Storage(_)));
        assert!(!path.exists());
    }
}
