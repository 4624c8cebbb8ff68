//! Runtime configuration.

use std::path::PathBuf;

use fundamentals::{DEFAULT_CHUNK_SIZE, FundamentalsError, IngestConfig, Result};

/// Environment variable naming the SQLite database file.
pub(crate) const DATABASE_VAR: &str = "FUNDAMENTALS_DATABASE";
/// Environment variable naming the ingestion folder.
pub(crate) const DATA_DIR_VAR: &str = "FUNDAMENTALS_DATA_DIR";
/// Environment variable setting the rows written per chunk.
pub(crate) const CHUNK_SIZE_VAR: &str = "FUNDAMENTALS_CHUNK_SIZE";

const DEFAULT_DATABASE: &str = "fundamentals.db";
const DEFAULT_DATA_DIR: &str = "fundamentals_data/nse";

/// Settings shared by every subcommand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Config {
    pub(crate) database_path: PathBuf,
    pub(crate) data_dir: PathBuf,
    pub(crate) chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Config {
    /// Reads the process environment.
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from a variable lookup, falling back to defaults for
    /// unset or empty variables.
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = var(DATABASE_VAR) {
            config.database_path = PathBuf::from(path);
        }
        if let Some(dir) = var(DATA_DIR_VAR) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = var(CHUNK_SIZE_VAR) {
            config.chunk_size = parse_chunk_size(raw.trim())?;
        }

        Ok(config)
    }

    pub(crate) fn ingest_config(&self) -> IngestConfig {
        IngestConfig::default().with_chunk_size(self.chunk_size)
    }
}

/// Parses a positive row count.
pub(crate) fn parse_chunk_size(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(0) => Err(FundamentalsError::Config(format!(
            "{CHUNK_SIZE_VAR} must be at least 1"
        ))),
        Ok(n) => Ok(n),
        Err(e) => Err(FundamentalsError::Config(format!(
            "{CHUNK_SIZE_VAR}={raw:?} is not a row count: {e}"
        ))),
    }
}
