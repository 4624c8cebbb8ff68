//! Error types for ingestion and query operations.
//!
//! This module defines [`FundamentalsError`]. Malformed source values and
//! uniqueness conflicts are not errors; they are recovered where they occur.
//! What remains here is what a caller has to act on.

use thiserror::Error;

/// Errors that can occur while ingesting or querying fundamentals.
#[derive(Error, Debug)]
pub enum FundamentalsError {
    /// No observations matched a well-formed query for this ticker.
    #[error("No data found for ticker {ticker}")]
    NotFound {
        /// The ticker that was requested.
        ticker: String,
    },

    /// The storage backend failed; the current chunk or query is aborted.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error reading the ingestion corpus.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing a document or a stored value.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error building a DataFrame from query results.
    #[error("DataFrame error: {0}")]
    Frame(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FundamentalsError {
    /// Creates a [`FundamentalsError::NotFound`] for a ticker.
    pub fn not_found(ticker: impl Into<String>) -> Self {
        Self::NotFound {
            ticker: ticker.into(),
        }
    }

    /// Returns true if this is a query miss rather than a failure.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type alias using [`FundamentalsError`].
pub type Result<T> = std::result::Result<T, FundamentalsError>;
