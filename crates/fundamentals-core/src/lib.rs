#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fundamentals/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for the fundamentals store.
//!
//! This crate provides the foundational abstractions shared by ingestion and querying:
//!
//! - [`FundamentalsStore`](store::FundamentalsStore) - Transactional storage client
//! - [`MetricType`](types::MetricType) - Catalog entry for one (statement block, metric name) pair
//! - [`Observation`](types::Observation) - A single stored fact
//! - [`ObservationQuery`](types::ObservationQuery) - Filter predicates for retrieval
//! - [`normalize`] - Parsing of raw JSON values and fiscal labels

/// Error types for ingestion and query operations.
pub mod error;
/// Value and fiscal label normalization.
pub mod normalize;
/// Period and statement block definitions.
pub mod period;
/// Storage trait for catalog and observations.
pub mod store;
/// Core data types (Ticker, MetricType, Observation, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use error::{FundamentalsError, Result};
pub use normalize::{parse_fiscal_period, parse_number};
pub use period::{PeriodType, StatementBlock};
pub use store::FundamentalsStore;
pub use types::{
    Availability, MetricType, MetricTypeId, NewObservation, Observation, ObservationQuery, Ticker,
    YearMonth,
};
