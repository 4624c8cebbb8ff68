#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fundamentals/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Ingestion and querying of per-ticker financial statement data.
//!
//! This crate re-exports the core types, the store implementations and the
//! ingestion pipeline, and provides a [`QueryEngine`] for the read side.
//!
//! # Features
//!
//! - `sqlite` - Persistent SQLite store (default)

// Core types and traits
pub use fundamentals_core::*;

// Store implementations
pub use fundamentals_store::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use fundamentals_store::SqliteStore;

// Ingestion
pub use fundamentals_ingest::{
    BatchLoader, CatalogBuilder, Corpus, CorpusEntry, DEFAULT_CHUNK_SIZE, IngestConfig,
    IngestReport, Ingestor, LoadStats, MetricCatalog, SourceDocument,
};

/// DataFrame export of query results.
pub mod frame;
mod query;
pub use frame::observations_to_frame;
pub use query::QueryEngine;
