#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/fundamentals/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Metric discovery and catalog reconciliation.
pub mod catalog;
/// Listing and loading of source folders.
pub mod corpus;
/// Source document model.
pub mod document;
/// Row extraction.
pub mod extract;
/// Chunked observation loading.
pub mod loader;
/// End-to-end ingestion runs.
pub mod pipeline;

pub use catalog::{CatalogBuilder, DiscoveredMetrics, MetricCatalog, discover};
pub use corpus::{Corpus, CorpusEntry};
pub use document::{Financials, PeriodSection, SourceDocument};
pub use extract::{Extraction, extract_rows};
pub use loader::{BatchLoader, DEFAULT_CHUNK_SIZE, LoadStats};
pub use pipeline::{IngestConfig, IngestReport, Ingestor};
