//! Enumeration and loading of an ingestion folder.

use fundamentals_core::{FundamentalsError, Result, Ticker};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::document::SourceDocument;

/// Extension of source documents; other files in the folder are ignored.
const DOCUMENT_EXTENSION: &str = "json";

/// One source file and the ticker derived from its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorpusEntry {
    /// Ticker, taken from the file stem.
    pub ticker: Ticker,
    /// Path of the document.
    pub path: PathBuf,
}

impl CorpusEntry {
    /// Builds an entry for a path, or `None` if it is not a `.json` file.
    #[must_use]
    pub fn from_path(path: PathBuf) -> Option<Self> {
        if path.extension()?.to_str()? != DOCUMENT_EXTENSION {
            return None;
        }
        let ticker = Ticker::new(path.file_stem()?.to_str()?);
        Some(Self { ticker, path })
    }

    /// Reads and parses the document.
    ///
    /// # Errors
    /// Returns [`FundamentalsError::Io`] if the file cannot be read and
    /// [`FundamentalsError::Parse`] if it is not a valid document.
    pub async fn load(&self) -> Result<SourceDocument> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str(&raw).map_err(|e| {
            FundamentalsError::Parse(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// The documents of one ingestion folder, in file name order.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
    unreadable: Vec<PathBuf>,
}

impl Corpus {
    /// Lists the `.json` files directly inside a folder, following symlinks.
    ///
    /// `.json` entries whose metadata cannot be read, such as dangling links,
    /// are logged and recorded in [`Self::unreadable`].
    ///
    /// # Errors
    /// Returns an error if the folder cannot be read.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut read_dir = tokio::fs::read_dir(dir).await?;

        let mut entries = Vec::new();
        let mut unreadable = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let Some(entry) = CorpusEntry::from_path(entry.path()) else {
                continue;
            };
            match tokio::fs::metadata(&entry.path).await {
                Ok(metadata) if metadata.is_file() => entries.push(entry),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "Cannot stat document, skipping");
                    unreadable.push(entry.path);
                }
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        unreadable.sort();

        debug!(dir = %dir.display(), files = entries.len(), "Opened ingestion corpus");
        Ok(Self {
            entries,
            unreadable,
        })
    }

    /// Returns the `.json` entries that were found but could not be inspected.
    #[must_use]
    pub fn unreadable(&self) -> &[PathBuf] {
        &self.unreadable
    }

    /// Returns the entries.
    #[must_use]
    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    /// Returns the number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the folder had no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
