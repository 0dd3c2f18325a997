//! Abstract storage traits for wikimapper.
//!
//! These traits define the read contract index backends must implement.
//! By using traits, we enable:
//! - In-memory backends for embedding and tests
//! - The single-file SQLite backend for production indexes

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::MappingRow;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The index is missing, corrupt or unreadable.
    #[error("Index unavailable at {}: {reason}", .path.display())]
    Unavailable {
        /// Path of the index file.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Another build holds the lock for this target.
    #[error("Index build already in progress (lock held on {})", .path.display())]
    Locked {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

/// Build metadata recorded inside an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// On-disk format version.
    pub format_version: u32,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
    /// Number of rows in the mapping table.
    pub row_count: u64,
    /// BLAKE3 digest (hex) over the accepted records, in order.
    pub fingerprint: String,
}

/// Read access to a built index.
///
/// Every method returns matching rows in ascending row id order. An empty
/// vector means nothing matched; errors are reserved for a store that
/// cannot be read.
pub trait IndexStore: Send + Sync {
    /// Rows whose title equals `title`.
    ///
    /// With `case_insensitive`, titles are compared after ASCII case folding.
    fn rows_by_title(
        &self,
        title: &str,
        case_insensitive: bool,
    ) -> Result<Vec<MappingRow>, StorageError>;

    /// Rows linked to the Wikidata entity `wikidata_id`.
    fn rows_by_wikidata_id(&self, wikidata_id: &str) -> Result<Vec<MappingRow>, StorageError>;

    /// Rows with the Wikipedia page id `wikipedia_id`.
    fn rows_by_wikipedia_id(&self, wikipedia_id: &str) -> Result<Vec<MappingRow>, StorageError>;

    /// Build metadata, if the index records any.
    fn metadata(&self) -> Result<Option<IndexMetadata>, StorageError>;
}

impl<S: IndexStore + ?Sized> IndexStore for std::sync::Arc<S> {
    fn rows_by_title(
        &self,
        title: &str,
        case_insensitive: bool,
    ) -> Result<Vec<MappingRow>, StorageError> {
        (**self).rows_by_title(title, case_insensitive)
    }

    fn rows_by_wikidata_id(&self, wikidata_id: &str) -> Result<Vec<MappingRow>, StorageError> {
        (**self).rows_by_wikidata_id(wikidata_id)
    }

    fn rows_by_wikipedia_id(&self, wikipedia_id: &str) -> Result<Vec<MappingRow>, StorageError> {
        (**self).rows_by_wikipedia_id(wikipedia_id)
    }

    fn metadata(&self) -> Result<Option<IndexMetadata>, StorageError> {
        (**self).metadata()
    }
}
