//! Error types for wikimapper.
//!
//! All errors are strongly typed using thiserror. Lookups that find nothing
//! are not errors: they return `None` or an empty `Vec`. Ambiguous data is
//! resolved by the rules in [`crate::resolve`] and never surfaces here.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised while validating records during index construction.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// A required field was absent or empty.
    #[error("Record {position}: required field '{field}' is missing")]
    MissingField {
        /// 1-based position of the record in the input sequence.
        position: u64,
        /// Name of the missing field.
        field: &'static str,
    },

    /// The upstream parser could not turn its input into a record.
    #[error("Line {line}: {reason}")]
    Parse {
        /// 1-based line number in the source.
        line: u64,
        /// What went wrong.
        reason: String,
    },
}

impl IngestionError {
    /// Creates a parse error for the given line.
    #[must_use]
    pub fn parse(line: u64, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }
}

/// Top-level error type for wikimapper.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Storage error: {0}")]
    Store(#[from] StorageError),

    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("Invalid configuration: {message}")]
    Config {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl MapperError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the underlying store is missing, corrupt or unreadable.
    #[must_use]
    pub const fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store(StorageError::Unavailable { .. }))
    }

    /// Returns true if this is an ingestion error.
    #[must_use]
    pub const fn is_ingestion(&self) -> bool {
        matches!(self, Self::Ingestion(_))
    }

    /// Returns true if this error is retryable.
    ///
    /// Storage is a local file, so retrying a failed open or query does not
    /// change the outcome.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for wikimapper operations.
pub type MapperResult<T> = Result<T, MapperError>;
