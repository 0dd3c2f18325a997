//! Read access to a SQLite index.
//!
//! No connection is held between calls. Every lookup acquires a scoped,
//! read-only [`ReadHandle`] that is released when the call returns, on
//! success and error paths alike. Readers therefore never block each other
//! and always observe the file currently at the index path, including one
//! swapped in by a rebuild.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, ErrorCode, OpenFlags, Row};

use crate::record::{canonical_page_id, MappingRow, RowId};
use crate::storage::traits::{IndexMetadata, IndexStore, StorageError};

use super::schema;
use super::StoreConfig;

/// A SQLite-backed index, addressed by path.
#[derive(Debug, Clone)]
pub struct SqliteIndexStore {
    path: PathBuf,
    config: StoreConfig,
}

impl SqliteIndexStore {
    /// Opens the index at `path`, checking once that it is readable.
    ///
    /// # Errors
    /// [`StorageError::Unavailable`] if the file is missing, is not a SQLite
    /// database, or has no `mapping` table.
    pub fn open(path: impl Into<PathBuf>, config: StoreConfig) -> Result<Self, StorageError> {
        let store = Self {
            path: path.into(),
            config,
        };

        let handle = store.handle()?;
        let has_mapping = schema::has_table(&handle.conn, "mapping")
            .map_err(|e| classify(&store.path, e))?;
        if !has_mapping {
            let err = store.unavailable("no mapping table");
            tracing::warn!(error = %err, "rejecting index");
            return Err(err);
        }

        tracing::debug!(path = %store.path.display(), "index opened");
        Ok(store)
    }

    /// Returns the index path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, reason: impl Into<String>) -> StorageError {
        StorageError::Unavailable {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn handle(&self) -> Result<ReadHandle, StorageError> {
        ReadHandle::acquire(&self.path, &self.config).map_err(|e| {
            let err = classify(&self.path, e);
            tracing::warn!(error = %err, "cannot open index");
            err
        })
    }

    fn query(&self, sql: &str, key: &str) -> Result<Vec<MappingRow>, StorageError> {
        let handle = self.handle()?;
        handle
            .rows(sql, key)
            .map_err(|e| classify(&self.path, e))
    }
}

impl IndexStore for SqliteIndexStore {
    fn rows_by_title(
        &self,
        title: &str,
        case_insensitive: bool,
    ) -> Result<Vec<MappingRow>, StorageError> {
        let sql = if case_insensitive {
            schema::select_by_title_nocase()
        } else {
            schema::select_by_title()
        };
        self.query(&sql, title)
    }

    fn rows_by_wikidata_id(&self, wikidata_id: &str) -> Result<Vec<MappingRow>, StorageError> {
        self.query(&schema::select_by_wikidata_id(), wikidata_id)
    }

    fn rows_by_wikipedia_id(&self, wikipedia_id: &str) -> Result<Vec<MappingRow>, StorageError> {
        self.query(
            &schema::select_by_wikipedia_id(),
            &canonical_page_id(wikipedia_id),
        )
    }

    fn metadata(&self) -> Result<Option<IndexMetadata>, StorageError> {
        let handle = self.handle()?;
        schema::read_metadata(&handle.conn).map_err(StorageError::BackendError)
    }
}

/// A read-only connection scoped to one lookup.
struct ReadHandle {
    conn: Connection,
}

impl ReadHandle {
    fn acquire(path: &Path, config: &StoreConfig) -> rusqlite::Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(config.busy_timeout)?;
        Ok(Self { conn })
    }

    /// Runs a single-key lookup, returning rows in row id order.
    ///
    /// Null columns are passed through. Rows with a negative rowid can only
    /// come from a foreign writer and are dropped.
    fn rows(&self, sql: &str, key: &str) -> rusqlite::Result<Vec<MappingRow>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![key], read_row)?;

        let mut out = Vec::new();
        for row in rows {
            if let Some(row) = row? {
                out.push(row);
            }
        }
        tracing::trace!(key, matches = out.len(), "index lookup");
        Ok(out)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Option<MappingRow>> {
    let rowid: i64 = row.get(0)?;
    let Ok(rowid) = u64::try_from(rowid) else {
        return Ok(None);
    };

    Ok(Some(MappingRow {
        row_id: RowId::new(rowid),
        wikipedia_id: row.get(1)?,
        wikipedia_title: row.get(2)?,
        wikidata_id: row.get(3)?,
    }))
}

/// Maps engine errors onto the storage taxonomy.
///
/// Anything that says the file is missing, unreadable or not an index is
/// [`StorageError::Unavailable`]; the rest is a backend error.
fn classify(path: &Path, err: rusqlite::Error) -> StorageError {
    let unavailable = match &err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            matches!(
                failure.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::PermissionDenied
                    | ErrorCode::SystemIoFailure
            ) || message
                .as_deref()
                .is_some_and(|m| m.starts_with("no such table"))
        }
        _ => false,
    };

    if unavailable {
        StorageError::Unavailable {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    } else {
        StorageError::BackendError(err.to_string())
    }
}
