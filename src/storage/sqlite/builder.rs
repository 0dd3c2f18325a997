//! Bulk construction of a SQLite index.
//!
//! A build never touches the live index until it has fully succeeded:
//! rows go into a temporary sibling file which is flushed, fsynced and
//! atomically renamed over the target. A failed or interrupted build leaves
//! the previous index in place.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{IngestionError, MapperResult};
use crate::ingest::{accepted, ingest, BuildConfig, BuildReport, RecordSink};
use crate::record::{MappingRecord, RawRecord, RowId};
use crate::storage::traits::{IndexMetadata, StorageError};
use crate::storage::FORMAT_VERSION;

use super::file_lock::BuildLock;
use super::schema;

fn backend(err: rusqlite::Error) -> StorageError {
    StorageError::BackendError(err.to_string())
}

/// Builds an index file from a stream of records.
///
/// # Example
/// ```rust,no_run
/// use wikimapper::{IndexBuilder, MappingRecord};
///
/// let report = IndexBuilder::new("enwiki-mapping.db").build_records(vec![
///     MappingRecord::new("Manatee", "339", Some("Q132524")),
/// ])?;
/// assert_eq!(report.inserted, 1);
/// # Ok::<(), wikimapper::MapperError>(())
/// ```
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    path: PathBuf,
    config: BuildConfig,
}

impl IndexBuilder {
    /// Creates a builder targeting `path` with the default configuration.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: BuildConfig::default(),
        }
    }

    /// Replaces the build configuration.
    #[must_use]
    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Builds the index from already-validated records.
    ///
    /// # Errors
    /// See [`IndexBuilder::build`].
    pub fn build_records<I>(&self, records: I) -> MapperResult<BuildReport>
    where
        I: IntoIterator<Item = MappingRecord>,
    {
        self.build(accepted(records))
    }

    /// Builds the index, replacing any existing file at the target path.
    ///
    /// # Errors
    /// - [`crate::MapperError::Config`] if the configuration is invalid
    /// - [`StorageError::Locked`] if another build of the same target is running
    /// - [`StorageError::Unavailable`] if the target cannot be created
    /// - [`crate::MapperError::Ingestion`] on a malformed record under
    ///   [`crate::ingest::MalformedPolicy::Abort`]
    pub fn build<I>(&self, records: I) -> MapperResult<BuildReport>
    where
        I: IntoIterator<Item = Result<RawRecord, IngestionError>>,
    {
        let config = self.config.clone().validate()?;
        let unavailable = |reason: String| StorageError::Unavailable {
            path: self.path.clone(),
            reason,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }

        let _lock = BuildLock::acquire(&self.path)?;

        tracing::info!(path = %self.path.display(), batch_size = config.batch_size, "building index");

        let staging = StagingIndex::create(&self.path).map_err(|e| match e {
            StorageError::BackendError(reason) => unavailable(reason),
            other => other,
        })?;

        let report = {
            let conn = staging.connection()?;
            let mut sink = BatchInserter::new(conn, config.batch_size);
            let report = ingest(records, config.malformed, &mut sink)?;
            sink.finish()?;
            report
        };

        staging.finish_schema(&config, &report)?;
        staging.commit(&self.path)?;

        tracing::info!(
            path = %self.path.display(),
            inserted = report.inserted,
            skipped = report.skipped,
            unlinked = report.unlinked,
            fingerprint = %report.fingerprint,
            elapsed_ms = report.elapsed_ms,
            "index built"
        );
        Ok(report)
    }
}

/// Inserts rows in explicit transactions of `batch_size` rows.
struct BatchInserter<'c> {
    conn: &'c Connection,
    batch_size: usize,
    pending: usize,
}

impl<'c> BatchInserter<'c> {
    fn new(conn: &'c Connection, batch_size: usize) -> Self {
        Self {
            conn,
            batch_size,
            pending: 0,
        }
    }

    fn finish(mut self) -> Result<(), StorageError> {
        self.commit()
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.pending > 0 {
            self.conn.execute_batch("COMMIT").map_err(backend)?;
            self.pending = 0;
        }
        Ok(())
    }
}

impl RecordSink for BatchInserter<'_> {
    fn append(&mut self, row_id: RowId, record: MappingRecord) -> MapperResult<()> {
        if self.pending == 0 {
            self.conn.execute_batch("BEGIN").map_err(backend)?;
        }

        let rowid = i64::try_from(row_id.get())
            .map_err(|_| StorageError::BackendError(format!("row id {row_id} out of range")))?;
        self.conn
            .prepare_cached(schema::INSERT_ROW)
            .and_then(|mut stmt| {
                stmt.execute(params![
                    rowid,
                    record.wikipedia_id,
                    record.wikipedia_title,
                    record.wikidata_id
                ])
            })
            .map_err(backend)?;

        self.pending += 1;
        if self.pending >= self.batch_size {
            self.commit()?;
        }
        Ok(())
    }
}

/// A partially built index in a temporary file.
///
/// Dropping it without [`StagingIndex::commit`] deletes the file.
struct StagingIndex {
    conn: Option<Connection>,
    temp_path: Option<PathBuf>,
}

impl StagingIndex {
    fn create(target: &Path) -> Result<Self, StorageError> {
        let mut name = target
            .file_name()
            .map(ToOwned::to_owned)
            .unwrap_or_default();
        name.push(format!(".tmp.{}", Uuid::new_v4()));
        let temp_path = target.with_file_name(name);

        let conn = Connection::open(&temp_path).map_err(backend)?;
        let staging = Self {
            conn: Some(conn),
            temp_path: Some(temp_path),
        };

        // The staging file is private until the rename, so the journal is
        // not needed; durability comes from the fsync in `commit`.
        let conn = staging.connection()?;
        conn.pragma_update_and_check(None, "journal_mode", "OFF", |row| row.get::<_, String>(0))
            .map_err(backend)?;
        conn.pragma_update(None, "synchronous", "OFF").map_err(backend)?;
        conn.execute_batch(schema::CREATE_MAPPING).map_err(backend)?;
        conn.execute_batch(schema::CREATE_META).map_err(backend)?;

        Ok(staging)
    }

    fn connection(&self) -> Result<&Connection, StorageError> {
        self.conn
            .as_ref()
            .ok_or_else(|| StorageError::BackendError("staging connection already closed".to_string()))
    }

    fn finish_schema(&self, config: &BuildConfig, report: &BuildReport) -> Result<(), StorageError> {
        let conn = self.connection()?;

        for ddl in schema::CREATE_INDEXES {
            tracing::debug!(ddl, "creating index");
            conn.execute_batch(ddl).map_err(backend)?;
        }
        if config.case_insensitive_index {
            tracing::debug!(ddl = schema::CREATE_NOCASE_INDEX, "creating index");
            conn.execute_batch(schema::CREATE_NOCASE_INDEX).map_err(backend)?;
        }

        let meta = IndexMetadata {
            format_version: FORMAT_VERSION,
            built_at: report.built_at,
            row_count: report.inserted,
            fingerprint: report.fingerprint.clone(),
        };
        schema::write_metadata(conn, &meta).map_err(backend)?;
        conn.execute_batch("ANALYZE").map_err(backend)?;
        Ok(())
    }

    /// Closes, fsyncs and renames the staging file over `target`, then
    /// fsyncs the containing directory so the rename itself is durable.
    ///
    /// This is the commit point: readers opening after the rename see the
    /// new index.
    fn commit(mut self, target: &Path) -> Result<(), StorageError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| backend(e))?;
        }
        let temp_path = self
            .temp_path
            .take()
            .ok_or_else(|| StorageError::BackendError("staging file already committed".to_string()))?;

        let io = |e: std::io::Error| StorageError::Unavailable {
            path: target.to_path_buf(),
            reason: e.to_string(),
        };
        File::open(&temp_path).and_then(|f| f.sync_all()).map_err(io)?;
        if let Err(e) = fs::rename(&temp_path, target) {
            let _ = fs::remove_file(&temp_path);
            return Err(io(e));
        }
        sync_parent_dir(target).map_err(io)
    }
}

/// Flushes the directory entry written by the commit rename.
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        File::open(parent)?.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

impl Drop for StagingIndex {
    fn drop(&mut self) {
        // Close before removing so the file is not held open.
        drop(self.conn.take());
        if let Some(ref temp_path) = self.temp_path {
            if temp_path.exists() {
                let _ = fs::remove_file(temp_path);
            }
        }
    }
}
