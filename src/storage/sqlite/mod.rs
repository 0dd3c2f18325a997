//! Single-file SQLite backend.
//!
//! The index is one SQLite file holding the `mapping` table, one secondary
//! index per lookup direction, and a small metadata table.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  build (offline, single writer)   query (many readers)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐              ┌─────────────────┐        │
//! │  │  IndexBuilder   │              │ SqliteIndexStore│        │
//! │  │ (batched insert)│              │ (scoped handles)│        │
//! │  └────────┬────────┘              └────────┬────────┘        │
//! │           │ <index>.tmp.<uuid>             │ read-only       │
//! │           └──────── rename ──────→ <index> ←┘                │
//! │           │                                                  │
//! │  ┌────────┴──────────┐                                       │
//! │  │ BuildLock (flock) │  <index>.lock                         │
//! │  └───────────────────┘                                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod file_lock;
mod reader;
mod schema;

pub use builder::IndexBuilder;
pub use file_lock::BuildLock;
pub use reader::SqliteIndexStore;

use std::path::Path;
use std::time::Duration;

use crate::error::MapperResult;

/// Configuration for reading an index.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a lookup waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Open an existing index for querying.
///
/// # Arguments
/// * `path` - Index file produced by [`IndexBuilder`]
/// * `config` - Optional configuration (uses defaults if None)
///
/// # Errors
/// - If the file is missing or unreadable
/// - If the file is not a SQLite database or lacks the `mapping` table
///
/// # Example
/// ```rust,no_run
/// use wikimapper::storage::sqlite::open_index;
/// use wikimapper::WikiMapper;
///
/// let mapper = WikiMapper::with_store(open_index("./enwiki-mapping.db", None)?);
/// # Ok::<(), wikimapper::MapperError>(())
/// ```
pub fn open_index(
    path: impl AsRef<Path>,
    config: Option<StoreConfig>,
) -> MapperResult<SqliteIndexStore> {
    let store = SqliteIndexStore::open(path.as_ref(), config.unwrap_or_default())?;
    Ok(store)
}
