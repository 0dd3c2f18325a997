//! Index storage for wikimapper.
//!
//! The [`IndexStore`] trait is the read seam the mapper queries through.
//! Two backends implement it: an in-memory index and the single-file
//! SQLite index used in production.

mod traits;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryIndexStore;
pub use sqlite::{open_index, IndexBuilder, SqliteIndexStore, StoreConfig};
pub use traits::{IndexMetadata, IndexStore, StorageError};

/// Version of the persisted index layout.
pub const FORMAT_VERSION: u32 = 1;
