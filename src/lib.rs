//! # wikimapper - Wikipedia ↔ Wikidata lookup
//!
//! wikimapper maps Wikipedia page titles, URLs and page ids to Wikidata
//! entity ids and back, using an index precomputed from the Wikipedia dumps.
//! The index is built once, offline, and then opened read-only by any number
//! of readers.
//!
//! ## Core Concepts
//!
//! - **MappingRecord**: one `(wikipedia_title, wikipedia_id, wikidata_id)` row per page
//! - **IndexStore**: read seam over a built index (SQLite file or in-memory)
//! - **IndexBuilder**: bulk, single-writer construction from parsed records
//! - **WikiMapper**: the four lookups and their disambiguation rules
//!
//! Titles and wikidata ids are not unique in the source data. A title maps to
//! the first non-null wikidata id among its rows; a wikidata id maps to the
//! distinct set of titles linked to it (redirects).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use wikimapper::{source, IndexBuilder, WikiMapper};
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let records = source::tsv(BufReader::new(File::open("enwiki-mapping.tsv")?));
//! IndexBuilder::new("enwiki-mapping.db").build(records)?;
//!
//! let mapper = WikiMapper::open("enwiki-mapping.db")?;
//! assert_eq!(mapper.title_to_id("Manatee")?.as_deref(), Some("Q132524"));
//! assert!(mapper.id_to_titles("Q132524")?.contains(&"Manatee".to_string()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod ingest;
pub mod mapper;
pub mod record;
pub mod resolve;
pub mod source;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use error::{IngestionError, MapperError, MapperResult};
pub use ingest::{BuildConfig, BuildReport, MalformedPolicy};
pub use mapper::WikiMapper;
pub use record::{MappingRecord, MappingRow, RawRecord, RowId};
pub use storage::{
	IndexBuilder, IndexMetadata, IndexStore, MemoryIndexStore, SqliteIndexStore, StorageError,
	StoreConfig,
};
