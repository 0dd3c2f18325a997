//! The lookup façade.
//!
//! [`WikiMapper`] answers the four lookups over any [`IndexStore`]. It keeps
//! no state besides the store handle; with the SQLite backend each call opens
//! and releases its own read-only connection.
//!
//! Absence of a mapping is an expected outcome and is reported as `None` or
//! an empty `Vec`, never as an error. Duplicate rows are resolved with the
//! rules in [`crate::resolve`].

use std::path::Path;

use crate::error::MapperResult;
use crate::record::{canonical_page_id, title_from_url};
use crate::resolve::{distinct_titles, first_mapped, first_value};
use crate::storage::sqlite::{SqliteIndexStore, StoreConfig};
use crate::storage::{IndexMetadata, IndexStore};

/// Maps between Wikipedia titles, page ids and Wikidata ids.
///
/// # Example
/// ```rust,no_run
/// use wikimapper::WikiMapper;
///
/// let mapper = WikiMapper::open("index_enwiki-20190420.db")?;
/// assert_eq!(mapper.title_to_id("Manatee")?.as_deref(), Some("Q132524"));
/// assert_eq!(
///     mapper.url_to_id("https://en.wikipedia.org/wiki/Manatee")?.as_deref(),
///     Some("Q132524")
/// );
/// # Ok::<(), wikimapper::MapperError>(())
/// ```
#[derive(Debug, Clone)]
pub struct WikiMapper<S = SqliteIndexStore> {
    store: S,
}

impl WikiMapper<SqliteIndexStore> {
    /// Opens the SQLite index at `path`.
    ///
    /// # Errors
    /// Fails with a store-unavailable error if the file is missing, is not an
    /// index, or cannot be read.
    pub fn open(path: impl AsRef<Path>) -> MapperResult<Self> {
        Self::open_with_config(path, StoreConfig::default())
    }

    /// Opens the SQLite index at `path` with explicit read settings.
    ///
    /// # Errors
    /// See [`WikiMapper::open`].
    pub fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> MapperResult<Self> {
        let store = SqliteIndexStore::open(path.as_ref(), config)?;
        Ok(Self { store })
    }
}

impl<S: IndexStore> WikiMapper<S> {
    /// Wraps an existing store.
    #[must_use]
    pub fn with_store(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the Wikidata id for a page title, matching case exactly.
    ///
    /// The title is the unescaped last part of the page URL with spaces
    /// replaced by underscores, e.g. `Fermat's_Last_Theorem`.
    ///
    /// # Errors
    /// Only if the store cannot be read.
    pub fn title_to_id(&self, title: &str) -> MapperResult<Option<String>> {
        self.lookup_title(title, false)
    }

    /// Like [`WikiMapper::title_to_id`], ignoring ASCII case.
    ///
    /// Significantly slower on indexes built without the case-insensitive
    /// title index, since the lookup then scans the whole table.
    ///
    /// # Errors
    /// Only if the store cannot be read.
    pub fn title_to_id_uncased(&self, title: &str) -> MapperResult<Option<String>> {
        self.lookup_title(title, true)
    }

    /// Returns the first non-null Wikidata id among all rows for `title`.
    ///
    /// # Errors
    /// Only if the store cannot be read.
    pub fn lookup_title(&self, title: &str, case_insensitive: bool) -> MapperResult<Option<String>> {
        let rows = self.store.rows_by_title(title, case_insensitive)?;
        Ok(first_mapped(&rows).map(str::to_string))
    }

    /// Returns the Wikidata id for a Wikipedia page URL.
    ///
    /// The last path segment is looked up verbatim with [`WikiMapper::title_to_id`].
    /// Whether the URL and the index come from the same dump is not checked.
    ///
    /// # Errors
    /// Only if the store cannot be read.
    pub fn url_to_id(&self, url: &str) -> MapperResult<Option<String>> {
        self.title_to_id(title_from_url(url))
    }

    /// Returns every page title linked to `wikidata_id`.
    ///
    /// Redirects make this one-to-many. Titles are distinct and in index
    /// order; an unknown id gives an empty list.
    ///
    /// # Errors
    /// Only if the store cannot be read.
    pub fn id_to_titles(&self, wikidata_id: &str) -> MapperResult<Vec<String>> {
        let rows = self.store.rows_by_wikidata_id(wikidata_id)?;
        Ok(distinct_titles(&rows))
    }

    /// Returns the Wikidata id linked to a Wikipedia page id, e.g. `339`.
    ///
    /// Page ids compare by numeric value, so `"0339"` finds page 339.
    ///
    /// # Errors
    /// Only if the store cannot be read.
    pub fn pageid_to_id(&self, wikipedia_id: &str) -> MapperResult<Option<String>> {
        let rows = self.store.rows_by_wikipedia_id(&canonical_page_id(wikipedia_id))?;
        Ok(first_value(&rows).map(str::to_string))
    }

    /// Returns the build metadata of the index, if recorded.
    ///
    /// # Errors
    /// Only if the store cannot be read.
    pub fn metadata(&self) -> MapperResult<Option<IndexMetadata>> {
        Ok(self.store.metadata()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MappingRecord;
    use crate::storage::MemoryIndexStore;

    fn mapper() -> WikiMapper<MemoryIndexStore> {
        WikiMapper::with_store(MemoryIndexStore::from_records(vec![
            MappingRecord::new("Manatee", "339", Some("Q132524")),
            MappingRecord::new("Sea_cow", "4005", Some("Q132524")),
            MappingRecord::new("Trichechus", "4006", Some("Q132524")),
            MappingRecord::new("Sea_cow", "4005", Some("Q132524")),
            MappingRecord::new("Dugong", "77", None),
            MappingRecord::new("Dugong", "77", Some("Q50733")),
            MappingRecord::new("Orphan", "9", None),
            MappingRecord::new("Split", "10", None),
            MappingRecord::new("Split", "11", Some("Q1")),
            MappingRecord::new("Fermat's_Last_Theorem", "12", Some("Q11518")),
        ]))
    }

    #[test]
    fn test_title_to_id() {
        let m = mapper();
        assert_eq!(m.title_to_id("Manatee").unwrap().as_deref(), Some("Q132524"));
        assert_eq!(m.title_to_id("Nonexistent").unwrap(), None);
        assert_eq!(m.title_to_id("Orphan").unwrap(), None);
    }

    #[test]
    fn test_title_to_id_skips_null_duplicate() {
        let m = mapper();
        assert_eq!(m.title_to_id("Dugong").unwrap().as_deref(), Some("Q50733"));
        assert_eq!(m.title_to_id("Split").unwrap().as_deref(), Some("Q1"));
    }

    #[test]
    fn test_title_to_id_uncased() {
        let m = mapper();
        assert_eq!(m.title_to_id("manatee").unwrap(), None);
        assert_eq!(
            m.title_to_id_uncased("manatee").unwrap(),
            m.title_to_id("Manatee").unwrap()
        );
        assert_eq!(m.lookup_title("MANATEE", true).unwrap().as_deref(), Some("Q132524"));
    }

    #[test]
    fn test_url_to_id() {
        let m = mapper();
        assert_eq!(
            m.url_to_id("https://en.wikipedia.org/wiki/Manatee").unwrap(),
            m.title_to_id("Manatee").unwrap()
        );
        assert_eq!(
            m.url_to_id("https://en.wikipedia.org/wiki/Fermat's_Last_Theorem")
                .unwrap()
                .as_deref(),
            Some("Q11518")
        );
        // Percent-escaped segments are not decoded.
        assert_eq!(
            m.url_to_id("https://en.wikipedia.org/wiki/Fermat%27s_Last_Theorem")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_id_to_titles() {
        let m = mapper();
        assert_eq!(
            m.id_to_titles("Q132524").unwrap(),
            vec!["Manatee", "Sea_cow", "Trichechus"]
        );
        assert!(m.id_to_titles("Q404").unwrap().is_empty());
    }

    #[test]
    fn test_pageid_to_id() {
        let m = mapper();
        assert_eq!(m.pageid_to_id("339").unwrap().as_deref(), Some("Q132524"));
        assert_eq!(m.pageid_to_id(" 339 ").unwrap().as_deref(), Some("Q132524"));
        assert_eq!(m.pageid_to_id("0339").unwrap().as_deref(), Some("Q132524"));
        assert_eq!(m.pageid_to_id("123456").unwrap(), None);
        assert_eq!(m.pageid_to_id("9").unwrap(), None);
    }

    #[test]
    fn test_pageid_takes_first_row() {
        let m = mapper();
        // Page 77 has a null row before the linked one.
        assert_eq!(m.pageid_to_id("77").unwrap(), None);
    }

    #[test]
    fn test_metadata_absent_for_plain_store() {
        assert!(mapper().metadata().unwrap().is_none());
    }
}
