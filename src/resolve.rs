//! Multi-valued indexes and disambiguation rules.
//!
//! The index tolerates duplicate titles and duplicate wikidata ids, so every
//! key maps to an ordered list of row references ([`Postings`]). The lookup
//! contracts are plain functions over the rows those postings resolve to:
//!
//! - [`first_mapped`]: title lookups take the first non-null wikidata id.
//! - [`distinct_titles`]: reverse lookups return every title once.
//! - [`first_value`]: page id lookups take the first row's wikidata id.
//!
//! Rows are always consumed in ascending [`RowId`] order, so the outcome
//! never depends on the storage engine's scan order.

use std::collections::{HashMap, HashSet};

use crate::record::{MappingRow, RowId};

/// Ordered row references sharing one index key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Postings(Vec<RowId>);

impl Postings {
    /// Appends a row reference, keeping the list sorted.
    ///
    /// Rows are normally pushed in insertion order; an out-of-order push is
    /// placed at its sorted position and duplicates are ignored.
    pub fn push(&mut self, row: RowId) {
        match self.0.last() {
            Some(last) if *last < row => self.0.push(row),
            None => self.0.push(row),
            Some(_) => {
                if let Err(pos) = self.0.binary_search(&row) {
                    self.0.insert(pos, row);
                }
            }
        }
    }

    /// Returns the row references in ascending order.
    #[must_use]
    pub fn as_slice(&self) -> &[RowId] {
        &self.0
    }

    /// Number of rows under this key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no rows share this key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A key to postings map.
#[derive(Debug, Clone, Default)]
pub struct MultiIndex {
    entries: HashMap<String, Postings>,
}

impl MultiIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `row` carries `key`.
    pub fn insert(&mut self, key: impl Into<String>, row: RowId) {
        self.entries.entry(key.into()).or_default().push(row);
    }

    /// Returns the rows carrying `key`, in ascending order.
    #[must_use]
    pub fn get(&self, key: &str) -> &[RowId] {
        match self.entries.get(key) {
            Some(postings) => postings.as_slice(),
            None => &[],
        }
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

/// Returns the first non-null wikidata id among `rows`.
///
/// At most one real mapping is expected among rows sharing a title; rows
/// without a linked entity are skipped rather than ending the search.
#[must_use]
pub fn first_mapped(rows: &[MappingRow]) -> Option<&str> {
    rows.iter().find_map(MappingRow::wikidata_id)
}

/// Returns the distinct titles of `rows`, in first-seen order.
///
/// Rows without a title contribute nothing.
#[must_use]
pub fn distinct_titles(rows: &[MappingRow]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut titles = Vec::new();
    for title in rows.iter().filter_map(MappingRow::title) {
        if seen.insert(title) {
            titles.push(title.to_string());
        }
    }
    titles
}

/// Returns the wikidata id of the first row.
///
/// This is the first of the distinct values in retrieval order. A null first
/// value yields `None` even if a later row is linked.
#[must_use]
pub fn first_value(rows: &[MappingRow]) -> Option<&str> {
    rows.first().and_then(MappingRow::wikidata_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MappingRecord;

    fn row(id: u64, title: &str, qid: Option<&str>) -> MappingRow {
        MappingRow::stored(RowId::new(id), MappingRecord::new(title, id.to_string(), qid))
    }

    #[test]
    fn test_postings_keep_order_and_dedupe() {
        let mut postings = Postings::default();
        postings.push(RowId::new(3));
        postings.push(RowId::new(7));
        postings.push(RowId::new(5));
        postings.push(RowId::new(7));

        let raw: Vec<u64> = postings.as_slice().iter().map(|r| r.get()).collect();
        assert_eq!(raw, vec![3, 5, 7]);
        assert_eq!(postings.len(), 3);
    }

    #[test]
    fn test_multi_index_missing_key_is_empty() {
        let mut index = MultiIndex::new();
        index.insert("Manatee", RowId::new(1));
        index.insert("Manatee", RowId::new(4));

        assert_eq!(index.get("Manatee").len(), 2);
        assert!(index.get("Dugong").is_empty());
        assert_eq!(index.key_count(), 1);
    }

    #[test]
    fn test_first_mapped_skips_nulls() {
        let rows = vec![row(1, "T", None), row(2, "T", Some("Q1"))];
        assert_eq!(first_mapped(&rows), Some("Q1"));

        let reversed = vec![row(1, "T", Some("Q1")), row(2, "T", None)];
        assert_eq!(first_mapped(&reversed), Some("Q1"));
    }

    #[test]
    fn test_first_mapped_prefers_first_non_null() {
        let rows = vec![row(1, "T", Some("Q1")), row(2, "T", Some("Q2"))];
        assert_eq!(first_mapped(&rows), Some("Q1"));
    }

    #[test]
    fn test_first_mapped_all_null_or_empty() {
        assert_eq!(first_mapped(&[]), None);
        assert_eq!(first_mapped(&[row(1, "T", None), row(2, "T", None)]), None);
    }

    #[test]
    fn test_distinct_titles_preserves_first_seen_order() {
        let rows = vec![
            row(1, "Manatee", Some("Q1")),
            row(2, "Sea_cow", Some("Q1")),
            row(3, "Manatee", Some("Q1")),
            row(4, "Trichechus", Some("Q1")),
        ];
        assert_eq!(distinct_titles(&rows), vec!["Manatee", "Sea_cow", "Trichechus"]);
        assert!(distinct_titles(&[]).is_empty());
    }

    #[test]
    fn test_distinct_titles_skips_untitled_rows() {
        let mut untitled = row(1, "X", Some("Q1"));
        untitled.wikipedia_title = None;
        let rows = vec![untitled, row(2, "Manatee", Some("Q1"))];
        assert_eq!(distinct_titles(&rows), vec!["Manatee"]);
    }

    #[test]
    fn test_first_mapped_ignores_missing_page_id() {
        let mut foreign = row(1, "Manatee", Some("Q132524"));
        foreign.wikipedia_id = None;
        assert_eq!(first_mapped(&[foreign]), Some("Q132524"));
    }

    #[test]
    fn test_first_value_takes_first_row() {
        assert_eq!(first_value(&[]), None);
        assert_eq!(
            first_value(&[row(1, "A", Some("Q132524")), row(2, "A", Some("Q9"))]),
            Some("Q132524")
        );
        assert_eq!(first_value(&[row(1, "A", None), row(2, "A", Some("Q9"))]), None);
    }
}
