//! Mapping records and identifiers.
//!
//! A [`MappingRecord`] is one row per known Wikipedia page. Titles are the
//! unescaped page names with spaces replaced by underscores, e.g.
//! `Fermat's_Last_Theorem` for
//! `https://en.wikipedia.org/wiki/Fermat%27s_Last_Theorem`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::IngestionError;

/// 1-based insertion position of a row in a built index.
///
/// Row ids are the row references held by every multi-valued index and
/// define retrieval order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(u64);

impl RowId {
    /// Creates a row id from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One validated row of the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingRecord {
    /// Page title, underscores instead of spaces.
    pub wikipedia_title: String,
    /// Wikipedia page id.
    pub wikipedia_id: String,
    /// Linked Wikidata entity, if any.
    pub wikidata_id: Option<String>,
}

impl MappingRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(
        wikipedia_title: impl Into<String>,
        wikipedia_id: impl Into<String>,
        wikidata_id: Option<&str>,
    ) -> Self {
        Self {
            wikipedia_title: wikipedia_title.into(),
            wikipedia_id: wikipedia_id.into(),
            wikidata_id: wikidata_id.map(str::to_string),
        }
    }

    /// Feeds the record into a fingerprint hasher.
    ///
    /// Fields are length-prefixed so that no two distinct records hash the
    /// same byte stream.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        fn field(hasher: &mut blake3::Hasher, value: Option<&str>) {
            match value {
                Some(v) => {
                    hasher.update(&[1]);
                    hasher.update(&(v.len() as u64).to_le_bytes());
                    hasher.update(v.as_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }

        field(hasher, Some(&self.wikipedia_title));
        field(hasher, Some(&self.wikipedia_id));
        field(hasher, self.wikidata_id.as_deref());
    }
}

/// A record as delivered by an upstream parser, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    /// Page title.
    #[serde(default)]
    pub wikipedia_title: Option<String>,
    /// Page id; dumps carry it as an integer, other tools as a string.
    #[serde(default, deserialize_with = "string_or_number")]
    pub wikipedia_id: Option<String>,
    /// Linked Wikidata entity.
    #[serde(default)]
    pub wikidata_id: Option<String>,
}

impl RawRecord {
    /// Validates the record.
    ///
    /// `position` is the 1-based position in the input sequence and is only
    /// used for error reporting. The page id is stored in its
    /// [`canonical_page_id`] form and an empty wikidata id is treated as null.
    ///
    /// # Errors
    /// Returns [`IngestionError::MissingField`] when the title or page id is
    /// absent or empty.
    pub fn validate(self, position: u64) -> Result<MappingRecord, IngestionError> {
        let wikipedia_title = self
            .wikipedia_title
            .filter(|t| !t.is_empty())
            .ok_or(IngestionError::MissingField {
                position,
                field: "wikipedia_title",
            })?;
        let wikipedia_id = self
            .wikipedia_id
            .map(|id| canonical_page_id(&id))
            .filter(|id| !id.is_empty())
            .ok_or(IngestionError::MissingField {
                position,
                field: "wikipedia_id",
            })?;
        let wikidata_id = self.wikidata_id.filter(|q| !q.is_empty());

        Ok(MappingRecord {
            wikipedia_title,
            wikipedia_id,
            wikidata_id,
        })
    }
}

impl From<MappingRecord> for RawRecord {
    fn from(record: MappingRecord) -> Self {
        Self {
            wikipedia_title: Some(record.wikipedia_title),
            wikipedia_id: Some(record.wikipedia_id),
            wikidata_id: record.wikidata_id,
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    }))
}

/// A row read back from an index.
///
/// Indexes written by other tools may hold nulls in any column, so every
/// field is optional here even though [`MappingRecord`] requires a title and
/// a page id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRow {
    /// Insertion position.
    pub row_id: RowId,
    /// Page title.
    pub wikipedia_title: Option<String>,
    /// Page id, in canonical form.
    pub wikipedia_id: Option<String>,
    /// Linked Wikidata entity.
    pub wikidata_id: Option<String>,
}

impl MappingRow {
    /// Wraps a validated record stored at `row_id`.
    #[must_use]
    pub fn stored(row_id: RowId, record: MappingRecord) -> Self {
        Self {
            row_id,
            wikipedia_title: Some(record.wikipedia_title),
            wikipedia_id: Some(record.wikipedia_id),
            wikidata_id: record.wikidata_id,
        }
    }

    /// Returns the title, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.wikipedia_title.as_deref()
    }

    /// Returns the page id, if any.
    #[must_use]
    pub fn page_id(&self) -> Option<&str> {
        self.wikipedia_id.as_deref()
    }

    /// Returns the wikidata id, if any.
    #[must_use]
    pub fn wikidata_id(&self) -> Option<&str> {
        self.wikidata_id.as_deref()
    }
}

/// Returns a page id in the form an `INTEGER` column stores it.
///
/// Surrounding whitespace is removed. Text that reads as an integer, or as a
/// real with no fractional part, loses its sign, leading zeros and exponent:
/// `"0339"`, `"+339"` and `"339.0"` all become `"339"`. Anything else is
/// kept as trimmed text.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
pub fn canonical_page_id(raw: &str) -> String {
    // Largest magnitude below which every integral f64 is exact.
    const EXACT: f64 = 9_007_199_254_740_992.0;

    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return id.to_string();
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.abs() < EXACT => (value as i64).to_string(),
        _ => trimmed.to_string(),
    }
}

/// Returns the final path segment of a Wikipedia URL.
///
/// Everything after the last `/` is returned verbatim; a string without a
/// slash is returned unchanged.
#[must_use]
pub fn title_from_url(url: &str) -> &str {
    url.rsplit_once('/').map_or(url, |(_, last)| last)
}

/// ASCII case folding, matching SQLite's `NOCASE` collation.
#[must_use]
pub fn fold_title(title: &str) -> String {
    title.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_url() {
        assert_eq!(title_from_url("https://en.wikipedia.org/wiki/Manatee"), "Manatee");
        assert_eq!(
            title_from_url("https://en.wikipedia.org/wiki/Fermat%27s_Last_Theorem"),
            "Fermat%27s_Last_Theorem"
        );
        assert_eq!(title_from_url("Manatee"), "Manatee");
        assert_eq!(title_from_url("https://en.wikipedia.org/wiki/"), "");
    }

    #[test]
    fn test_fold_title_is_ascii_only() {
        assert_eq!(fold_title("Manatee"), "manatee");
        assert_eq!(fold_title("ÄRZTE"), "Ärzte");
        assert_ne!(fold_title("Ä"), "ä");
    }

    #[test]
    fn test_validate_ok() {
        let raw = RawRecord {
            wikipedia_title: Some("Manatee".to_string()),
            wikipedia_id: Some(" 339 ".to_string()),
            wikidata_id: Some("Q132524".to_string()),
        };
        let record = raw.validate(1).unwrap();
        assert_eq!(record, MappingRecord::new("Manatee", "339", Some("Q132524")));
    }

    #[test]
    fn test_validate_empty_wikidata_is_null() {
        let raw = RawRecord {
            wikipedia_title: Some("Sirenia".to_string()),
            wikipedia_id: Some("1".to_string()),
            wikidata_id: Some(String::new()),
        };
        assert_eq!(raw.validate(1).unwrap().wikidata_id, None);
    }

    #[test]
    fn test_validate_missing_title() {
        let raw = RawRecord {
            wikipedia_title: Some(String::new()),
            wikipedia_id: Some("1".to_string()),
            wikidata_id: None,
        };
        let err = raw.validate(4).unwrap_err();
        assert!(matches!(
            err,
            IngestionError::MissingField { position: 4, field: "wikipedia_title" }
        ));
    }

    #[test]
    fn test_validate_missing_id() {
        let raw = RawRecord {
            wikipedia_title: Some("Manatee".to_string()),
            ..RawRecord::default()
        };
        assert!(matches!(
            raw.validate(2).unwrap_err(),
            IngestionError::MissingField { field: "wikipedia_id", .. }
        ));
    }

    #[test]
    fn test_validate_canonicalizes_page_id() {
        let raw = RawRecord {
            wikipedia_title: Some("Manatee".to_string()),
            wikipedia_id: Some("0339".to_string()),
            wikidata_id: Some("Q132524".to_string()),
        };
        assert_eq!(raw.validate(1).unwrap().wikipedia_id, "339");
    }

    #[test]
    fn test_canonical_page_id() {
        assert_eq!(canonical_page_id("339"), "339");
        assert_eq!(canonical_page_id(" 0339 "), "339");
        assert_eq!(canonical_page_id("+339"), "339");
        assert_eq!(canonical_page_id("339.0"), "339");
        assert_eq!(canonical_page_id("3.39e2"), "339");
        assert_eq!(canonical_page_id("339.5"), "339.5");
        assert_eq!(canonical_page_id("page-339"), "page-339");
        assert_eq!(canonical_page_id("inf"), "inf");
        assert_eq!(canonical_page_id("   "), "");
    }

    #[test]
    fn test_stored_row_keeps_every_field() {
        let row = MappingRow::stored(RowId::new(4), MappingRecord::new("Manatee", "339", None));
        assert_eq!(row.title(), Some("Manatee"));
        assert_eq!(row.page_id(), Some("339"));
        assert_eq!(row.wikidata_id(), None);
        assert_eq!(row.row_id.get(), 4);
    }

    #[test]
    fn test_raw_record_accepts_numeric_id() {
        let raw: RawRecord =
            serde_json::from_str(r#"{"wikipedia_title":"Manatee","wikipedia_id":339}"#).unwrap();
        assert_eq!(raw.wikipedia_id.as_deref(), Some("339"));
        assert_eq!(raw.wikidata_id, None);
    }

    #[test]
    fn test_fingerprint_distinguishes_null_from_empty_fields() {
        let a = MappingRecord::new("A", "1", None);
        let b = MappingRecord {
            wikidata_id: Some(String::new()),
            ..a.clone()
        };
        let mut ha = blake3::Hasher::new();
        let mut hb = blake3::Hasher::new();
        a.hash_into(&mut ha);
        b.hash_into(&mut hb);
        assert_ne!(ha.finalize(), hb.finalize());
    }
}
