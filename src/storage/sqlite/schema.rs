//! On-disk layout of a SQLite index.
//!
//! ```text
//! mapping(wikipedia_id INTEGER, wikipedia_title TEXT, wikidata_id TEXT)
//!   idx_wikipedia_id            ON mapping(wikipedia_id)
//!   idx_wikipedia_title         ON mapping(wikipedia_title)
//!   idx_wikidata_id             ON mapping(wikidata_id)
//!   idx_wikipedia_title_nocase  ON mapping(wikipedia_title COLLATE NOCASE)   -- optional
//! index_meta(key TEXT PRIMARY KEY, value TEXT)
//! ```
//!
//! The implicit `rowid` of `mapping` is the row id: the builder inserts it
//! explicitly and every query orders by it. No uniqueness constraint exists
//! on any mapping column.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::storage::traits::IndexMetadata;

pub(crate) const CREATE_MAPPING: &str = "CREATE TABLE mapping (
    wikipedia_id INTEGER,
    wikipedia_title TEXT,
    wikidata_id TEXT
)";

pub(crate) const CREATE_META: &str = "CREATE TABLE index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";

pub(crate) const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX idx_wikipedia_id ON mapping(wikipedia_id)",
    "CREATE INDEX idx_wikipedia_title ON mapping(wikipedia_title)",
    "CREATE INDEX idx_wikidata_id ON mapping(wikidata_id)",
];

pub(crate) const CREATE_NOCASE_INDEX: &str =
    "CREATE INDEX idx_wikipedia_title_nocase ON mapping(wikipedia_title COLLATE NOCASE)";

pub(crate) const INSERT_ROW: &str = "INSERT INTO mapping (rowid, wikipedia_id, wikipedia_title, wikidata_id)
    VALUES (?1, ?2, ?3, ?4)";

const ROW_COLUMNS: &str = "SELECT rowid, CAST(wikipedia_id AS TEXT), wikipedia_title, wikidata_id FROM mapping";

pub(crate) fn select_by_title() -> String {
    format!("{ROW_COLUMNS} WHERE wikipedia_title = ?1 ORDER BY rowid")
}

pub(crate) fn select_by_title_nocase() -> String {
    format!("{ROW_COLUMNS} WHERE wikipedia_title = ?1 COLLATE NOCASE ORDER BY rowid")
}

pub(crate) fn select_by_wikidata_id() -> String {
    format!("{ROW_COLUMNS} WHERE wikidata_id = ?1 ORDER BY rowid")
}

pub(crate) fn select_by_wikipedia_id() -> String {
    format!("{ROW_COLUMNS} WHERE wikipedia_id = ?1 ORDER BY rowid")
}

const META_FORMAT_VERSION: &str = "format_version";
const META_BUILT_AT: &str = "built_at";
const META_ROW_COUNT: &str = "row_count";
const META_FINGERPRINT: &str = "fingerprint";

/// Returns true if `table` exists.
pub(crate) fn has_table(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

pub(crate) fn write_metadata(conn: &Connection, meta: &IndexMetadata) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("INSERT INTO index_meta (key, value) VALUES (?1, ?2)")?;
    stmt.execute(params![META_FORMAT_VERSION, meta.format_version.to_string()])?;
    stmt.execute(params![META_BUILT_AT, meta.built_at.to_rfc3339()])?;
    stmt.execute(params![META_ROW_COUNT, meta.row_count.to_string()])?;
    stmt.execute(params![META_FINGERPRINT, meta.fingerprint])?;
    Ok(())
}

/// Reads build metadata.
///
/// Returns `Ok(None)` for indexes without a metadata table, e.g. ones built
/// by other tools. A present but incomplete table is an error.
pub(crate) fn read_metadata(conn: &Connection) -> Result<Option<IndexMetadata>, String> {
    if !has_table(conn, "index_meta").map_err(|e| e.to_string())? {
        return Ok(None);
    }

    let get = |key: &str| -> Result<String, String> {
        conn.query_row(
            "SELECT value FROM index_meta WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("index metadata is missing '{key}'"))
    };

    let format_version = get(META_FORMAT_VERSION)?
        .parse::<u32>()
        .map_err(|e| format!("invalid {META_FORMAT_VERSION}: {e}"))?;
    let built_at = DateTime::parse_from_rfc3339(&get(META_BUILT_AT)?)
        .map_err(|e| format!("invalid {META_BUILT_AT}: {e}"))?
        .with_timezone(&Utc);
    let row_count = get(META_ROW_COUNT)?
        .parse::<u64>()
        .map_err(|e| format!("invalid {META_ROW_COUNT}: {e}"))?;
    let fingerprint = get(META_FINGERPRINT)?;

    Ok(Some(IndexMetadata {
        format_version,
        built_at,
        row_count,
        fingerprint,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_MAPPING).unwrap();
        conn
    }

    #[test]
    fn test_has_table() {
        let conn = fresh();
        assert!(has_table(&conn, "mapping").unwrap());
        assert!(!has_table(&conn, "index_meta").unwrap());
    }

    #[test]
    fn test_metadata_absent_without_table() {
        let conn = fresh();
        assert_eq!(read_metadata(&conn).unwrap(), None);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let conn = fresh();
        conn.execute_batch(CREATE_META).unwrap();
        let meta = IndexMetadata {
            format_version: 1,
            built_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            row_count: 42,
            fingerprint: "ab".repeat(32),
        };
        write_metadata(&conn, &meta).unwrap();
        assert_eq!(read_metadata(&conn).unwrap(), Some(meta));
    }

    #[test]
    fn test_incomplete_metadata_is_error() {
        let conn = fresh();
        conn.execute_batch(CREATE_META).unwrap();
        conn.execute(
            "INSERT INTO index_meta (key, value) VALUES ('format_version', '1')",
            [],
        )
        .unwrap();
        let err = read_metadata(&conn).unwrap_err();
        assert!(err.contains("built_at"));
    }

    #[test]
    fn test_integer_affinity_matches_text_parameter() {
        let conn = fresh();
        conn.execute(INSERT_ROW, params![1i64, "339", "Manatee", "Q132524"])
            .unwrap();
        let title: String = conn
            .query_row(&select_by_wikipedia_id(), params!["339"], |row| row.get(2))
            .unwrap();
        assert_eq!(title, "Manatee");
        let id: String = conn
            .query_row(&select_by_title(), params!["Manatee"], |row| row.get(1))
            .unwrap();
        assert_eq!(id, "339");
    }
}
