//! Index construction shared by all backends.
//!
//! An ingestion collaborator streams [`RawRecord`]s; [`ingest`] validates
//! them, applies the [`MalformedPolicy`], assigns row ids in input order and
//! hands each accepted record to a [`RecordSink`]. The sink decides how rows
//! are stored.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{IngestionError, MapperError, MapperResult};
use crate::record::{MappingRecord, RawRecord, RowId};

/// What to do with a record that fails validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Fail the whole build on the first malformed record.
    #[default]
    Abort,
    /// Drop the record, count it and continue.
    Skip,
}

/// Configuration for index construction.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Rows inserted per transaction.
    pub batch_size: usize,
    /// Handling of malformed records.
    pub malformed: MalformedPolicy,
    /// Also index titles under ASCII case folding (SQLite `NOCASE`).
    pub case_insensitive_index: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            malformed: MalformedPolicy::Abort,
            case_insensitive_index: false,
        }
    }
}

impl BuildConfig {
    const MIN_BATCH_SIZE: usize = 1;

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`MapperError::Config`] if `batch_size` is zero.
    pub fn validate(self) -> Result<Self, MapperError> {
        if self.batch_size < Self::MIN_BATCH_SIZE {
            return Err(MapperError::config(format!(
                "batch_size must be at least {} (got {})",
                Self::MIN_BATCH_SIZE,
                self.batch_size
            )));
        }
        Ok(self)
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Rows written to the index.
    pub inserted: u64,
    /// Malformed records dropped under [`MalformedPolicy::Skip`].
    pub skipped: u64,
    /// Inserted rows without a wikidata id.
    pub unlinked: u64,
    /// BLAKE3 digest (hex) over the inserted records, in order.
    pub fingerprint: String,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
    /// Wall-clock duration of the build.
    pub elapsed_ms: u64,
}

/// Destination for accepted records.
pub trait RecordSink {
    /// Stores one record. Row ids arrive strictly ascending, starting at 1.
    ///
    /// # Errors
    /// Returns an error if the record cannot be stored; the build is aborted.
    fn append(&mut self, row_id: RowId, record: MappingRecord) -> MapperResult<()>;
}

/// Drives a build: validate, number and store every record.
///
/// Positions in error messages are 1-based over the whole input, including
/// records that end up skipped.
///
/// # Errors
/// - [`MapperError::Ingestion`] on a malformed record under
///   [`MalformedPolicy::Abort`]
/// - Any error returned by the sink
pub fn ingest<I, S>(records: I, policy: MalformedPolicy, sink: &mut S) -> MapperResult<BuildReport>
where
    I: IntoIterator<Item = Result<RawRecord, IngestionError>>,
    S: RecordSink + ?Sized,
{
    let started = Instant::now();
    let mut hasher = blake3::Hasher::new();
    let mut inserted = 0u64;
    let mut skipped = 0u64;
    let mut unlinked = 0u64;

    for (index, raw) in records.into_iter().enumerate() {
        let position = index as u64 + 1;
        let record = match raw.and_then(|r| r.validate(position)) {
            Ok(record) => record,
            Err(err) => match policy {
                MalformedPolicy::Abort => return Err(err.into()),
                MalformedPolicy::Skip => {
                    tracing::warn!(position, error = %err, "skipping malformed record");
                    skipped += 1;
                    continue;
                }
            },
        };

        record.hash_into(&mut hasher);
        if record.wikidata_id.is_none() {
            unlinked += 1;
        }
        inserted += 1;
        sink.append(RowId::new(inserted), record)?;
    }

    Ok(BuildReport {
        inserted,
        skipped,
        unlinked,
        fingerprint: hasher.finalize().to_hex().to_string(),
        built_at: Utc::now(),
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}

/// Wraps already-validated records for [`ingest`].
pub fn accepted<I>(records: I) -> impl Iterator<Item = Result<RawRecord, IngestionError>>
where
    I: IntoIterator<Item = MappingRecord>,
{
    records.into_iter().map(|record| Ok(RawRecord::from(record)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct VecSink(Vec<(RowId, MappingRecord)>);

    impl RecordSink for VecSink {
        fn append(&mut self, row_id: RowId, record: MappingRecord) -> MapperResult<()> {
            self.0.push((row_id, record));
            Ok(())
        }
    }

    fn raw(title: Option<&str>, id: Option<&str>, qid: Option<&str>) -> RawRecord {
        RawRecord {
            wikipedia_title: title.map(str::to_string),
            wikipedia_id: id.map(str::to_string),
            wikidata_id: qid.map(str::to_string),
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(BuildConfig::default().validate().is_ok());
        let bad = BuildConfig {
            batch_size: 0,
            ..BuildConfig::default()
        };
        let err = bad.validate().unwrap_err();
        assert!(format!("{err}").contains("batch_size"));
    }

    #[test]
    fn test_ingest_assigns_sequential_row_ids() {
        let mut sink = VecSink::default();
        let records = vec![
            MappingRecord::new("Manatee", "339", Some("Q132524")),
            MappingRecord::new("Sea_cow", "340", Some("Q132524")),
            MappingRecord::new("Orphan", "341", None),
        ];
        let report = ingest(accepted(records), MalformedPolicy::Abort, &mut sink).unwrap();

        assert_eq!(report.inserted, 3);
        assert_eq!(report.unlinked, 1);
        assert_eq!(report.skipped, 0);
        let ids: Vec<u64> = sink.0.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_abort_on_malformed() {
        let mut sink = VecSink::default();
        let records = vec![
            Ok(raw(Some("A"), Some("1"), None)),
            Ok(raw(None, Some("2"), None)),
            Ok(raw(Some("C"), Some("3"), None)),
        ];
        let err = ingest(records, MalformedPolicy::Abort, &mut sink).unwrap_err();

        assert!(matches!(
            err,
            MapperError::Ingestion(IngestionError::MissingField { position: 2, .. })
        ));
        assert_eq!(sink.0.len(), 1);
    }

    #[test]
    fn test_skip_counts_malformed_and_parse_errors() {
        let mut sink = VecSink::default();
        let records = vec![
            Ok(raw(Some("A"), Some("1"), Some("Q1"))),
            Err(IngestionError::parse(2, "bad line")),
            Ok(raw(Some("C"), None, None)),
            Ok(raw(Some("D"), Some("4"), None)),
        ];
        let report = ingest(records, MalformedPolicy::Skip, &mut sink).unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(sink.0[1].0, RowId::new(2));
        assert_eq!(sink.0[1].1.wikipedia_title, "D");
    }

    #[test]
    fn test_fingerprint_is_stable_and_order_sensitive() {
        let a = MappingRecord::new("A", "1", Some("Q1"));
        let b = MappingRecord::new("B", "2", None);

        let run = |records: Vec<MappingRecord>| {
            let mut sink = VecSink::default();
            ingest(accepted(records), MalformedPolicy::Abort, &mut sink)
                .unwrap()
                .fingerprint
        };

        let first = run(vec![a.clone(), b.clone()]);
        assert_eq!(first, run(vec![a.clone(), b.clone()]));
        assert_ne!(first, run(vec![b, a]));
        assert_eq!(first.len(), 64);
    }
}
