//! In-memory storage backend.
//!
//! Holds every row in a vector and keeps one explicit multi-valued index per
//! lookup direction. It is intended for embedded usage, tests, and as a
//! reference implementation of the lookup contracts.

use crate::error::{IngestionError, MapperResult};
use crate::ingest::{accepted, ingest, BuildConfig, BuildReport, RecordSink};
use crate::record::{
    canonical_page_id, fold_title, MappingRecord, MappingRow, RawRecord, RowId,
};
use crate::resolve::MultiIndex;
use crate::storage::traits::{IndexMetadata, IndexStore, StorageError};
use crate::storage::FORMAT_VERSION;

/// Immutable in-memory index.
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    rows: Vec<MappingRecord>,
    by_title: MultiIndex,
    by_title_folded: MultiIndex,
    by_wikidata_id: MultiIndex,
    by_wikipedia_id: MultiIndex,
    metadata: Option<IndexMetadata>,
}

impl MemoryIndexStore {
    /// Builds an index from validated records.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = MappingRecord>) -> Self {
        let mut store = Self::default();
        for record in records {
            let row_id = RowId::new(store.rows.len() as u64 + 1);
            store.index(row_id, record);
        }
        store
    }

    /// Builds an index from raw records, applying the configured policy.
    ///
    /// # Errors
    /// - [`crate::MapperError::Config`] if the configuration is invalid
    /// - [`crate::MapperError::Ingestion`] on a malformed record under
    ///   [`crate::ingest::MalformedPolicy::Abort`]
    pub fn build<I>(records: I, config: BuildConfig) -> MapperResult<(Self, BuildReport)>
    where
        I: IntoIterator<Item = Result<RawRecord, IngestionError>>,
    {
        let config = config.validate()?;
        let mut store = Self::default();
        let report = ingest(records, config.malformed, &mut store)?;
        store.metadata = Some(IndexMetadata {
            format_version: FORMAT_VERSION,
            built_at: report.built_at,
            row_count: report.inserted,
            fingerprint: report.fingerprint.clone(),
        });
        Ok((store, report))
    }

    /// Builds an index from validated records and records build metadata.
    ///
    /// # Errors
    /// Propagates configuration errors only; valid records cannot fail.
    pub fn build_records(
        records: impl IntoIterator<Item = MappingRecord>,
    ) -> MapperResult<(Self, BuildReport)> {
        Self::build(accepted(records), BuildConfig::default())
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the index holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn index(&mut self, row_id: RowId, mut record: MappingRecord) {
        record.wikipedia_id = canonical_page_id(&record.wikipedia_id);
        self.by_title.insert(record.wikipedia_title.as_str(), row_id);
        self.by_title_folded
            .insert(fold_title(&record.wikipedia_title), row_id);
        if let Some(qid) = &record.wikidata_id {
            self.by_wikidata_id.insert(qid.as_str(), row_id);
        }
        self.by_wikipedia_id
            .insert(record.wikipedia_id.as_str(), row_id);
        self.rows.push(record);
    }

    fn resolve(&self, postings: &[RowId]) -> Vec<MappingRow> {
        postings
            .iter()
            .filter_map(|&row_id| {
                let slot = usize::try_from(row_id.get()).ok()?.checked_sub(1)?;
                self.rows
                    .get(slot)
                    .map(|record| MappingRow::stored(row_id, record.clone()))
            })
            .collect()
    }
}

impl RecordSink for MemoryIndexStore {
    fn append(&mut self, row_id: RowId, record: MappingRecord) -> MapperResult<()> {
        self.index(row_id, record);
        Ok(())
    }
}

impl IndexStore for MemoryIndexStore {
    fn rows_by_title(
        &self,
        title: &str,
        case_insensitive: bool,
    ) -> Result<Vec<MappingRow>, StorageError> {
        let postings = if case_insensitive {
            self.by_title_folded.get(&fold_title(title))
        } else {
            self.by_title.get(title)
        };
        Ok(self.resolve(postings))
    }

    fn rows_by_wikidata_id(&self, wikidata_id: &str) -> Result<Vec<MappingRow>, StorageError> {
        Ok(self.resolve(self.by_wikidata_id.get(wikidata_id)))
    }

    fn rows_by_wikipedia_id(&self, wikipedia_id: &str) -> Result<Vec<MappingRow>, StorageError> {
        let key = canonical_page_id(wikipedia_id);
        Ok(self.resolve(self.by_wikipedia_id.get(&key)))
    }

    fn metadata(&self) -> Result<Option<IndexMetadata>, StorageError> {
        Ok(self.metadata.clone())
    }
}
