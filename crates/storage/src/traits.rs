use std::collections::BTreeMap;

use bibmerge_core::{ConsistencyViolation, Fingerprint, Record, RecordId, SkippedTag};

use crate::error::StorageError;

/// A merged record as stored in the catalog.
#[derive(Debug, Clone)]
pub struct CatalogRecord {
    pub record_id: RecordId,
    pub identifier: String,
    pub harvest_timestamp: String,
    pub record: Record,
    pub fingerprint: Fingerprint,
    pub deleted: bool,
}

/// What an upsert did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(RecordId),
    Updated(RecordId),
    /// Same content and timestamp as before; nothing written.
    Unchanged(RecordId),
}

impl UpsertOutcome {
    pub fn record_id(&self) -> RecordId {
        match self {
            Self::Inserted(id) | Self::Updated(id) | Self::Unchanged(id) => *id,
        }
    }
}

/// Target catalog of merged records.
pub trait Catalog {
    /// Store the merged record for `identifier`. The record id is assigned on
    /// first insert and kept across later updates; a deleted record is revived.
    fn upsert_record(
        &mut self,
        identifier: &str,
        harvest_timestamp: &str,
        record: &Record,
    ) -> Result<UpsertOutcome, StorageError>;

    /// Store a merged record together with its violation log and the tags
    /// left out of it, all or nothing. Both logs replace what was stored for
    /// `identifier` before.
    fn store_merged(
        &mut self,
        identifier: &str,
        harvest_timestamp: &str,
        record: &Record,
        violations: &[ConsistencyViolation],
        skipped: &[SkippedTag],
    ) -> Result<UpsertOutcome, StorageError>;

    fn get_record(&self, identifier: &str) -> Result<Option<CatalogRecord>, StorageError>;

    /// Flag `identifier` as deleted. Returns false if it was unknown or
    /// already deleted.
    fn mark_deleted(&mut self, identifier: &str) -> Result<bool, StorageError>;

    /// identifier → harvest timestamp for every record not marked deleted.
    fn timestamps(&self) -> Result<BTreeMap<String, String>, StorageError>;

    /// Replace the stored violation log of `identifier`.
    fn record_violations(
        &mut self,
        identifier: &str,
        violations: &[ConsistencyViolation],
    ) -> Result<(), StorageError>;

    fn violations(&self, identifier: &str) -> Result<Vec<ConsistencyViolation>, StorageError>;

    /// Tags left out of the stored record; empty for a complete record.
    fn skipped_tags(&self, identifier: &str) -> Result<Vec<SkippedTag>, StorageError>;

    fn record_count(&self) -> Result<u64, StorageError>;
}
