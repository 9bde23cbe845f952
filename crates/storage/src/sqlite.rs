use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use bibmerge_core::{ConsistencyViolation, Fingerprint, Record, RecordId, Rule, SkippedTag, ViolationKind};

use crate::error::StorageError;
use crate::traits::{Catalog, CatalogRecord, UpsertOutcome};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn read_record(row: &rusqlite::Row) -> Result<CatalogRecord, StorageError> {
    let identifier: String = row.get(0)?;
    let record_id_bytes: Vec<u8> = row.get(1)?;
    let harvest_timestamp: String = row.get(2)?;
    let body: Vec<u8> = row.get(3)?;
    let fingerprint_bytes: Vec<u8> = row.get(4)?;
    let deleted: bool = row.get(5)?;

    Ok(CatalogRecord {
        record_id: RecordId::from_bytes(to_array::<16>(record_id_bytes, "record_id")?),
        identifier,
        harvest_timestamp,
        record: Record::from_msgpack(&body)?,
        fingerprint: Fingerprint::from_bytes(to_array::<32>(fingerprint_bytes, "fingerprint")?),
        deleted,
    })
}

/// Insert or update the record row. Runs inside the caller's transaction.
fn upsert_in(
    conn: &Connection,
    identifier: &str,
    harvest_timestamp: &str,
    record: &Record,
) -> Result<UpsertOutcome, StorageError> {
    let body = record.to_msgpack()?;
    let fingerprint = record.fingerprint()?;

    let existing: Option<(Vec<u8>, String, Vec<u8>, bool)> = conn
        .query_row(
            "SELECT record_id, harvest_timestamp, fingerprint, deleted FROM records WHERE identifier = ?1",
            rusqlite::params![identifier],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let outcome = match existing {
        None => {
            let record_id = RecordId::new();
            conn.execute(
                "INSERT INTO records (identifier, record_id, harvest_timestamp, body, fingerprint) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    identifier,
                    record_id.as_bytes().as_slice(),
                    harvest_timestamp,
                    body,
                    fingerprint.as_bytes().as_slice(),
                ],
            )?;
            UpsertOutcome::Inserted(record_id)
        }
        Some((id_bytes, old_timestamp, old_fingerprint, deleted)) => {
            let record_id = RecordId::from_bytes(to_array::<16>(id_bytes, "record_id")?);
            if !deleted
                && old_timestamp == harvest_timestamp
                && old_fingerprint.as_slice() == fingerprint.as_bytes().as_slice()
            {
                UpsertOutcome::Unchanged(record_id)
            } else {
                conn.execute(
                    "UPDATE records SET harvest_timestamp = ?1, body = ?2, fingerprint = ?3, deleted = 0,
                     updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)
                     WHERE identifier = ?4",
                    rusqlite::params![
                        harvest_timestamp,
                        body,
                        fingerprint.as_bytes().as_slice(),
                        identifier,
                    ],
                )?;
                UpsertOutcome::Updated(record_id)
            }
        }
    };

    debug!(identifier, ?outcome, %fingerprint, "stored merged record");
    Ok(outcome)
}

fn replace_violations_in(
    conn: &Connection,
    identifier: &str,
    violations: &[ConsistencyViolation],
) -> Result<(), StorageError> {
    conn.execute(
        "DELETE FROM violations WHERE identifier = ?1",
        rusqlite::params![identifier],
    )?;
    for (position, violation) in violations.iter().enumerate() {
        conn.execute(
            "INSERT INTO violations (identifier, position, rule, kind, message) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                identifier,
                position as i64,
                violation.rule.as_str(),
                violation.kind.as_str(),
                violation.message,
            ],
        )?;
    }
    Ok(())
}

fn replace_skipped_in(conn: &Connection, identifier: &str, skipped: &[SkippedTag]) -> Result<(), StorageError> {
    conn.execute(
        "DELETE FROM skipped_tags WHERE identifier = ?1",
        rusqlite::params![identifier],
    )?;
    for (position, entry) in skipped.iter().enumerate() {
        conn.execute(
            "INSERT INTO skipped_tags (identifier, position, tag, reason) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![identifier, position as i64, entry.tag, entry.reason],
        )?;
    }
    Ok(())
}

impl Catalog for SqliteCatalog {
    fn upsert_record(
        &mut self,
        identifier: &str,
        harvest_timestamp: &str,
        record: &Record,
    ) -> Result<UpsertOutcome, StorageError> {
        let tx = self.conn.transaction()?;
        let outcome = upsert_in(&tx, identifier, harvest_timestamp, record)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn store_merged(
        &mut self,
        identifier: &str,
        harvest_timestamp: &str,
        record: &Record,
        violations: &[ConsistencyViolation],
        skipped: &[SkippedTag],
    ) -> Result<UpsertOutcome, StorageError> {
        let tx = self.conn.transaction()?;
        let outcome = upsert_in(&tx, identifier, harvest_timestamp, record)?;
        replace_violations_in(&tx, identifier, violations)?;
        replace_skipped_in(&tx, identifier, skipped)?;
        tx.commit()?;
        Ok(outcome)
    }

    fn get_record(&self, identifier: &str) -> Result<Option<CatalogRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT identifier, record_id, harvest_timestamp, body, fingerprint, deleted FROM records WHERE identifier = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![identifier])?;
        match rows.next()? {
            Some(row) => Ok(Some(read_record(row)?)),
            None => Ok(None),
        }
    }

    fn mark_deleted(&mut self, identifier: &str) -> Result<bool, StorageError> {
        let changed = self.conn.execute(
            "UPDATE records SET deleted = 1, updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)
             WHERE identifier = ?1 AND deleted = 0",
            rusqlite::params![identifier],
        )?;
        Ok(changed > 0)
    }

    fn timestamps(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT identifier, harvest_timestamp FROM records WHERE deleted = 0")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut timestamps = BTreeMap::new();
        for row in rows {
            let (identifier, timestamp) = row?;
            timestamps.insert(identifier, timestamp);
        }
        Ok(timestamps)
    }

    fn record_violations(
        &mut self,
        identifier: &str,
        violations: &[ConsistencyViolation],
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        replace_violations_in(&tx, identifier, violations)?;
        tx.commit()?;
        Ok(())
    }

    fn violations(&self, identifier: &str) -> Result<Vec<ConsistencyViolation>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT rule, kind, message FROM violations WHERE identifier = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(rusqlite::params![identifier], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut violations = Vec::new();
        for row in rows {
            let (rule, kind, message) = row?;
            violations.push(ConsistencyViolation::new(
                Rule::parse(&rule)?,
                ViolationKind::parse(&kind)?,
                message,
            ));
        }
        Ok(violations)
    }

    fn skipped_tags(&self, identifier: &str) -> Result<Vec<SkippedTag>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT tag, reason FROM skipped_tags WHERE identifier = ?1 ORDER BY position")?;
        let rows = stmt.query_map(rusqlite::params![identifier], |row| {
            Ok(SkippedTag::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut skipped = Vec::new();
        for row in rows {
            skipped.push(row?);
        }
        Ok(skipped)
    }

    fn record_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT count(*) FROM records WHERE deleted = 0", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibmerge_core::FieldInstance;

    fn record(value: &str) -> Record {
        let mut record = Record::new();
        record.push_field(
            "300",
            FieldInstance::from_pairs([('a', value), ('7', "A&A")]).unwrap(),
        );
        record
    }

    #[test]
    fn upsert_assigns_stable_record_id() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let first = catalog.upsert_record("2020ApJ...900..001A", "t1", &record("10")).unwrap();
        assert!(matches!(first, UpsertOutcome::Inserted(_)));

        let second = catalog.upsert_record("2020ApJ...900..001A", "t2", &record("15")).unwrap();
        assert_eq!(second, UpsertOutcome::Updated(first.record_id()));

        let stored = catalog.get_record("2020ApJ...900..001A").unwrap().unwrap();
        assert_eq!(stored.harvest_timestamp, "t2");
        assert_eq!(stored.record, record("15"));
        assert_eq!(stored.fingerprint, record("15").fingerprint().unwrap());
    }

    #[test]
    fn identical_upsert_is_unchanged() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let first = catalog.upsert_record("X", "t1", &record("10")).unwrap();
        let again = catalog.upsert_record("X", "t1", &record("10")).unwrap();
        assert_eq!(again, UpsertOutcome::Unchanged(first.record_id()));
    }

    #[test]
    fn deleted_records_leave_timestamps_and_revive_on_upsert() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.upsert_record("A", "t1", &record("10")).unwrap();
        catalog.upsert_record("B", "t1", &record("10")).unwrap();

        assert!(catalog.mark_deleted("A").unwrap());
        assert!(!catalog.mark_deleted("A").unwrap());
        assert!(!catalog.mark_deleted("missing").unwrap());

        let timestamps = catalog.timestamps().unwrap();
        assert_eq!(timestamps.keys().collect::<Vec<_>>(), vec!["B"]);
        assert_eq!(catalog.record_count().unwrap(), 1);
        assert!(catalog.get_record("A").unwrap().unwrap().deleted);

        let revived = catalog.upsert_record("A", "t1", &record("10")).unwrap();
        assert!(matches!(revived, UpsertOutcome::Updated(_)));
        assert!(!catalog.get_record("A").unwrap().unwrap().deleted);
    }

    #[test]
    fn violation_log_is_replaced_per_identifier() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let first = vec![
            ConsistencyViolation::new(Rule::Temporal, ViolationKind::YearMismatch, "print 2019 vs 2020"),
            ConsistencyViolation::new(Rule::Authorship, ViolationKind::AuthorBibcodeMismatch, "C vs B"),
        ];
        catalog.record_violations("A", &first).unwrap();
        assert_eq!(catalog.violations("A").unwrap(), first);

        catalog.record_violations("A", &[]).unwrap();
        assert!(catalog.violations("A").unwrap().is_empty());
    }

    #[test]
    fn store_merged_writes_record_and_both_logs() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        let violations = vec![ConsistencyViolation::new(
            Rule::Temporal,
            ViolationKind::MissingIdentifier,
            "no identifier field (tag 970)",
        )];
        let skipped = vec![SkippedTag::new("970", "2 instances of a non-repeatable field")];

        let outcome = catalog
            .store_merged("A", "t1", &record("10"), &violations, &skipped)
            .unwrap();
        assert!(matches!(outcome, UpsertOutcome::Inserted(_)));
        assert_eq!(catalog.get_record("A").unwrap().unwrap().record, record("10"));
        assert_eq!(catalog.violations("A").unwrap(), violations);
        assert_eq!(catalog.skipped_tags("A").unwrap(), skipped);

        catalog.store_merged("A", "t2", &record("15"), &[], &[]).unwrap();
        assert!(catalog.violations("A").unwrap().is_empty());
        assert!(catalog.skipped_tags("A").unwrap().is_empty());
    }

    #[test]
    fn failed_store_leaves_previous_state() {
        let mut catalog = SqliteCatalog::open_in_memory().unwrap();
        catalog.store_merged("A", "t1", &record("10"), &[], &[]).unwrap();
        catalog.conn().execute_batch("DROP TABLE skipped_tags").unwrap();

        let skipped = [SkippedTag::new("970", "duplicate")];
        assert!(catalog.store_merged("A", "t2", &record("15"), &[], &skipped).is_err());

        let stored = catalog.get_record("A").unwrap().unwrap();
        assert_eq!(stored.harvest_timestamp, "t1");
        assert_eq!(stored.record, record("10"));
    }
}
