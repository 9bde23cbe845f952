//! Catalog synchronisation: decide which works need merging, merge them and
//! store the results.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{info, info_span, warn};

use bibmerge_core::{Record, RunId};
use bibmerge_storage::{Catalog, RecordStatus, UpsertOutcome, diff_timestamps};

use crate::error::EngineError;
use crate::{Merger, WorkOutcome};

/// Supplies the partial source records of one work.
pub trait SourceProvider: Sync {
    fn fetch(&self, identifier: &str) -> Result<Vec<Record>, EngineError>;
}

/// Counts and failures of one synchronisation run.
#[derive(Debug)]
pub struct SyncReport {
    pub run_id: RunId,
    pub status: RecordStatus,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub degraded: usize,
    pub violations: usize,
    pub failed: Vec<(String, EngineError)>,
}

impl SyncReport {
    fn new(status: RecordStatus) -> Self {
        Self {
            run_id: RunId::new(),
            status,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            deleted: 0,
            degraded: 0,
            violations: 0,
            failed: Vec::new(),
        }
    }
}

pub struct Pipeline<'m> {
    merger: &'m Merger,
}

impl<'m> Pipeline<'m> {
    pub fn new(merger: &'m Merger) -> Self {
        Self { merger }
    }

    /// Bring `catalog` in line with the harvest side.
    ///
    /// Added and modified works are fetched and merged in parallel, then
    /// stored one by one together with their violation log and skipped tags.
    /// Works that fail to fetch or merge are reported and left untouched in
    /// the catalog.
    /// Catalog errors abort the run.
    pub fn sync<C: Catalog>(
        &self,
        catalog: &mut C,
        sources: &impl SourceProvider,
        harvest: &BTreeMap<String, String>,
    ) -> Result<SyncReport, EngineError> {
        let stored = catalog.timestamps()?;
        let status = diff_timestamps(harvest, &stored);
        let mut report = SyncReport::new(status);
        let span = info_span!("sync", run_id = %report.run_id);
        let _enter = span.enter();

        let identifiers: Vec<&String> = report.status.to_merge().collect();
        let results: Vec<(String, Result<WorkOutcome, EngineError>)> = identifiers
            .par_iter()
            .map(|identifier| {
                let result = sources
                    .fetch(identifier)
                    .and_then(|records| self.merger.merge_work(identifier, &records));
                (identifier.to_string(), result)
            })
            .collect();

        for (identifier, result) in results {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(identifier = %identifier, error = %e, "work not merged");
                    report.failed.push((identifier, e));
                    continue;
                }
            };

            // to_merge only yields harvested identifiers
            let timestamp = harvest.get(&identifier).map(String::as_str).unwrap_or_default();
            let stored = catalog.store_merged(
                &identifier,
                timestamp,
                &outcome.record,
                &outcome.violations,
                &outcome.skipped_tags(),
            )?;
            match stored {
                UpsertOutcome::Inserted(_) => report.inserted += 1,
                UpsertOutcome::Updated(_) => report.updated += 1,
                UpsertOutcome::Unchanged(_) => report.unchanged += 1,
            }
            report.violations += outcome.violations.len();
            if !outcome.structural_errors.is_empty() {
                report.degraded += 1;
            }
        }

        let to_delete: Vec<String> = report.status.deleted.iter().cloned().collect();
        for identifier in to_delete {
            if catalog.mark_deleted(&identifier)? {
                report.deleted += 1;
            }
        }

        info!(
            added = report.status.added.len(),
            modified = report.status.modified.len(),
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            deleted = report.deleted,
            degraded = report.degraded,
            failed = report.failed.len(),
            "sync finished"
        );
        Ok(report)
    }
}
