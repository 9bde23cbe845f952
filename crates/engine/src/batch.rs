use rayon::prelude::*;
use tracing::{info, warn};

use bibmerge_core::Record;

use crate::error::EngineError;
use crate::{Merger, WorkOutcome};

/// The source records of one work.
#[derive(Debug, Clone)]
pub struct Work {
    pub identifier: String,
    pub sources: Vec<Record>,
}

impl Work {
    pub fn new(identifier: impl Into<String>, sources: Vec<Record>) -> Self {
        Self {
            identifier: identifier.into(),
            sources,
        }
    }
}

/// Results of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub merged: Vec<WorkOutcome>,
    pub failed: Vec<(String, EngineError)>,
}

impl BatchReport {
    pub fn violation_count(&self) -> usize {
        self.merged.iter().map(|o| o.violations.len()).sum()
    }

    pub fn degraded_count(&self) -> usize {
        self.merged.iter().filter(|o| !o.structural_errors.is_empty()).count()
    }

    fn push(&mut self, identifier: String, result: Result<WorkOutcome, EngineError>) {
        match result {
            Ok(outcome) => self.merged.push(outcome),
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "work failed");
                self.failed.push((identifier, e));
            }
        }
    }
}

impl Merger {
    /// Merge independent works in parallel. A failing work never stops the
    /// others.
    pub fn merge_batch(&self, works: &[Work]) -> BatchReport {
        let results: Vec<(String, Result<WorkOutcome, EngineError>)> = works
            .par_iter()
            .map(|work| (work.identifier.clone(), self.merge_work(&work.identifier, &work.sources)))
            .collect();

        let mut report = BatchReport::default();
        for (identifier, result) in results {
            report.push(identifier, result);
        }
        info!(
            works = works.len(),
            merged = report.merged.len(),
            failed = report.failed.len(),
            degraded = report.degraded_count(),
            violations = report.violation_count(),
            "batch merged"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibmerge_core::{FieldInstance, MergeConfig};

    fn work(identifier: &str, values: &[(&str, &str)]) -> Work {
        let sources = values
            .iter()
            .map(|(value, origin)| {
                let mut record = Record::new();
                record.push_field("300", FieldInstance::from_pairs([('a', *value), ('7', *origin)]).unwrap());
                record
            })
            .collect();
        Work::new(identifier, sources)
    }

    #[test]
    fn batch_preserves_input_order() {
        let config = MergeConfig::default().with_priority_order(["A&A", "NED"]).unwrap();
        let merger = Merger::new(config).unwrap();
        let works: Vec<Work> = (0..64)
            .map(|i| work(&format!("W{i:03}"), &[("15", "NED"), ("10", "A&A")]))
            .chain(std::iter::once(Work::new("empty", Vec::new())))
            .collect();

        let report = merger.merge_batch(&works);
        assert_eq!(report.merged.len(), 64);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "empty");
        for (i, outcome) in report.merged.iter().enumerate() {
            assert_eq!(outcome.identifier, format!("W{i:03}"));
            assert_eq!(outcome.record.fields("300")[0].get('a'), Some("10"));
        }
        // no identifier, author or date in these records
        assert_eq!(report.violation_count(), 64 * 2);
    }
}
