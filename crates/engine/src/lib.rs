pub mod assembler;
pub mod batch;
pub mod checks;
pub mod error;
pub mod pipeline;
pub mod resolver;

pub use assembler::{Assembler, Assembly};
pub use batch::{BatchReport, Work};
pub use checks::Checker;
pub use error::EngineError;
pub use pipeline::{Pipeline, SourceProvider, SyncReport};
pub use resolver::{ExactKey, FieldGroup, IdentityKey, Resolver, SourcedField};

use std::sync::Arc;

use bibmerge_core::{ConsistencyViolation, MergeConfig, Record, SkippedTag, StructuralPolicy};
use tracing::{instrument, warn};

/// Merged record of one work with everything that went wrong on the way.
#[derive(Debug)]
pub struct WorkOutcome {
    pub identifier: String,
    pub record: Record,
    /// Tags left out of `record`. Only non-empty under the degrade policy.
    pub structural_errors: Vec<EngineError>,
    pub violations: Vec<ConsistencyViolation>,
}

impl WorkOutcome {
    pub fn is_clean(&self) -> bool {
        self.structural_errors.is_empty() && self.violations.is_empty()
    }

    /// The structural errors as catalog markers.
    pub fn skipped_tags(&self) -> Vec<SkippedTag> {
        self.structural_errors.iter().filter_map(EngineError::skipped_tag).collect()
    }
}

/// Merges the source records of one work into a single record.
///
/// Holds the validated configuration; cheap to clone and safe to share
/// across worker threads.
#[derive(Clone)]
pub struct Merger {
    config: Arc<MergeConfig>,
    key: Arc<dyn IdentityKey>,
}

impl Merger {
    /// Validate `config` and build a merger using exact identity keys.
    pub fn new(config: MergeConfig) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::Config)?;
        Ok(Self {
            config: Arc::new(config),
            key: Arc::new(ExactKey),
        })
    }

    /// Replace the identity key used to match repeatable fields.
    pub fn with_identity_key(mut self, key: impl IdentityKey + 'static) -> Self {
        self.key = Arc::new(key);
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn assemble(&self, sources: &[Record]) -> Assembly {
        Assembler::new(&self.config, self.key.as_ref()).assemble(sources)
    }

    pub fn check(&self, record: &Record) -> Vec<ConsistencyViolation> {
        Checker::new(&self.config).check(record)
    }

    /// Assemble and check one work. Structural errors abandon the work under
    /// [`StructuralPolicy::Abort`] and are carried in the outcome otherwise.
    #[instrument(skip(self, sources), fields(sources = sources.len()))]
    pub fn merge_work(&self, identifier: &str, sources: &[Record]) -> Result<WorkOutcome, EngineError> {
        if sources.is_empty() {
            return Err(EngineError::NoSources(identifier.to_string()));
        }

        let Assembly { record, mut skipped } = self.assemble(sources);
        if !skipped.is_empty() && self.config.on_structural_error == StructuralPolicy::Abort {
            let first = skipped.swap_remove(0);
            return Err(EngineError::WorkAborted {
                identifier: identifier.to_string(),
                source: Box::new(first),
            });
        }

        let violations = self.check(&record);
        for violation in &violations {
            warn!(identifier, rule = violation.rule.as_str(), kind = %violation.kind, "{}", violation.message);
        }

        Ok(WorkOutcome {
            identifier: identifier.to_string(),
            record,
            structural_errors: skipped,
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bibmerge_core::{FieldInstance, FieldRule, ViolationKind};

    fn field(pairs: &[(char, &str)]) -> FieldInstance {
        FieldInstance::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn duplicated_identifier() -> Record {
        let mut record = Record::new();
        record.push_field("970", field(&[('a', "2020ApJ...900..001A")]));
        record.push_field("970", field(&[('a', "2020ApJ...900..002A")]));
        record.push_field("100", field(&[('a', "Accomazzi, A")]));
        record
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = MergeConfig::default().with_field_rule("700", FieldRule {
            repeatable: true,
            identity_key_subfields: Vec::new(),
        });
        assert!(matches!(Merger::new(config), Err(EngineError::Config(_))));
    }

    #[test]
    fn empty_work_is_an_error() {
        let merger = Merger::new(MergeConfig::default()).unwrap();
        assert!(matches!(merger.merge_work("X", &[]), Err(EngineError::NoSources(_))));
    }

    #[test]
    fn degrade_policy_keeps_partial_record() {
        let merger = Merger::new(MergeConfig::default()).unwrap();
        let outcome = merger.merge_work("2020ApJ...900..001A", &[duplicated_identifier()]).unwrap();
        assert_eq!(outcome.structural_errors.len(), 1);
        let skipped = outcome.skipped_tags();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].tag, "970");
        assert!(outcome.record.contains_tag("100"));
        assert!(!outcome.record.contains_tag("970"));
        // the skipped identifier shows up as a consistency problem too
        assert!(outcome.violations.iter().any(|v| v.kind == ViolationKind::MissingIdentifier));
    }

    #[test]
    fn abort_policy_fails_the_work() {
        let config = MergeConfig::default().with_structural_policy(StructuralPolicy::Abort);
        let merger = Merger::new(config).unwrap();
        let err = merger.merge_work("2020ApJ...900..001A", &[duplicated_identifier()]).unwrap_err();
        match err {
            EngineError::WorkAborted { identifier, source } => {
                assert_eq!(identifier, "2020ApJ...900..001A");
                assert!(source.is_structural());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn default_layout_keeps_several_dates_and_co_authors() {
        let merger = Merger::new(MergeConfig::default()).unwrap();
        let mut record = Record::new();
        record.push_field("970", field(&[('a', "2020ApJ...900..001A")]));
        record.push_field("100", field(&[('a', "Accomazzi, Alberto"), ('b', "Accomazzi, A")]));
        record.push_field("260", field(&[('c', "2020-01"), ('t', "print")]));
        record.push_field("260", field(&[('c', "2020-02"), ('t', "electronic")]));
        record.push_field("700", field(&[('a', "Kurtz, Michael"), ('b', "Kurtz, M")]));
        record.push_field("700", field(&[('a', "Luker, Jay"), ('b', "Luker, J")]));

        let outcome = merger.merge_work("2020ApJ...900..001A", &[record.clone()]).unwrap();
        assert!(outcome.is_clean(), "{:?} {:?}", outcome.structural_errors, outcome.violations);
        assert_eq!(outcome.record, record);
    }

    #[test]
    fn merger_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Merger>();
    }
}
