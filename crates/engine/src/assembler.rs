use std::collections::BTreeSet;

use bibmerge_core::{MergeConfig, Record};
use tracing::warn;

use crate::error::EngineError;
use crate::resolver::{IdentityKey, Resolver, SourcedField};

/// Result of assembling one work: the merged record and the tags that had
/// to be left out.
#[derive(Debug)]
pub struct Assembly {
    pub record: Record,
    pub skipped: Vec<EngineError>,
}

impl Assembly {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct Assembler<'c> {
    config: &'c MergeConfig,
    resolver: Resolver<'c>,
}

impl<'c> Assembler<'c> {
    pub fn new(config: &'c MergeConfig, key: &'c dyn IdentityKey) -> Self {
        Self {
            config,
            resolver: Resolver::new(config, key),
        }
    }

    /// Merge the source records of one work, tag by tag in ascending order.
    /// A tag that fails to resolve is omitted and reported in `skipped`;
    /// the remaining tags are still merged.
    pub fn assemble(&self, sources: &[Record]) -> Assembly {
        let tags: BTreeSet<&str> = sources.iter().flat_map(Record::tags).collect();

        let mut record = Record::new();
        let mut skipped = Vec::new();

        for tag in tags {
            let instances: Vec<SourcedField<'_>> = sources
                .iter()
                .enumerate()
                .flat_map(|(source, r)| r.fields(tag).iter().map(move |f| SourcedField::new(source, f)))
                .collect();

            match self.resolver.resolve(tag, &instances, self.config.rule(tag)) {
                Ok(fields) => record.set_fields(tag, fields),
                Err(e) => {
                    warn!(tag, error = %e, "skipping tag");
                    skipped.push(e);
                }
            }
        }

        Assembly { record, skipped }
    }
}
