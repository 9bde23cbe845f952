//! Field matching and priority resolution.
//!
//! Instances of one tag, drawn from every source record of a work, are
//! grouped into [`FieldGroup`]s of equivalent fields. Each group yields one
//! merged instance: the most trusted member is copied verbatim and the other
//! members fill in subfield codes it lacks.

use std::collections::HashMap;

use bibmerge_core::{FieldInstance, FieldRule, MergeConfig};
use tracing::debug;

use crate::error::EngineError;

/// A field instance together with the index of the source record it came
/// from.
#[derive(Debug, Clone, Copy)]
pub struct SourcedField<'a> {
    pub source: usize,
    pub field: &'a FieldInstance,
}

impl<'a> SourcedField<'a> {
    pub fn new(source: usize, field: &'a FieldInstance) -> Self {
        Self { source, field }
    }
}

/// Derives the identity key that decides whether instances of a repeatable
/// tag describe the same logical entry.
pub trait IdentityKey: Send + Sync {
    fn key(&self, field: &FieldInstance, subfields: &[char]) -> Vec<String>;
}

/// Exact subfield equality: the key is the tuple of values at the key
/// subfields, with an empty string for a missing subfield.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactKey;

impl IdentityKey for ExactKey {
    fn key(&self, field: &FieldInstance, subfields: &[char]) -> Vec<String> {
        subfields
            .iter()
            .map(|code| field.get(*code).unwrap_or_default().to_string())
            .collect()
    }
}

/// Equivalent instances of one tag. Members are ordered by descending
/// priority once the group is built; the first is the winner.
#[derive(Debug, Clone)]
pub struct FieldGroup<'a> {
    members: Vec<SourcedField<'a>>,
}

impl<'a> FieldGroup<'a> {
    fn ranked(mut members: Vec<SourcedField<'a>>, config: &MergeConfig) -> Self {
        // stable: equal ranks keep source order
        members.sort_by_key(|m| {
            config
                .priority_order
                .rank_of(m.field.origin(config.origin_subfield))
        });
        Self { members }
    }

    pub fn winner(&self) -> &SourcedField<'a> {
        &self.members[0]
    }

    pub fn donors(&self) -> &[SourcedField<'a>] {
        &self.members[1..]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Winner's subfields verbatim, then every code the winner lacks, taken
    /// from the most trusted donor that has it. When the winner ends with
    /// its origin subfield, donated subfields go in front of it so the
    /// origin stays last.
    pub fn merge(&self, origin_subfield: char) -> FieldInstance {
        let mut merged = self.winner().field.clone();
        for donor in self.donors() {
            for sub in donor.field {
                merged.fill(sub, origin_subfield);
            }
        }
        merged
    }
}

pub struct Resolver<'c> {
    config: &'c MergeConfig,
    key: &'c dyn IdentityKey,
}

impl<'c> Resolver<'c> {
    pub fn new(config: &'c MergeConfig, key: &'c dyn IdentityKey) -> Self {
        Self { config, key }
    }

    /// Partition `instances` (in source-record order) into field groups.
    pub fn group<'a>(
        &self,
        tag: &str,
        instances: &[SourcedField<'a>],
        rule: &FieldRule,
    ) -> Result<Vec<FieldGroup<'a>>, EngineError> {
        if instances.is_empty() {
            return Ok(Vec::new());
        }

        if !rule.repeatable {
            check_single_per_source(tag, instances)?;
            return Ok(vec![FieldGroup::ranked(instances.to_vec(), self.config)]);
        }

        // The n-th occurrence of a key within one source matches the n-th
        // occurrence of the same key in the others.
        let mut occurrences: HashMap<(usize, Vec<String>), usize> = HashMap::new();
        let mut slots: HashMap<(Vec<String>, usize), usize> = HashMap::new();
        let mut buckets: Vec<Vec<SourcedField<'a>>> = Vec::new();

        for instance in instances {
            let key = self.key.key(instance.field, &rule.identity_key_subfields);
            let seen = occurrences.entry((instance.source, key.clone())).or_insert(0);
            let nth = *seen;
            *seen += 1;

            let slot = *slots.entry((key, nth)).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[slot].push(*instance);
        }

        Ok(buckets
            .into_iter()
            .map(|members| FieldGroup::ranked(members, self.config))
            .collect())
    }

    /// Merged instances for `tag`, one per field group, in first-seen order.
    pub fn resolve(
        &self,
        tag: &str,
        instances: &[SourcedField<'_>],
        rule: &FieldRule,
    ) -> Result<Vec<FieldInstance>, EngineError> {
        let groups = self.group(tag, instances, rule)?;
        let merged: Vec<FieldInstance> = groups
            .iter()
            .map(|g| g.merge(self.config.origin_subfield))
            .collect();
        debug!(
            tag,
            instances = instances.len(),
            groups = groups.len(),
            "resolved tag"
        );
        Ok(merged)
    }
}

fn check_single_per_source(tag: &str, instances: &[SourcedField<'_>]) -> Result<(), EngineError> {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for instance in instances {
        match counts.iter_mut().find(|(source, _)| *source == instance.source) {
            Some((_, count)) => *count += 1,
            None => counts.push((instance.source, 1)),
        }
    }
    match counts.into_iter().find(|(_, count)| *count > 1) {
        Some((source_index, count)) => Err(EngineError::DuplicateSingleton {
            tag: tag.to_string(),
            source_index,
            count,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(pairs: &[(char, &str)]) -> FieldInstance {
        FieldInstance::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn config() -> MergeConfig {
        MergeConfig::default()
            .with_priority_order(["ADS metadata", "A&A", "ARXIV", "NED"])
            .unwrap()
    }

    fn codes(f: &FieldInstance) -> String {
        f.codes().collect()
    }

    #[test]
    fn higher_priority_source_wins() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let ned = field(&[('a', "15"), ('7', "NED")]);
        let aa = field(&[('a', "10"), ('7', "A&A")]);
        let instances = [SourcedField::new(0, &ned), SourcedField::new(1, &aa)];

        let merged = resolver.resolve("300", &instances, &FieldRule::default()).unwrap();
        assert_eq!(merged, vec![aa.clone()]);
    }

    #[test]
    fn equal_priority_keeps_first_source() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let first = field(&[('a', "first"), ('7', "OCR")]);
        let second = field(&[('a', "second"), ('7', "STI")]);
        let instances = [SourcedField::new(0, &first), SourcedField::new(1, &second)];

        let groups = resolver.group("773", &instances, &FieldRule::default()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].winner().source, 0);
        assert_eq!(groups[0].donors().len(), 1);
    }

    #[test]
    fn donors_fill_gaps_before_origin() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let aa = field(&[('a', "Di Milia, Giovanni"), ('b', "Di Milia, G"), ('7', "A&A")]);
        let arxiv = field(&[
            ('a', "Di Milia, Giancarlo"),
            ('b', "Di Milia, G"),
            ('u', "Center for astrophysics"),
            ('7', "ARXIV"),
        ]);
        let instances = [SourcedField::new(0, &aa), SourcedField::new(1, &arxiv)];

        let merged = resolver.resolve("100", &instances, &FieldRule::default()).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(codes(&merged[0]), "abu7");
        assert_eq!(merged[0].get('a'), Some("Di Milia, Giovanni"));
        assert_eq!(merged[0].get('u'), Some("Center for astrophysics"));
        assert_eq!(merged[0].get('7'), Some("A&A"));
    }

    #[test]
    fn higher_ranked_donor_fills_first() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let aa = field(&[('a', "x"), ('7', "A&A")]);
        let ned = field(&[('u', "from NED"), ('7', "NED")]);
        let arxiv = field(&[('u', "from ARXIV"), ('7', "ARXIV")]);
        let instances = [
            SourcedField::new(0, &aa),
            SourcedField::new(1, &ned),
            SourcedField::new(2, &arxiv),
        ];

        let merged = resolver.resolve("100", &instances, &FieldRule::default()).unwrap();
        assert_eq!(merged[0].get('u'), Some("from ARXIV"));
    }

    #[test]
    fn winner_without_origin_appends_donations() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let bare = field(&[('a', "x")]);
        let other = field(&[('a', "y"), ('u', "aff")]);
        let instances = [SourcedField::new(0, &bare), SourcedField::new(1, &other)];

        let merged = resolver.resolve("100", &instances, &FieldRule::default()).unwrap();
        assert_eq!(codes(&merged[0]), "au");
        assert_eq!(merged[0].get('a'), Some("x"));
    }

    #[test]
    fn repeatable_groups_by_identity_key_in_first_seen_order() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let rule = FieldRule::repeatable(['b']);
        let luker_aa = field(&[('a', "Luker, Jay"), ('b', "Luker, J"), ('7', "A&A")]);
        let henneken_aa = field(&[('a', "Henneken, Edwin"), ('b', "Henneken, E"), ('7', "A&A")]);
        let henneken_ned = field(&[('a', "Henneken, E."), ('b', "Henneken, E"), ('u', "CfA"), ('7', "NED")]);
        let accomazzi_ned = field(&[('a', "Accomazzi, Alberto"), ('b', "Accomazzi, A"), ('7', "NED")]);
        let instances = [
            SourcedField::new(0, &luker_aa),
            SourcedField::new(0, &henneken_aa),
            SourcedField::new(1, &henneken_ned),
            SourcedField::new(1, &accomazzi_ned),
        ];

        let merged = resolver.resolve("700", &instances, &rule).unwrap();
        let names: Vec<&str> = merged.iter().filter_map(|f| f.get('a')).collect();
        assert_eq!(names, vec!["Luker, Jay", "Henneken, Edwin", "Accomazzi, Alberto"]);
        assert_eq!(merged[1].get('u'), Some("CfA"));
        assert_eq!(merged[2], accomazzi_ned);
    }

    #[test]
    fn duplicate_keys_within_a_source_stay_separate() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let rule = FieldRule::repeatable(['b']);
        let first = field(&[('a', "Smith, John"), ('b', "Smith, J"), ('7', "A&A")]);
        let second = field(&[('a', "Smith, Jane"), ('b', "Smith, J"), ('7', "A&A")]);
        let other_first = field(&[('b', "Smith, J"), ('u', "MIT"), ('7', "NED")]);
        let instances = [
            SourcedField::new(0, &first),
            SourcedField::new(0, &second),
            SourcedField::new(1, &other_first),
        ];

        let groups = resolver.group("700", &instances, &rule).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
        assert_eq!(groups[0].merge('7').get('u'), Some("MIT"));
    }

    #[test]
    fn missing_key_subfield_matches_empty_key() {
        let key = ExactKey.key(&field(&[('a', "x")]), &['b', 'a']);
        assert_eq!(key, vec!["".to_string(), "x".to_string()]);
    }

    #[test]
    fn non_repeatable_tag_twice_in_one_source_is_structural() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let a = field(&[('a', "2020ApJ...900..001A")]);
        let b = field(&[('a', "2020ApJ...900..002A")]);
        let instances = [SourcedField::new(0, &a), SourcedField::new(1, &a), SourcedField::new(1, &b)];

        let err = resolver.resolve("970", &instances, &FieldRule::default()).unwrap_err();
        assert!(err.is_structural());
        assert!(matches!(
            err,
            EngineError::DuplicateSingleton { source_index: 1, count: 2, .. }
        ));
    }

    #[test]
    fn leading_origin_keeps_winner_subfields_first() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        let aa = field(&[('7', "A&A"), ('a', "10")]);
        let ned = field(&[('a', "15"), ('b', "ill."), ('7', "NED")]);
        let instances = [SourcedField::new(0, &ned), SourcedField::new(1, &aa)];

        let merged = resolver.resolve("300", &instances, &FieldRule::default()).unwrap();
        assert_eq!(codes(&merged[0]), "7ab");
        assert_eq!(merged[0].get('a'), Some("10"));
        assert_eq!(merged[0].get('b'), Some("ill."));
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let config = config();
        let resolver = Resolver::new(&config, &ExactKey);
        assert!(resolver.resolve("300", &[], &FieldRule::default()).unwrap().is_empty());
    }
}
