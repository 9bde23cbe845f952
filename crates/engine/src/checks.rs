//! Post-merge consistency rules.
//!
//! Both rules read the merged record and report problems as
//! [`ConsistencyViolation`]s; neither ever modifies the record or fails the
//! merge. The identifier is a fixed-format bibcode whose first four
//! characters are the publication year and whose last character is the
//! initial of the first author's surname.

use bibmerge_core::{ConsistencyViolation, FieldInstance, MergeConfig, Record, Rule, ViolationKind};

pub struct Checker<'c> {
    config: &'c MergeConfig,
}

/// First `n` characters of `s`.
fn leading(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

impl<'c> Checker<'c> {
    pub fn new(config: &'c MergeConfig) -> Self {
        Self { config }
    }

    /// Run every rule. Temporal violations come first, then authorship.
    pub fn check(&self, record: &Record) -> Vec<ConsistencyViolation> {
        let mut violations = self.check_temporal(record);
        violations.extend(self.check_authorship(record));
        violations
    }

    /// The year of each configured publication date type must match the
    /// identifier's year.
    pub fn check_temporal(&self, record: &Record) -> Vec<ConsistencyViolation> {
        let rule = Rule::Temporal;
        let id_cfg = &self.config.identifier;
        let date_cfg = &self.config.date;
        let mut out = Vec::new();

        let identifiers = record.fields(&id_cfg.tag);
        if identifiers.is_empty() {
            out.push(missing_identifier(rule, &id_cfg.tag));
            return out;
        }
        let dates = record.fields(&date_cfg.tag);
        if dates.is_empty() {
            out.push(ConsistencyViolation::new(
                rule,
                ViolationKind::MissingPublicationDate,
                format!("no publication date field (tag {})", date_cfg.tag),
            ));
            return out;
        }
        let identifier = match self.single_identifier(rule, identifiers) {
            Ok(identifier) => identifier,
            Err(violation) => {
                out.push(violation);
                return out;
            }
        };

        let identifier_year = leading(identifier, 4);
        let mut usable = 0usize;
        for date_type in &date_cfg.type_values {
            let pubdate = dates
                .iter()
                .find(|f| f.get(date_cfg.type_subfield) == Some(date_type.as_str()))
                .and_then(|f| f.get(date_cfg.value_subfield))
                .unwrap_or_default();
            if pubdate.is_empty() {
                continue;
            }
            usable += 1;

            let date_year = leading(pubdate, 4);
            if date_year != identifier_year {
                out.push(ConsistencyViolation::new(
                    rule,
                    ViolationKind::YearMismatch,
                    format!(
                        "year of {date_type:?} date ({date_year}) not consistent with identifier {identifier:?} ({identifier_year})"
                    ),
                ));
            }
        }

        if usable == 0 {
            out.push(ConsistencyViolation::new(
                rule,
                ViolationKind::NoUsableDate,
                "no publication date available for this record",
            ));
        }
        out
    }

    /// The identifier's last character must equal the first character of the
    /// first author's name.
    pub fn check_authorship(&self, record: &Record) -> Vec<ConsistencyViolation> {
        let rule = Rule::Authorship;
        let id_cfg = &self.config.identifier;
        let author_cfg = &self.config.author;
        let mut out = Vec::new();

        let identifiers = record.fields(&id_cfg.tag);
        if identifiers.is_empty() {
            out.push(missing_identifier(rule, &id_cfg.tag));
            return out;
        }
        let authors = record.fields(&author_cfg.tag);
        if authors.is_empty() {
            out.push(missing_author(&author_cfg.tag));
            return out;
        }
        let identifier = match self.single_identifier(rule, identifiers) {
            Ok(identifier) => identifier,
            Err(violation) => {
                out.push(violation);
                return out;
            }
        };
        if authors.len() > 1 {
            out.push(ConsistencyViolation::new(
                rule,
                ViolationKind::DuplicateFirstAuthor,
                format!("{} first author fields (tag {}), expected one", authors.len(), author_cfg.tag),
            ));
            return out;
        }

        let name = authors[0].get(author_cfg.name_subfield).unwrap_or_default();
        let (Some(initial), Some(last)) = (name.chars().next(), identifier.chars().last()) else {
            out.push(missing_author(&author_cfg.tag));
            return out;
        };
        if initial != last {
            out.push(ConsistencyViolation::new(
                rule,
                ViolationKind::AuthorBibcodeMismatch,
                format!("first author {name:?} not consistent with identifier {identifier:?}"),
            ));
        }
        out
    }

    /// The value of the only identifier instance, or the violation that
    /// prevents reading it.
    fn single_identifier<'r>(
        &self,
        rule: Rule,
        identifiers: &'r [FieldInstance],
    ) -> Result<&'r str, ConsistencyViolation> {
        let id_cfg = &self.config.identifier;
        if identifiers.len() > 1 {
            return Err(ConsistencyViolation::new(
                rule,
                ViolationKind::DuplicateIdentifier,
                format!("{} identifier fields (tag {}), expected one", identifiers.len(), id_cfg.tag),
            ));
        }
        match identifiers[0].get(id_cfg.subfield) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(missing_identifier(rule, &id_cfg.tag)),
        }
    }
}

fn missing_identifier(rule: Rule, tag: &str) -> ConsistencyViolation {
    ConsistencyViolation::new(
        rule,
        ViolationKind::MissingIdentifier,
        format!("no identifier field (tag {tag})"),
    )
}

fn missing_author(tag: &str) -> ConsistencyViolation {
    ConsistencyViolation::new(
        Rule::Authorship,
        ViolationKind::MissingFirstAuthor,
        format!("no first author field (tag {tag})"),
    )
}
