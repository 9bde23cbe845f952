use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Which post-merge rule produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    /// Publication years agree with the identifier year.
    Temporal,
    /// First author initial agrees with the identifier's last character.
    Authorship,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::Authorship => "authorship",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "temporal" => Ok(Self::Temporal),
            "authorship" => Ok(Self::Authorship),
            _ => Err(CoreError::Serialization(format!("unknown rule: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    MissingIdentifier,
    DuplicateIdentifier,
    MissingPublicationDate,
    YearMismatch,
    NoUsableDate,
    MissingFirstAuthor,
    DuplicateFirstAuthor,
    AuthorBibcodeMismatch,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingIdentifier => "MissingIdentifier",
            Self::DuplicateIdentifier => "DuplicateIdentifier",
            Self::MissingPublicationDate => "MissingPublicationDate",
            Self::YearMismatch => "YearMismatch",
            Self::NoUsableDate => "NoUsableDate",
            Self::MissingFirstAuthor => "MissingFirstAuthor",
            Self::DuplicateFirstAuthor => "DuplicateFirstAuthor",
            Self::AuthorBibcodeMismatch => "AuthorBibcodeMismatch",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "MissingIdentifier" => Ok(Self::MissingIdentifier),
            "DuplicateIdentifier" => Ok(Self::DuplicateIdentifier),
            "MissingPublicationDate" => Ok(Self::MissingPublicationDate),
            "YearMismatch" => Ok(Self::YearMismatch),
            "NoUsableDate" => Ok(Self::NoUsableDate),
            "MissingFirstAuthor" => Ok(Self::MissingFirstAuthor),
            "DuplicateFirstAuthor" => Ok(Self::DuplicateFirstAuthor),
            "AuthorBibcodeMismatch" => Ok(Self::AuthorBibcodeMismatch),
            _ => Err(CoreError::Serialization(format!("unknown violation kind: {s}"))),
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consistency rule failure on a merged record. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyViolation {
    pub rule: Rule,
    pub kind: ViolationKind,
    pub message: String,
}

impl ConsistencyViolation {
    pub fn new(rule: Rule, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            rule,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.rule.as_str(), self.kind, self.message)
    }
}

/// A tag left out of a merged record because it could not be merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTag {
    pub tag: String,
    pub reason: String,
}

impl SkippedTag {
    pub fn new(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SkippedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag {} skipped: {}", self.tag, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_parse_back() {
        for kind in [
            ViolationKind::MissingIdentifier,
            ViolationKind::YearMismatch,
            ViolationKind::AuthorBibcodeMismatch,
        ] {
            assert_eq!(ViolationKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(ViolationKind::parse("Bogus").is_err());
        assert_eq!(Rule::parse("authorship").unwrap(), Rule::Authorship);
    }

    #[test]
    fn display_names_rule_and_kind() {
        let v = ConsistencyViolation::new(Rule::Temporal, ViolationKind::NoUsableDate, "no dates");
        assert_eq!(v.to_string(), "[temporal] NoUsableDate: no dates");
    }
}
