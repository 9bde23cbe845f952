//! Merge configuration.
//!
//! Everything the merger needs to know about the record layout and the
//! ranking of sources lives here and is threaded explicitly into the
//! merger. Parsed from TOML; every section is optional and falls back to
//! the astrophysics catalog layout (bibcode in `970$a`, first author in
//! `100$a`, typed publication dates in `260`).

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::priority::PriorityTable;
use crate::CoreError;

/// Top-level merge configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Source codes, most trusted first.
    #[serde(default)]
    pub priority_order: PriorityTable,

    /// Subfield carrying the source code of each field instance.
    #[serde(default = "default_origin_subfield")]
    pub origin_subfield: char,

    /// What to do with a work when a tag cannot be merged.
    #[serde(default)]
    pub on_structural_error: StructuralPolicy,

    #[serde(default)]
    pub identifier: IdentifierConfig,

    #[serde(default)]
    pub author: AuthorConfig,

    #[serde(default)]
    pub date: DateConfig,

    /// Per-tag matching rules. Tags not listed are non-repeatable. Entries
    /// given in TOML are laid over [`default_fields`].
    #[serde(default = "default_fields", deserialize_with = "fields_over_defaults")]
    pub fields: BTreeMap<String, FieldRule>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            priority_order: PriorityTable::default(),
            origin_subfield: default_origin_subfield(),
            on_structural_error: StructuralPolicy::default(),
            identifier: IdentifierConfig::default(),
            author: AuthorConfig::default(),
            date: DateConfig::default(),
            fields: default_fields(),
        }
    }
}

fn default_origin_subfield() -> char {
    '7'
}

/// Typed publication dates (one `260` per date type) and co-authors (one
/// `700` per author, matched on the short name) are repeatable.
pub fn default_fields() -> BTreeMap<String, FieldRule> {
    BTreeMap::from([
        (default_date_tag(), FieldRule::repeatable([default_date_type_subfield()])),
        ("700".to_owned(), FieldRule::repeatable(['b'])),
    ])
}

fn fields_over_defaults<'de, D>(deserializer: D) -> Result<BTreeMap<String, FieldRule>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut fields = default_fields();
    fields.extend(BTreeMap::<String, FieldRule>::deserialize(deserializer)?);
    Ok(fields)
}

/// Policy for structural errors (a tag skipped during assembly).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructuralPolicy {
    /// Abandon the whole work.
    Abort,
    /// Keep the partial record and report the skipped tags.
    #[default]
    Degrade,
}

/// Where the canonical work identifier (bibcode) lives.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentifierConfig {
    #[serde(default = "default_identifier_tag")]
    pub tag: String,
    #[serde(default = "default_value_subfield")]
    pub subfield: char,
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self {
            tag: default_identifier_tag(),
            subfield: default_value_subfield(),
        }
    }
}

fn default_identifier_tag() -> String {
    "970".to_owned()
}

fn default_value_subfield() -> char {
    'a'
}

/// Where the primary author's name lives.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorConfig {
    #[serde(default = "default_author_tag")]
    pub tag: String,
    #[serde(default = "default_value_subfield")]
    pub name_subfield: char,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            tag: default_author_tag(),
            name_subfield: default_value_subfield(),
        }
    }
}

fn default_author_tag() -> String {
    "100".to_owned()
}

/// Where publication dates live and how their type is encoded.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateConfig {
    #[serde(default = "default_date_tag")]
    pub tag: String,
    #[serde(default = "default_date_value_subfield")]
    pub value_subfield: char,
    #[serde(default = "default_date_type_subfield")]
    pub type_subfield: char,
    /// Date types checked against the identifier year, in report order.
    #[serde(default = "default_date_types")]
    pub type_values: Vec<String>,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self {
            tag: default_date_tag(),
            value_subfield: default_date_value_subfield(),
            type_subfield: default_date_type_subfield(),
            type_values: default_date_types(),
        }
    }
}

fn default_date_tag() -> String {
    "260".to_owned()
}

fn default_date_value_subfield() -> char {
    'c'
}

fn default_date_type_subfield() -> char {
    't'
}

fn default_date_types() -> Vec<String> {
    vec!["print".to_owned(), "electronic".to_owned(), "preprint".to_owned()]
}

/// How instances of one tag are matched across source records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldRule {
    /// One logical field per entry (e.g. one per contributor) instead of one
    /// per record.
    #[serde(default)]
    pub repeatable: bool,

    /// Subfields whose values identify the same logical entry across sources.
    #[serde(default)]
    pub identity_key_subfields: Vec<char>,
}

impl FieldRule {
    pub fn repeatable(identity_key_subfields: impl IntoIterator<Item = char>) -> Self {
        Self {
            repeatable: true,
            identity_key_subfields: identity_key_subfields.into_iter().collect(),
        }
    }
}

static SINGLE: FieldRule = FieldRule {
    repeatable: false,
    identity_key_subfields: Vec::new(),
};

impl MergeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, CoreError> {
        let config: Self = toml::from_str(s).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Matching rule for `tag`; unlisted tags are non-repeatable.
    pub fn rule(&self, tag: &str) -> &FieldRule {
        self.fields.get(tag).unwrap_or(&SINGLE)
    }

    pub fn with_priority_order<I, S>(mut self, codes: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority_order = PriorityTable::new(codes.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    pub fn with_field_rule(mut self, tag: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(tag.into(), rule);
        self
    }

    pub fn with_structural_policy(mut self, policy: StructuralPolicy) -> Self {
        self.on_structural_error = policy;
        self
    }

    /// Check cross-option consistency. Run once before any work is merged.
    pub fn validate(&self) -> Result<(), CoreError> {
        for tag in [&self.identifier.tag, &self.author.tag, &self.date.tag] {
            check_tag(tag)?;
        }

        for (tag, rule) in &self.fields {
            check_tag(tag)?;
            if rule.repeatable && rule.identity_key_subfields.is_empty() {
                return Err(CoreError::InvalidConfig(format!(
                    "repeatable tag {tag} needs at least one identity key subfield"
                )));
            }
            if !rule.repeatable && !rule.identity_key_subfields.is_empty() {
                return Err(CoreError::InvalidConfig(format!(
                    "identity key subfields on non-repeatable tag {tag} would never be used"
                )));
            }
            let mut seen = HashSet::new();
            if let Some(code) = rule.identity_key_subfields.iter().find(|c| !seen.insert(**c)) {
                return Err(CoreError::InvalidConfig(format!(
                    "identity key subfield ${code} listed twice for tag {tag}"
                )));
            }
        }

        for (what, tag) in [("identifier", &self.identifier.tag), ("author", &self.author.tag)] {
            if self.rule(tag).repeatable {
                return Err(CoreError::InvalidConfig(format!(
                    "{what} tag {tag} must not be repeatable"
                )));
            }
        }

        let mut seen = HashSet::new();
        for value in &self.date.type_values {
            if value.is_empty() {
                return Err(CoreError::InvalidConfig("empty publication date type".into()));
            }
            if !seen.insert(value.as_str()) {
                return Err(CoreError::InvalidConfig(format!(
                    "publication date type {value:?} listed twice"
                )));
            }
        }

        Ok(())
    }
}

fn check_tag(tag: &str) -> Result<(), CoreError> {
    if tag.trim().is_empty() {
        return Err(CoreError::InvalidConfig("empty tag".into()));
    }
    Ok(())
}
