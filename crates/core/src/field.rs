use serde::{Deserialize, Serialize};

use crate::CoreError;

/// One coded value inside a field instance, e.g. `$a Di Milia, Giovanni`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subfield {
    pub code: char,
    pub value: String,
}

impl Subfield {
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }
}

/// One occurrence of a tag within a record: an ordered list of subfields,
/// at most one per code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Subfield>", into = "Vec<Subfield>")]
pub struct FieldInstance {
    subfields: Vec<Subfield>,
}

impl FieldInstance {
    pub fn new(subfields: Vec<Subfield>) -> Result<Self, CoreError> {
        for (i, sub) in subfields.iter().enumerate() {
            if subfields[..i].iter().any(|s| s.code == sub.code) {
                return Err(CoreError::DuplicateSubfield { code: sub.code });
            }
        }
        Ok(Self { subfields })
    }

    pub fn from_pairs<I, V>(pairs: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (char, V)>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(code, value)| Subfield::new(code, value))
                .collect(),
        )
    }

    pub fn get(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.value.as_str())
    }

    pub fn contains(&self, code: char) -> bool {
        self.position(code).is_some()
    }

    pub fn position(&self, code: char) -> Option<usize> {
        self.subfields.iter().position(|s| s.code == code)
    }

    /// Replace the value of `code` in place, or append it if absent.
    pub fn set(&mut self, code: char, value: impl Into<String>) {
        let value = value.into();
        match self.subfields.iter_mut().find(|s| s.code == code) {
            Some(sub) => sub.value = value,
            None => self.subfields.push(Subfield { code, value }),
        }
    }

    /// Add a copy of `sub` unless its code is already present. When the last
    /// subfield has code `keep_last` the copy goes in front of it, otherwise
    /// it is appended. Returns whether anything was added.
    pub fn fill(&mut self, sub: &Subfield, keep_last: char) -> bool {
        if self.contains(sub.code) {
            return false;
        }
        let at = match self.subfields.last() {
            Some(last) if last.code == keep_last => self.subfields.len() - 1,
            _ => self.subfields.len(),
        };
        self.subfields.insert(at, sub.clone());
        true
    }

    /// The source code carried in the designated origin subfield.
    pub fn origin(&self, origin_subfield: char) -> Option<&str> {
        self.get(origin_subfield)
    }

    pub fn codes(&self) -> impl Iterator<Item = char> + '_ {
        self.subfields.iter().map(|s| s.code)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subfield> {
        self.subfields.iter()
    }

    pub fn len(&self) -> usize {
        self.subfields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subfields.is_empty()
    }
}

impl TryFrom<Vec<Subfield>> for FieldInstance {
    type Error = CoreError;

    fn try_from(subfields: Vec<Subfield>) -> Result<Self, Self::Error> {
        Self::new(subfields)
    }
}

impl From<FieldInstance> for Vec<Subfield> {
    fn from(field: FieldInstance) -> Self {
        field.subfields
    }
}

impl<'a> IntoIterator for &'a FieldInstance {
    type Item = &'a Subfield;
    type IntoIter = std::slice::Iter<'a, Subfield>;

    fn into_iter(self) -> Self::IntoIter {
        self.subfields.iter()
    }
}
