use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field::FieldInstance;
use crate::ids::Fingerprint;
use crate::CoreError;

/// A bibliographic record: tag → ordered field instances, iterated in
/// ascending tag order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Vec<FieldInstance>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_field(&mut self, tag: impl Into<String>, field: FieldInstance) {
        self.fields.entry(tag.into()).or_default().push(field);
    }

    /// Replace every instance of `tag`. An empty list removes the tag.
    pub fn set_fields(&mut self, tag: impl Into<String>, fields: Vec<FieldInstance>) {
        let tag = tag.into();
        if fields.is_empty() {
            self.fields.remove(&tag);
        } else {
            self.fields.insert(tag, fields);
        }
    }

    /// Instances of `tag`, empty when the tag is absent.
    pub fn fields(&self, tag: &str) -> &[FieldInstance] {
        self.fields.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_tag(&self, tag: &str) -> bool {
        self.fields.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FieldInstance])> {
        self.fields.iter().map(|(t, f)| (t.as_str(), f.as_slice()))
    }

    pub fn tag_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Content hash over the msgpack encoding. Equal records hash equal
    /// because the tag map is ordered.
    pub fn fingerprint(&self) -> Result<Fingerprint, CoreError> {
        let bytes = self.to_msgpack()?;
        Ok(Fingerprint::from_bytes(*blake3::hash(&bytes).as_bytes()))
    }
}
