use bibmerge_core::{FieldInstance, FieldRule, MergeConfig, Record};
use bibmerge_storage::{SqliteCatalog, StorageError};
use tempfile::TempDir;

/// Build a field instance from `(code, value)` pairs.
///
/// Panics on a repeated subfield code; fixtures are expected to be valid.
pub fn field(pairs: &[(char, &str)]) -> FieldInstance {
    FieldInstance::from_pairs(pairs.iter().copied()).expect("fixture field has unique subfield codes")
}

/// Fluent builder for source records.
#[derive(Debug, Default, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instance of `tag`.
    pub fn field(mut self, tag: &str, pairs: &[(char, &str)]) -> Self {
        self.record.push_field(tag, field(pairs));
        self
    }

    /// Append one instance of `tag` carrying `origin` in subfield 7.
    pub fn sourced(self, tag: &str, origin: &str, pairs: &[(char, &str)]) -> Self {
        let mut with_origin = pairs.to_vec();
        with_origin.push(('7', origin));
        self.field(tag, &with_origin)
    }

    pub fn build(self) -> Record {
        self.record
    }
}

/// Source ranking and record layout used throughout the tests: the
/// astrophysics catalog layout with repeatable co-authors and keywords.
pub fn ads_config() -> MergeConfig {
    MergeConfig::default()
        .with_priority_order(["ADS metadata", "A&A", "AAS", "STI", "ARXIV", "NED", "OCR"])
        .expect("fixture priority order is valid")
        .with_field_rule("700", FieldRule::repeatable(['b']))
        .with_field_rule("653", FieldRule::repeatable(['a']))
}

/// An on-disk catalog in a fresh temporary directory. Keep the `TempDir`
/// alive for as long as the catalog is used.
pub fn temp_catalog() -> Result<(TempDir, SqliteCatalog), StorageError> {
    let dir = tempfile::tempdir().map_err(|source| StorageError::Io {
        path: "tempdir".into(),
        source,
    })?;
    let path = dir.path().join("catalog.db");
    let catalog = SqliteCatalog::open(&path.to_string_lossy())?;
    Ok((dir, catalog))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sourced_appends_origin_last() {
        let record = RecordBuilder::new()
            .sourced("300", "A&A", &[('a', "10")])
            .build();
        let codes: String = record.fields("300")[0].codes().collect();
        assert_eq!(codes, "a7");
    }

    #[test]
    fn ads_config_is_valid() {
        assert!(ads_config().validate().is_ok());
    }
}
