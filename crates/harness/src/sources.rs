use std::collections::HashMap;

use bibmerge_core::Record;
use bibmerge_engine::{EngineError, SourceProvider};

/// In-memory source provider keyed by identifier.
#[derive(Debug, Default, Clone)]
pub struct MemorySources {
    works: HashMap<String, Vec<Record>>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, identifier: &str, sources: Vec<Record>) {
        self.works.insert(identifier.to_string(), sources);
    }

    pub fn remove(&mut self, identifier: &str) -> Option<Vec<Record>> {
        self.works.remove(identifier)
    }
}

impl SourceProvider for MemorySources {
    fn fetch(&self, identifier: &str) -> Result<Vec<Record>, EngineError> {
        self.works
            .get(identifier)
            .cloned()
            .ok_or_else(|| EngineError::SourceFetch {
                identifier: identifier.to_string(),
                message: "no source records harvested".into(),
            })
    }
}
