use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

/// Work list derived from comparing harvest and catalog timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStatus {
    /// Harvested but not yet in the catalog.
    pub added: BTreeSet<String>,
    /// On both sides with differing timestamps.
    pub modified: BTreeSet<String>,
    /// In the catalog but no longer harvested.
    pub deleted: BTreeSet<String>,
}

impl RecordStatus {
    /// Identifiers that need a (re)merge: added then modified.
    pub fn to_merge(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(self.modified.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Compare identifier → timestamp mappings of the harvesting side and the
/// target catalog.
pub fn diff_timestamps(
    harvest: &BTreeMap<String, String>,
    catalog: &BTreeMap<String, String>,
) -> RecordStatus {
    let mut status = RecordStatus::default();

    for (identifier, timestamp) in harvest {
        match catalog.get(identifier) {
            None => {
                status.added.insert(identifier.clone());
            }
            Some(stored) if stored != timestamp => {
                status.modified.insert(identifier.clone());
            }
            Some(_) => {}
        }
    }

    for identifier in catalog.keys() {
        if !harvest.contains_key(identifier) {
            status.deleted.insert(identifier.clone());
        }
    }

    info!(
        added = status.added.len(),
        modified = status.modified.len(),
        deleted = status.deleted.len(),
        "computed record status"
    );
    status
}
