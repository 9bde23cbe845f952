use bibmerge_core::{CoreError, SkippedTag};
use bibmerge_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("invalid configuration: {0}")]
    Config(#[source] CoreError),

    #[error("tag {tag}: source record {source_index} has {count} instances of a non-repeatable field")]
    DuplicateSingleton {
        tag: String,
        source_index: usize,
        count: usize,
    },

    #[error("no source records for {0}")]
    NoSources(String),

    #[error("failed to fetch source records for {identifier}: {message}")]
    SourceFetch { identifier: String, message: String },

    #[error("merge of {identifier} aborted: {source}")]
    WorkAborted {
        identifier: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// True for errors confined to one tag of one work.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::DuplicateSingleton { .. })
    }

    /// Catalog marker for a structural error: the tag it removed and why.
    pub fn skipped_tag(&self) -> Option<SkippedTag> {
        match self {
            Self::DuplicateSingleton { tag, .. } => Some(SkippedTag::new(tag.as_str(), self.to_string())),
            _ => None,
        }
    }
}
