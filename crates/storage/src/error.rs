use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed timestamp line {line} in {path}: expected <identifier>\\t<timestamp>")]
    MalformedTimestampLine { path: String, line: usize },

    #[error("core error: {0}")]
    Core(#[from] bibmerge_core::CoreError),
}
