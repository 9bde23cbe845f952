pub mod diff;
pub mod error;
pub mod schema;
pub mod sqlite;
pub mod timestamps;
pub mod traits;

pub use diff::{RecordStatus, diff_timestamps};
pub use error::StorageError;
pub use sqlite::SqliteCatalog;
pub use timestamps::{load_harvest_timestamps, read_published_eprints, read_timestamp_file};
pub use traits::*;
