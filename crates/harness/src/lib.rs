pub mod fixtures;
pub mod sources;

pub use fixtures::{RecordBuilder, ads_config, field, temp_catalog};
pub use sources::MemorySources;
