pub mod config;
pub mod error;
pub mod field;
pub mod ids;
pub mod priority;
pub mod record;
pub mod violation;

pub use config::{FieldRule, MergeConfig, StructuralPolicy};
pub use error::CoreError;
pub use field::{FieldInstance, Subfield};
pub use ids::*;
pub use priority::PriorityTable;
pub use record::Record;
pub use violation::{ConsistencyViolation, Rule, SkippedTag, ViolationKind};
