// ============================================================================
// spark-components - Core Module
// Fundamental types, errors, ids and configuration for the component runtime
// ============================================================================

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod types;

// Re-export commonly used items
pub use config::RuntimeConfig;
pub use constants::*;
pub use error::{BoxError, Error, Result};
pub use ids::{IdGenerator, InstanceId, SequentialIds, UlidIds};
pub use types::{changes_to_value, Args, ChangeRecord, Changes, Value, WriteOptions};
