// ============================================================================
// spark-components - Collections
// Keyed stores backing instance properties and states
// ============================================================================

pub mod change_store;

pub use change_store::{ChangeStore, WriteResult};
