// ============================================================================
// spark-components - Component Module
// Component types, instances, options and intercepted operations
// ============================================================================

pub mod descriptor;
pub mod instance;
pub(crate) mod interceptor;
pub mod operation;
pub mod options;

pub use descriptor::{ComponentType, ComponentTypeBuilder, Validator};
pub use instance::{Instance, WeakInstance};
pub use operation::{Body, Completion, Gate, Hook, Invocation, Operation};
pub use options::{Callback, Options, Updater, UpdaterTable};
