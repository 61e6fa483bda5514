// ============================================================================
// spark-components - Component Lifecycle and Reactive State
// ============================================================================
//
// Property/state stores with validation and batched change notification,
// cancellable before/after interception around component operations, and an
// injectable runtime that owns the registry and the flush tick.
// ============================================================================

#[macro_use]
mod macros;

pub mod collections;
pub mod component;
pub mod core;
pub mod events;
pub mod reactivity;
pub mod runtime;

// Re-export core items at crate root
pub use core::constants;
pub use core::config::RuntimeConfig;
pub use core::error::{BoxError, Error, Result};
pub use core::ids::{IdGenerator, InstanceId, SequentialIds, UlidIds};
pub use core::types::{changes_to_value, Args, ChangeRecord, Changes, Value, WriteOptions};

// Re-export the component surface
pub use component::{
    Body, Callback, Completion, ComponentType, ComponentTypeBuilder, Gate, Hook, Instance,
    Invocation, Operation, Options, Updater, UpdaterTable, Validator, WeakInstance,
};

// Re-export events
pub use events::{BusFactory, Event, EventBus, Listener, ListenerId, LocalBus};

// Re-export stores and scheduling
pub use collections::{ChangeStore, WriteResult};
pub use reactivity::{FlushReport, TaskReport, Timer};
pub use runtime::{Registry, Runtime, RuntimeBuilder};

// =============================================================================
// TESTS
// =============================================================================
