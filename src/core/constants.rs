// ============================================================================
// spark-components - Constants
// Instance status flags, event names and reserved option keys
// ============================================================================

// =============================================================================
// INSTANCE STATUS FLAGS
// =============================================================================

/// Instance is present in its runtime's registry
pub const REGISTERED: u32 = 1 << 0;

/// The `init` operation is running
pub const INITIALIZING: u32 = 1 << 1;

/// The `init` operation has finished (or the type declares none)
pub const INITIALIZED: u32 = 1 << 2;

/// The `dispose` operation has passed its gates and is running
pub const DISPOSING: u32 = 1 << 3;

/// Maps are released; every mutator now fails
pub const DISPOSED: u32 = 1 << 4;

/// The instance's pending changes are being flushed
pub const FLUSHING: u32 = 1 << 5;

/// Mask of the lifecycle phase bits (everything except FLUSHING)
pub const PHASE_MASK: u32 = REGISTERED | INITIALIZING | INITIALIZED | DISPOSING | DISPOSED;

// =============================================================================
// EVENT NAMES
// =============================================================================

/// Emitted once per flush when property changes were pending
pub const PROPERTY_CHANGE: &str = "propertychange";

/// Emitted once per flush when state changes were pending
pub const STATE_CHANGE: &str = "statechange";

/// Prefix of the cancellable event emitted before an operation body runs
pub const BEFORE_PREFIX: &str = "before";

/// Prefix of the event emitted after an operation completes
pub const AFTER_PREFIX: &str = "after";

/// Prefix of option callbacks invoked by `emit` for the matching event kind
pub const HANDLER_PREFIX: &str = "on";

// =============================================================================
// RESERVED OPERATION NAMES
// =============================================================================

/// Operation invoked by `Runtime::create` right after registration
pub const INIT: &str = "init";

/// Operation invoked by `Instance::dispose`
pub const DISPOSE: &str = "dispose";

/// Build the `before<op>` event kind for an operation
pub fn before_event(op: &str) -> String {
    format!("{BEFORE_PREFIX}{}", op.to_lowercase())
}

/// Build the `after<op>` event kind for an operation
pub fn after_event(op: &str) -> String {
    format!("{AFTER_PREFIX}{}", op.to_lowercase())
}

/// Build the option callback name consulted by `emit` for an event kind
pub fn handler_name(kind: &str) -> String {
    format!("{HANDLER_PREFIX}{}", kind.to_lowercase())
}

// =============================================================================
// TESTS
// =============================================================================
