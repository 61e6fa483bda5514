// ============================================================================
// spark-components - Event
// A dispatched event with cancellation flags
// ============================================================================

use std::cell::Cell;

use serde_json::{json, Value};

use crate::core::ids::InstanceId;

/// An event travelling through an [`EventBus`](super::EventBus).
///
/// Listeners receive `&Event`; the cancellation flags are interior-mutable
/// so any listener can veto the default action.
///
/// # Example
///
/// ```
/// use spark_components::Event;
///
/// let event = Event::new("BeforeOpen");
/// assert_eq!(event.kind(), "beforeopen");
///
/// event.prevent_default();
/// assert!(event.is_default_prevented());
/// assert!(!event.is_propagation_stopped());
/// ```
#[derive(Debug, Clone)]
pub struct Event {
    kind: String,
    origin: Option<InstanceId>,
    data: Value,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
}

impl Event {
    /// Create an event. The kind is lowercased.
    pub fn new(kind: impl AsRef<str>) -> Self {
        Self {
            kind: kind.as_ref().to_lowercase(),
            origin: None,
            data: Value::Null,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_origin(mut self, origin: InstanceId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Instance the event was emitted from (the context instance when a
    /// delegate is configured).
    pub fn origin(&self) -> Option<InstanceId> {
        self.origin
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    // =========================================================================
    // CANCELLATION
    // =========================================================================

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    /// Stop the event from reaching the `on<kind>` option callback.
    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    /// Like `stop_propagation`, and also skip the remaining bus listeners.
    pub fn stop_immediate_propagation(&self) {
        self.immediate_propagation_stopped.set(true);
        self.stop_propagation();
    }

    pub fn is_immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }

    /// JSON view handed to option callbacks as their first argument.
    pub fn to_value(&self) -> Value {
        json!({
            "type": self.kind,
            "origin": self.origin,
            "data": self.data,
            "defaultPrevented": self.is_default_prevented(),
        })
    }
}
