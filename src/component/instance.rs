// ============================================================================
// spark-components - Instance
// The handle a widget owns: properties, states, inners, events, operations
// ============================================================================
//
// Writes are synchronous and only record changes; notification happens when
// the runtime flushes. Events and operations go through the instance's bus
// (or its context delegate's bus).
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use super::descriptor::ComponentType;
use super::interceptor::{self, Phases};
use super::operation::{Invocation, Operation};
use super::options::{Callback, Options};
use crate::collections::{ChangeStore, WriteResult};
use crate::core::constants::*;
use crate::core::error::{Error, Result};
use crate::core::ids::InstanceId;
use crate::core::types::{Args, Changes, WriteOptions};
use crate::events::{Event, EventBus, ListenerId};
use crate::reactivity::equality::value_equals;
use crate::runtime::{Runtime, RuntimeInner};

// =============================================================================
// INSTANCE INNER
// =============================================================================

pub(crate) struct InstanceInner {
    id: InstanceId,
    component: ComponentType,
    options: Options,
    runtime: Weak<RuntimeInner>,
    flags: Cell<u32>,
    properties: RefCell<ChangeStore<Value>>,
    states: RefCell<ChangeStore<bool>>,
    inners: RefCell<IndexMap<String, Value>>,
    bus: Box<dyn EventBus>,
}

// =============================================================================
// INSTANCE
// =============================================================================

/// Shared handle to a live component instance.
///
/// Created by [`Runtime::create`]. Clones point at the same instance.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use spark_components::{ComponentType, Options, Runtime};
///
/// let runtime = Runtime::new();
/// let slider = ComponentType::builder("slider").build().unwrap();
/// let instance = runtime.create(&slider, Options::new()).unwrap();
///
/// instance.set("value", 1).unwrap();
/// instance.state("dragging", true).unwrap();
/// assert_eq!(instance.get("value"), Some(json!(1)));
/// assert!(instance.is("dragging"));
///
/// // Nothing is notified until the runtime flushes
/// assert!(instance.has_pending_changes());
/// runtime.flush();
/// assert!(!instance.has_pending_changes());
/// ```
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

/// Non-owning instance handle.
#[derive(Clone)]
pub struct WeakInstance {
    inner: Weak<InstanceInner>,
}

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade().map(|inner| Instance { inner })
    }
}

impl Instance {
    pub(crate) fn new(
        id: InstanceId,
        component: ComponentType,
        options: Options,
        runtime: Weak<RuntimeInner>,
        bus: Box<dyn EventBus>,
    ) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                id,
                component,
                options,
                runtime,
                flags: Cell::new(0),
                properties: RefCell::new(ChangeStore::with_equals(value_equals)),
                states: RefCell::new(ChangeStore::new()),
                inners: RefCell::new(IndexMap::new()),
                bus,
            }),
        }
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// Event namespace unique to this instance (`.<id>`), for hosts that
    /// bind external listeners on its behalf.
    pub fn namespace(&self) -> String {
        format!(".{}", self.inner.id)
    }

    pub fn component(&self) -> &ComponentType {
        &self.inner.component
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The runtime this instance was created by, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade().map(Runtime::from_inner)
    }

    // =========================================================================
    // LIFECYCLE FLAGS
    // =========================================================================

    pub fn flags(&self) -> u32 {
        self.inner.flags.get()
    }

    pub(crate) fn set_flag(&self, flag: u32) {
        self.inner.flags.set(self.inner.flags.get() | flag);
    }

    pub(crate) fn clear_flag(&self, flag: u32) {
        self.inner.flags.set(self.inner.flags.get() & !flag);
    }

    fn has_flag(&self, flag: u32) -> bool {
        self.inner.flags.get() & flag != 0
    }

    pub fn is_registered(&self) -> bool {
        self.has_flag(REGISTERED)
    }

    /// True while the type's `init` operation runs.
    pub fn is_initializing(&self) -> bool {
        self.has_flag(INITIALIZING)
    }

    pub fn is_initialized(&self) -> bool {
        self.has_flag(INITIALIZED)
    }

    pub fn is_disposing(&self) -> bool {
        self.has_flag(DISPOSING)
    }

    pub fn is_disposed(&self) -> bool {
        self.has_flag(DISPOSED)
    }

    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(Error::Disposed { id: self.id() });
        }
        Ok(())
    }

    // =========================================================================
    // OPTIONS
    // =========================================================================

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    pub fn option(&self, name: &str) -> Option<Value> {
        self.inner.options.value(name).cloned()
    }

    /// The delegate configured through `Options::with_context`, else self.
    pub fn context(&self) -> Instance {
        self.inner.options.context().unwrap_or_else(|| self.clone())
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.properties.borrow().get(name).cloned()
    }

    /// Snapshot of every property.
    pub fn properties(&self) -> IndexMap<String, Value> {
        self.inner.properties.borrow().snapshot()
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<WriteResult> {
        self.set_with(name, value, &WriteOptions::default())
    }

    /// Validate and write one property.
    pub fn set_with(
        &self,
        name: &str,
        value: impl Into<Value>,
        options: &WriteOptions,
    ) -> Result<WriteResult> {
        self.ensure_live()?;

        let mut value = value.into();
        if let Some(validate) = self.inner.component.property_validator(name) {
            value = validate(self, value);
        }

        let result = self
            .inner
            .properties
            .borrow_mut()
            .write(name, value, options);
        trace!(id = %self.id(), key = name, ?result, "property write");
        Ok(result)
    }

    /// Batch form of `set_with`: every entry shares `options`.
    pub fn set_many<K, V, I>(&self, entries: I, options: &WriteOptions) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (name, value) in entries {
            self.set_with(name.as_ref(), value, options)?;
        }
        Ok(())
    }

    // =========================================================================
    // STATES
    // =========================================================================

    /// Current state flag. Unset states read as `false`.
    pub fn is(&self, name: &str) -> bool {
        self.inner
            .states
            .borrow()
            .get(name)
            .copied()
            .unwrap_or(false)
    }

    /// Snapshot of every state that has been written.
    pub fn states(&self) -> IndexMap<String, bool> {
        self.inner.states.borrow().snapshot()
    }

    pub fn state(&self, name: &str, value: impl Into<Value>) -> Result<WriteResult> {
        self.state_with(name, value, &WriteOptions::default())
    }

    /// Validate, coerce to boolean and write one state. Anything that is not
    /// `true`/`false` after validation is stored as `false`.
    pub fn state_with(
        &self,
        name: &str,
        value: impl Into<Value>,
        options: &WriteOptions,
    ) -> Result<WriteResult> {
        self.ensure_live()?;

        let mut value = value.into();
        if let Some(validate) = self.inner.component.state_validator(name) {
            value = validate(self, value);
        }
        let flag = coerce_state(&value);

        let result = self.inner.states.borrow_mut().write(name, flag, options);
        trace!(id = %self.id(), key = name, flag, ?result, "state write");
        Ok(result)
    }

    pub fn state_many<K, V, I>(&self, entries: I, options: &WriteOptions) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (name, value) in entries {
            self.state_with(name.as_ref(), value, options)?;
        }
        Ok(())
    }

    // =========================================================================
    // INNERS
    // =========================================================================

    /// Private working value. Not validated, never batched.
    pub fn inner(&self, name: &str) -> Option<Value> {
        self.inner.inners.borrow().get(name).cloned()
    }

    pub fn set_inner(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_live()?;
        self.inner
            .inners
            .borrow_mut()
            .insert(name.to_owned(), value.into());
        Ok(())
    }

    pub fn set_inners<K, V, I>(&self, entries: I) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.ensure_live()?;
        let mut inners = self.inner.inners.borrow_mut();
        for (name, value) in entries {
            inners.insert(name.into(), value.into());
        }
        Ok(())
    }

    // =========================================================================
    // PENDING CHANGES
    // =========================================================================

    pub fn has_pending_changes(&self) -> bool {
        self.inner.properties.borrow().has_pending() || self.inner.states.borrow().has_pending()
    }

    pub(crate) fn take_property_changes(&self) -> Changes<Value> {
        self.inner.properties.borrow_mut().take_pending()
    }

    pub(crate) fn take_state_changes(&self) -> Changes<bool> {
        self.inner.states.borrow_mut().take_pending()
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    /// Subscribe to an event kind on this instance's bus.
    pub fn on<F>(&self, kind: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + 'static,
    {
        self.ensure_live()?;
        Ok(self.inner.bus.on(kind, Rc::new(listener)))
    }

    pub fn off(&self, kind: &str, id: ListenerId) -> bool {
        self.inner.bus.off(kind, id)
    }

    /// Remove every listener of one kind.
    pub fn off_kind(&self, kind: &str) {
        self.inner.bus.off_kind(kind);
    }

    /// Listen for `before<op>`.
    pub fn before<F>(&self, op: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + 'static,
    {
        self.on(&before_event(op), listener)
    }

    /// Listen for `after<op>`.
    pub fn after<F>(&self, op: &str, listener: F) -> Result<ListenerId>
    where
        F: Fn(&Event) + 'static,
    {
        self.on(&after_event(op), listener)
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner.bus.listener_count(kind)
    }

    /// Emit an event and return it so the caller can inspect its flags.
    ///
    /// The event is dispatched on the context instance's bus. Unless a
    /// listener stopped propagation, the option callback `on<kind>` then
    /// runs with `[event, data]`; returning `false` prevents the default
    /// action and stops propagation.
    pub fn emit(&self, kind: &str, data: Value) -> Event {
        let context = self.context();
        let event = Event::new(kind)
            .with_origin(context.id())
            .with_data(data);

        context.inner.bus.dispatch(&event);

        if event.is_propagation_stopped() {
            return event;
        }

        if let Some(callback) = context.inner.options.event_callback(&handler_name(kind)) {
            let mut args = vec![event.to_value()];
            if !event.data().is_null() {
                args.push(event.data().clone());
            }
            if callback(&context, &args) == Value::Bool(false) {
                event.prevent_default();
                event.stop_propagation();
            }
        }

        event
    }

    // =========================================================================
    // EXECUTE / INVOKE
    // =========================================================================

    /// Resolve `name` to an operation or an option callback and run it.
    ///
    /// Operations go through interception (see [`Invocation::into_value`]);
    /// callbacks run with the context instance. `Ok(None)` when nothing by
    /// that name exists.
    pub fn execute(&self, name: &str, args: &Args) -> Result<Option<Value>> {
        if name == DISPOSE || self.inner.component.operation(name).is_some() {
            return self.invoke(name, args).map(|done| Some(done.into_value()));
        }

        Ok(self
            .inner
            .options
            .callback(name)
            .map(|callback| self.execute_callback(&callback, args)))
    }

    /// Run a callback with the context instance.
    pub fn execute_callback(&self, callback: &Callback, args: &Args) -> Value {
        callback(&self.context(), args)
    }

    /// Run a declared operation through the interception protocol.
    pub fn invoke(&self, name: &str, args: &Args) -> Result<Invocation> {
        self.ensure_live()?;

        if name == DISPOSE {
            return self.dispose_with(args);
        }

        let operation =
            self.inner
                .component
                .operation(name)
                .ok_or_else(|| Error::UnknownOperation {
                    component: self.inner.component.name().to_owned(),
                    name: name.to_owned(),
                })?;

        interceptor::run(self, operation, args, Phases::default())
    }

    // =========================================================================
    // DISPOSE
    // =========================================================================

    /// Tear the instance down through the `dispose` operation.
    ///
    /// The type's `dispose` hooks and body (if declared) run first. The
    /// instance then leaves the registry, `afterdispose` is emitted while
    /// every map is still readable, and only then are listeners dropped and
    /// the maps released. A halted or cancelled dispose leaves the instance
    /// untouched. Calling `dispose` again while one is in progress (from a
    /// listener or the body) returns `PreconditionFailed`.
    pub fn dispose(&self) -> Result<Invocation> {
        self.dispose_with(&[])
    }

    fn dispose_with(&self, args: &Args) -> Result<Invocation> {
        self.ensure_live()?;
        if self.is_disposing() {
            return Ok(Invocation::PreconditionFailed);
        }

        let fallback;
        let operation = match self.inner.component.operation(DISPOSE) {
            Some(operation) => operation,
            None => {
                fallback = Operation::hooks_only(DISPOSE);
                &fallback
            }
        };

        let phases = Phases {
            after_body: Some(Box::new(|instance: &Instance| instance.unregister())),
            settled: Some(Box::new(|instance: &Instance| instance.release())),
        };

        // Set before any hook runs so a nested dispose from a listener or
        // the body is refused
        self.set_flag(DISPOSING);
        let outcome = interceptor::run(self, operation, args, phases);

        let aborted = matches!(
            outcome,
            Ok(Invocation::PreconditionFailed | Invocation::Cancelled) | Err(_)
        );
        if aborted && !self.is_disposed() {
            self.clear_flag(DISPOSING);
        }
        outcome
    }

    pub(crate) fn unregister(&self) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.registry().remove(self.id());
        }
        self.clear_flag(REGISTERED);
        debug!(id = %self.id(), component = self.inner.component.name(), "unregistered");
    }

    /// Drop listeners and every map. Runs once the dispose sequence has
    /// finished emitting.
    fn release(&self) {
        self.inner.bus.off_all();
        self.inner.properties.borrow_mut().clear();
        self.inner.states.borrow_mut().clear();
        self.inner.inners.borrow_mut().clear();
        // Lifecycle bits collapse to DISPOSED; an in-progress FLUSHING stays
        // until the flush that disposed us unwinds
        let flags = self.inner.flags.get();
        self.inner.flags.set((flags & !PHASE_MASK) | DISPOSED);
        debug!(id = %self.id(), component = self.inner.component.name(), "disposed");
    }
}

/// Only a literal `true` survives as `true`.
fn coerce_state(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("component", &self.inner.component.name())
            .field("flags", &format_args!("{:#b}", self.inner.flags.get()))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================
