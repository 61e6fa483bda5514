// ============================================================================
// spark-components - Runtime
// Owns the registry, the id source, the flush timer and deferred completions
// ============================================================================
//
// A runtime replaces process-wide globals: each test or host builds its own.
// Instances hold a weak handle back to it, the registry holds the instances.
//
// Teardown rules:
// - `Instance::dispose` removes one instance from the registry
// - `Runtime::shutdown` stops the timer and disposes what is left
// - dropping the last `Runtime` handle drops every registered instance
// ============================================================================

pub mod registry;

pub use registry::Registry;

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, trace};

use crate::component::{ComponentType, Instance, Options};
use crate::core::config::RuntimeConfig;
use crate::core::constants::{INIT, INITIALIZED, INITIALIZING, REGISTERED};
use crate::core::error::{Error, Result};
use crate::core::ids::{IdGenerator, InstanceId, UlidIds};
use crate::events::{BusFactory, LocalBus};
use crate::reactivity::scheduling::{self, FlushReport};
use crate::reactivity::tasks::{TaskQueue, TaskReport};
use crate::reactivity::timer::Timer;

// =============================================================================
// RUNTIME INNER
// =============================================================================

pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    registry: Registry,
    ids: Box<dyn IdGenerator>,
    bus_factory: BusFactory,
    timer: Timer,
    tasks: TaskQueue,
    flushing: Cell<bool>,
}

impl RuntimeInner {
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }
}

// =============================================================================
// RUNTIME
// =============================================================================

/// Component runtime handle. Clones share the same registry.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use spark_components::{ComponentType, Options, Runtime};
///
/// let calls = Rc::new(Cell::new(0));
/// let counter = calls.clone();
/// let slider = ComponentType::builder("slider")
///     .property_updater("value", move |_, _, _, _| {
///         counter.set(counter.get() + 1);
///         Ok(())
///     })
///     .build()
///     .unwrap();
///
/// let runtime = Runtime::new();
/// let instance = runtime.create(&slider, Options::new()).unwrap();
/// instance.set("value", 1).unwrap();
/// instance.set("value", 2).unwrap();
///
/// let report = runtime.run_until_idle().unwrap();
/// assert!(report.is_clean());
/// assert_eq!(calls.get(), 1);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Runtime with default config, random ids and `LocalBus` event buses.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    pub(crate) fn from_inner(inner: Rc<RuntimeInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn timer(&self) -> &Timer {
        &self.inner.timer
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // INSTANCES
    // =========================================================================

    /// Create, register and initialize an instance.
    ///
    /// `options` win over the type's defaults. When the type declares an
    /// `init` operation it runs through the interception protocol
    /// (`beforeinit`, `afterinit`, `onbeforeinit`). An `init` that fails
    /// leaves nothing registered.
    pub fn create(&self, component: &ComponentType, options: Options) -> Result<Instance> {
        let mut options = options;
        options.merge_defaults(component.defaults());

        let id = self.allocate_id();
        let instance = Instance::new(
            id,
            component.clone(),
            options,
            Rc::downgrade(&self.inner),
            (self.inner.bus_factory)(),
        );

        self.inner.registry.insert(instance.clone());
        instance.set_flag(REGISTERED);
        debug!(id = %id, component = component.name(), "registered");

        if component.operation(INIT).is_some() {
            instance.set_flag(INITIALIZING);
            let outcome = instance.invoke(INIT, &[]);
            instance.clear_flag(INITIALIZING);

            if let Err(err) = outcome {
                instance.unregister();
                return Err(err);
            }
        }

        instance.set_flag(INITIALIZED);
        Ok(instance)
    }

    fn allocate_id(&self) -> InstanceId {
        loop {
            let id = self.inner.ids.next_id();
            if !self.inner.registry.contains(id) {
                return id;
            }
            debug!(id = %id, "id collision, regenerating");
        }
    }

    pub fn get(&self, id: InstanceId) -> Option<Instance> {
        self.inner.registry.get(id)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.inner.registry.contains(id)
    }

    pub fn len(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.is_empty()
    }

    pub fn instances(&self) -> Vec<Instance> {
        self.inner.registry.snapshot()
    }

    /// Stop the timer and dispose every registered instance, newest first.
    ///
    /// Instances whose dispose was halted or cancelled stay registered.
    /// Returns the first failure after attempting every instance.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.timer.stop();

        let mut first_error = None;
        for instance in self.instances().into_iter().rev() {
            if let Err(err) = instance.dispose() {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }

        debug!(remaining = self.len(), "runtime shut down");
        first_error.map_or(Ok(()), Err)
    }

    // =========================================================================
    // SCHEDULING
    // =========================================================================

    /// Deliver every registered instance's pending changes now.
    ///
    /// Calling this from inside a flush (an updater or a change listener)
    /// does nothing and returns an empty report.
    pub fn flush(&self) -> FlushReport {
        if self.inner.flushing.replace(true) {
            trace!("flush already in progress");
            return FlushReport::default();
        }

        let _guard = FlushGuard(&self.inner.flushing);
        scheduling::flush_all(self.inner.registry.snapshot())
    }

    pub(crate) fn spawn<F>(&self, future: F)
    where
        F: Future<Output = Result<()>> + 'static,
    {
        self.inner.tasks.spawn(future);
    }

    /// Resume deferred operation completions whose awaitables made progress.
    pub fn drive_tasks(&self) -> TaskReport {
        self.inner.tasks.drive()
    }

    /// Deferred completions not yet finished.
    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Host-loop hook: resume ready completions, then flush if a tick is due.
    ///
    /// Failed completions are folded into the returned report.
    pub fn poll(&self, now: Instant) -> FlushReport {
        let tasks = self.drive_tasks();
        let mut report = FlushReport {
            flushed: 0,
            errors: tasks.errors,
        };

        if self.inner.timer.is_due(now) {
            self.inner.timer.mark_fired(now);
            report.merge(self.flush());
        }
        report
    }

    /// Pending changes on any instance, or a woken deferred completion.
    pub fn has_pending_work(&self) -> bool {
        self.inner.tasks.has_runnable()
            || self
                .inner
                .registry
                .snapshot()
                .iter()
                .any(Instance::has_pending_changes)
    }

    /// Alternate task driving and flushing until nothing is left to do.
    ///
    /// Ignores the timer. Completions still waiting on an outside event do
    /// not count as work. Fails with [`Error::FlushLoop`] when updaters keep
    /// producing changes past `max_idle_rounds`.
    pub fn run_until_idle(&self) -> Result<FlushReport> {
        let rounds = self.inner.config.max_idle_rounds;
        let mut report = FlushReport::default();

        for round in 0..rounds {
            report.errors.extend(self.drive_tasks().errors);
            report.merge(self.flush());

            if !self.has_pending_work() {
                trace!(rounds = round + 1, "runtime idle");
                return Ok(report);
            }
        }

        Err(Error::FlushLoop { rounds })
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("instances", &self.inner.registry)
            .field("timer", &self.inner.timer)
            .field("pending_tasks", &self.inner.tasks.len())
            .finish()
    }
}

/// Clears the runtime's flushing flag even if an updater panics.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Configures a [`Runtime`].
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    ids: Option<Box<dyn IdGenerator>>,
    bus_factory: Option<BusFactory>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the id source (random ULIDs by default).
    pub fn ids(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Box::new(ids));
        self
    }

    /// Replace the per-instance event bus (`LocalBus` by default).
    pub fn bus_factory(mut self, factory: BusFactory) -> Self {
        self.bus_factory = Some(factory);
        self
    }

    pub fn build(self) -> Runtime {
        let timer = Timer::new(self.config.tick_interval());
        if self.config.autostart {
            timer.start();
        }

        Runtime {
            inner: Rc::new(RuntimeInner {
                ids: self.ids.unwrap_or_else(|| Box::new(UlidIds)),
                bus_factory: self.bus_factory.unwrap_or_else(LocalBus::factory),
                config: self.config,
                registry: Registry::new(),
                timer,
                tasks: TaskQueue::new(),
                flushing: Cell::new(false),
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
