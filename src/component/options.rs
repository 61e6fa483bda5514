// ============================================================================
// spark-components - Instance Options
// Construction-time configuration: values, callbacks, updaters, delegate
// ============================================================================

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::instance::{Instance, WeakInstance};
use crate::core::error::BoxError;
use crate::core::types::{Args, Changes};

// =============================================================================
// CALLBACK TYPES
// =============================================================================

/// Option-supplied function, reachable through `execute` and `emit`.
pub type Callback = Rc<dyn Fn(&Instance, &Args) -> Value>;

/// Reaction to a flushed change: `(instance, new, old, all_changes_this_flush)`.
pub type Updater<V> = Rc<dyn Fn(&Instance, &V, Option<&V>, &Changes<V>) -> Result<(), BoxError>>;

/// Updaters keyed by property or state name.
pub type UpdaterTable<V> = IndexMap<String, Updater<V>>;

// =============================================================================
// OPTIONS
// =============================================================================

/// Configuration snapshot handed to `Runtime::create`.
///
/// Immutable once the instance exists. Type-level defaults are merged
/// underneath: anything set here wins.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use spark_components::Options;
///
/// let options = Options::new()
///     .with_value("step", json!(5))
///     .with_callback("onopen", |_instance, _args| json!(false));
///
/// assert_eq!(options.value("step"), Some(&json!(5)));
/// assert!(options.callback("onopen").is_some());
/// ```
#[derive(Clone, Default)]
pub struct Options {
    values: Map<String, Value>,
    callbacks: IndexMap<String, Callback>,
    property_change: UpdaterTable<Value>,
    state_change: UpdaterTable<bool>,
    context: Option<WeakInstance>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options holding a plain value map (e.g. deserialized config).
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    // =========================================================================
    // BUILDERS
    // =========================================================================

    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Register a callback. Names are matched case-insensitively by `emit`
    /// (`onbeforeopen`), exactly by `execute`.
    pub fn with_callback<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Instance, &Args) -> Value + 'static,
    {
        self.callbacks.insert(name.into(), Rc::new(callback));
        self
    }

    /// Instance-level property updater, run after the type-level one.
    pub fn with_property_updater<F>(mut self, key: impl Into<String>, updater: F) -> Self
    where
        F: Fn(&Instance, &Value, Option<&Value>, &Changes<Value>) -> Result<(), BoxError> + 'static,
    {
        self.property_change.insert(key.into(), Rc::new(updater));
        self
    }

    /// Instance-level state updater, run after the type-level one.
    pub fn with_state_updater<F>(mut self, key: impl Into<String>, updater: F) -> Self
    where
        F: Fn(&Instance, &bool, Option<&bool>, &Changes<bool>) -> Result<(), BoxError> + 'static,
    {
        self.state_change.insert(key.into(), Rc::new(updater));
        self
    }

    /// Delegate instance: events are dispatched on its bus and callbacks run
    /// with it as context. Held weakly; falls back to the instance itself.
    pub fn with_context(mut self, delegate: &Instance) -> Self {
        self.context = Some(delegate.downgrade());
        self
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn callback(&self, name: &str) -> Option<Callback> {
        self.callbacks.get(name).cloned()
    }

    /// Case-insensitive lookup used for `on<kind>` event callbacks.
    pub(crate) fn event_callback(&self, name: &str) -> Option<Callback> {
        self.callback(name).or_else(|| {
            self.callbacks
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, callback)| callback.clone())
        })
    }

    pub fn property_updaters(&self) -> &UpdaterTable<Value> {
        &self.property_change
    }

    pub fn state_updaters(&self) -> &UpdaterTable<bool> {
        &self.state_change
    }

    pub fn context(&self) -> Option<Instance> {
        self.context.as_ref().and_then(WeakInstance::upgrade)
    }

    // =========================================================================
    // DEFAULTS
    // =========================================================================

    /// Fill every entry missing here from `defaults`.
    pub fn merge_defaults(&mut self, defaults: &Options) {
        for (name, value) in &defaults.values {
            self.values
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        for (name, callback) in &defaults.callbacks {
            self.callbacks
                .entry(name.clone())
                .or_insert_with(|| callback.clone());
        }
        for (key, updater) in &defaults.property_change {
            self.property_change
                .entry(key.clone())
                .or_insert_with(|| updater.clone());
        }
        for (key, updater) in &defaults.state_change {
            self.state_change
                .entry(key.clone())
                .or_insert_with(|| updater.clone());
        }
        if self.context.is_none() {
            self.context = defaults.context.clone();
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("values", &self.values)
            .field("callbacks", &self.callbacks.keys().collect::<Vec<_>>())
            .field("property_change", &self.property_change.keys().collect::<Vec<_>>())
            .field("state_change", &self.state_change.keys().collect::<Vec<_>>())
            .field("context", &self.context.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_values_win_over_defaults() {
        let defaults = Options::new()
            .with_value("index", json!(0))
            .with_value("trigger", json!("click"));
        let mut options = Options::new().with_value("trigger", json!("over"));

        options.merge_defaults(&defaults);
        assert_eq!(options.value("index"), Some(&json!(0)));
        assert_eq!(options.value("trigger"), Some(&json!("over")));
    }

    #[test]
    fn defaults_fill_callbacks_and_updaters() {
        let defaults = Options::new()
            .with_callback("format", |_, _| json!("x"))
            .with_property_updater("value", |_, _, _, _| Ok(()));
        let mut options = Options::new();

        options.merge_defaults(&defaults);
        assert!(options.callback("format").is_some());
        assert!(options.property_updaters().contains_key("value"));
    }

    #[test]
    fn event_callbacks_match_any_case() {
        let options = Options::new().with_callback("onBeforeOpen", |_, _| json!(false));
        assert!(options.callback("onbeforeopen").is_none());
        assert!(options.event_callback("onbeforeopen").is_some());
    }

    #[test]
    fn from_values_keeps_map() {
        let map = json!({ "min": 0, "max": 10 }).as_object().cloned().unwrap();
        let options = Options::from_values(map);
        assert_eq!(options.value("max"), Some(&json!(10)));
        assert!(options.context().is_none());
    }
}
