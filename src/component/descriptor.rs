// ============================================================================
// spark-components - Component Types
// Per-type static tables: defaults, validators, updaters, operations
// ============================================================================

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;

use super::instance::Instance;
use super::operation::Operation;
use super::options::{Options, UpdaterTable};
use crate::core::error::{BoxError, Result};
use crate::core::types::{Args, Changes};

/// Transform applied to every write attempt of one key, before the
/// equality check. Validators fall back to a sane value rather than fail.
pub type Validator = Rc<dyn Fn(&Instance, Value) -> Value>;

struct ComponentTypeInner {
    name: String,
    defaults: Options,
    property_validators: IndexMap<String, Validator>,
    state_validators: IndexMap<String, Validator>,
    property_updaters: UpdaterTable<Value>,
    state_updaters: UpdaterTable<bool>,
    operations: IndexMap<String, Operation>,
}

/// Shared description of a kind of component. Cheap to clone.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use spark_components::{ComponentType, Completion, Operation};
///
/// let slider = ComponentType::builder("slider")
///     .default_value("step", json!(1))
///     .property_validator("value", |_, value| {
///         if value.is_number() { value } else { json!(0) }
///     })
///     .operation(Operation::new("reset", |instance, _| {
///         instance.set("value", 0)?;
///         Ok(Completion::done())
///     }))
///     .build()
///     .unwrap();
///
/// assert_eq!(slider.name(), "slider");
/// assert!(slider.operation("reset").is_some());
/// ```
#[derive(Clone)]
pub struct ComponentType {
    inner: Rc<ComponentTypeInner>,
}

impl ComponentType {
    pub fn builder(name: impl Into<String>) -> ComponentTypeBuilder {
        ComponentTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn defaults(&self) -> &Options {
        &self.inner.defaults
    }

    pub fn property_validator(&self, key: &str) -> Option<&Validator> {
        self.inner.property_validators.get(key)
    }

    pub fn state_validator(&self, key: &str) -> Option<&Validator> {
        self.inner.state_validators.get(key)
    }

    pub fn property_updaters(&self) -> &UpdaterTable<Value> {
        &self.inner.property_updaters
    }

    pub fn state_updaters(&self) -> &UpdaterTable<bool> {
        &self.inner.state_updaters
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.inner.operations.get(name)
    }

    /// Declared operation names, in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.inner.operations.keys().map(String::as_str)
    }

    pub fn ptr_eq(&self, other: &ComponentType) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("name", &self.inner.name)
            .field("operations", &self.inner.operations.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Builder for [`ComponentType`]. Operation names are checked in `build`.
pub struct ComponentTypeBuilder {
    name: String,
    defaults: Options,
    property_validators: IndexMap<String, Validator>,
    state_validators: IndexMap<String, Validator>,
    property_updaters: UpdaterTable<Value>,
    state_updaters: UpdaterTable<bool>,
    operations: IndexMap<String, Operation>,
}

impl ComponentTypeBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: Options::new(),
            property_validators: IndexMap::new(),
            state_validators: IndexMap::new(),
            property_updaters: IndexMap::new(),
            state_updaters: IndexMap::new(),
            operations: IndexMap::new(),
        }
    }

    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults = self.defaults.with_value(name, value);
        self
    }

    pub fn default_callback<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Instance, &Args) -> Value + 'static,
    {
        self.defaults = self.defaults.with_callback(name, callback);
        self
    }

    /// Replace the whole default option set.
    pub fn defaults(mut self, defaults: Options) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn property_validator<F>(mut self, key: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Instance, Value) -> Value + 'static,
    {
        self.property_validators.insert(key.into(), Rc::new(validator));
        self
    }

    /// State validators run before the boolean coercion.
    pub fn state_validator<F>(mut self, key: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&Instance, Value) -> Value + 'static,
    {
        self.state_validators.insert(key.into(), Rc::new(validator));
        self
    }

    pub fn property_updater<F>(mut self, key: impl Into<String>, updater: F) -> Self
    where
        F: Fn(&Instance, &Value, Option<&Value>, &Changes<Value>) -> Result<(), BoxError> + 'static,
    {
        self.property_updaters.insert(key.into(), Rc::new(updater));
        self
    }

    pub fn state_updater<F>(mut self, key: impl Into<String>, updater: F) -> Self
    where
        F: Fn(&Instance, &bool, Option<&bool>, &Changes<bool>) -> Result<(), BoxError> + 'static,
    {
        self.state_updaters.insert(key.into(), Rc::new(updater));
        self
    }

    /// Declare an operation. A later declaration with the same name wins.
    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.insert(operation.name().to_owned(), operation);
        self
    }

    pub fn build(self) -> Result<ComponentType> {
        for name in self.operations.keys() {
            Operation::validate_name(name)?;
        }

        Ok(ComponentType {
            inner: Rc::new(ComponentTypeInner {
                name: self.name,
                defaults: self.defaults,
                property_validators: self.property_validators,
                state_validators: self.state_validators,
                property_updaters: self.property_updaters,
                state_updaters: self.state_updaters,
                operations: self.operations,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::operation::Completion;
    use crate::core::error::Error;

    #[test]
    fn build_rejects_hook_names() {
        let result = ComponentType::builder("bad")
            .operation(Operation::new("_open", |_, _| Ok(Completion::done())))
            .build();

        assert!(matches!(
            result,
            Err(Error::InvalidOperationName { name }) if name == "_open"
        ));
    }

    #[test]
    fn operations_keep_declaration_order() {
        let component = ComponentType::builder("panel")
            .operation(Operation::hooks_only("show"))
            .operation(Operation::hooks_only("hide"))
            .build()
            .unwrap();

        assert_eq!(component.operations().collect::<Vec<_>>(), vec!["show", "hide"]);
    }

    #[test]
    fn clones_share_tables() {
        let component = ComponentType::builder("panel")
            .default_value("visible", true)
            .build()
            .unwrap();
        let other = component.clone();

        assert!(component.ptr_eq(&other));
        assert_eq!(other.defaults().value("visible"), Some(&Value::Bool(true)));
    }
}
