// ============================================================================
// spark-components - Registry
// Live instances of one runtime, keyed by id, in registration order
// ============================================================================

use std::cell::RefCell;

use indexmap::IndexMap;

use crate::component::Instance;
use crate::core::ids::InstanceId;

/// Table of registered instances.
///
/// Borrows are never held across calls back into instance code: readers get
/// clones or snapshots.
#[derive(Default)]
pub struct Registry {
    instances: RefCell<IndexMap<InstanceId, Instance>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance. Returns the instance previously stored under its id.
    pub fn insert(&self, instance: Instance) -> Option<Instance> {
        self.instances.borrow_mut().insert(instance.id(), instance)
    }

    /// Remove by id, keeping the order of the remaining entries.
    pub fn remove(&self, id: InstanceId) -> Option<Instance> {
        self.instances.borrow_mut().shift_remove(&id)
    }

    pub fn get(&self, id: InstanceId) -> Option<Instance> {
        self.instances.borrow().get(&id).cloned()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.borrow().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.borrow().is_empty()
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        self.instances.borrow().keys().copied().collect()
    }

    /// Handles to every registered instance, in registration order.
    pub fn snapshot(&self) -> Vec<Instance> {
        self.instances.borrow().values().cloned().collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.instances.borrow().keys()).finish()
    }
}
