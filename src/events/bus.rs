// ============================================================================
// spark-components - Event Bus
// The publish/subscribe boundary and its default in-process implementation
// ============================================================================
//
// The runtime only needs on/off/dispatch plus the cancellation flags carried
// by `Event`. Hosts with their own dispatcher implement `EventBus` and hand a
// factory to the runtime; everyone else gets `LocalBus`.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use super::event::Event;

/// Listener callback.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Handle returned by `on`, used to remove that one listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// =============================================================================
// EVENT BUS TRAIT
// =============================================================================

/// Publish/subscribe dispatch consumed by component instances.
pub trait EventBus {
    /// Subscribe to an event kind.
    fn on(&self, kind: &str, listener: Listener) -> ListenerId;

    /// Remove one listener. Returns false if it was not subscribed.
    fn off(&self, kind: &str, id: ListenerId) -> bool;

    /// Remove every listener of one kind.
    fn off_kind(&self, kind: &str);

    /// Remove every listener.
    fn off_all(&self);

    /// Deliver an event to the listeners of `event.kind()`.
    fn dispatch(&self, event: &Event);

    fn listener_count(&self, kind: &str) -> usize;
}

/// Builds one bus per instance.
pub type BusFactory = Rc<dyn Fn() -> Box<dyn EventBus>>;

// =============================================================================
// LOCAL BUS
// =============================================================================

/// Single-threaded bus keyed by lowercased event kind.
///
/// Listeners run in subscription order. The listener list is snapshotted
/// before delivery, so listeners added or removed while an event is being
/// dispatched only take effect for the next dispatch.
#[derive(Default)]
pub struct LocalBus {
    listeners: RefCell<IndexMap<String, Vec<(ListenerId, Listener)>>>,
    next_id: Cell<u64>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory producing a fresh `LocalBus` for every instance.
    pub fn factory() -> BusFactory {
        Rc::new(|| Box::new(LocalBus::new()) as Box<dyn EventBus>)
    }
}

impl EventBus for LocalBus {
    fn on(&self, kind: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        self.listeners
            .borrow_mut()
            .entry(kind.to_lowercase())
            .or_default()
            .push((id, listener));
        id
    }

    fn off(&self, kind: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(list) = listeners.get_mut(&kind.to_lowercase()) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    fn off_kind(&self, kind: &str) {
        self.listeners.borrow_mut().shift_remove(&kind.to_lowercase());
    }

    fn off_all(&self) {
        // Take first so listeners dropped here cannot observe a live borrow
        let removed = std::mem::take(&mut *self.listeners.borrow_mut());
        drop(removed);
    }

    fn dispatch(&self, event: &Event) {
        let snapshot: Vec<Listener> = match self.listeners.borrow().get(event.kind()) {
            Some(list) => list.iter().map(|(_, l)| l.clone()).collect(),
            None => return,
        };

        for listener in snapshot {
            listener(event);
            if event.is_immediate_propagation_stopped() {
                break;
            }
        }
    }

    fn listener_count(&self, kind: &str) -> usize {
        self.listeners
            .borrow()
            .get(&kind.to_lowercase())
            .map_or(0, Vec::len)
    }
}

// =============================================================================
// TESTS
// =============================================================================
