// ============================================================================
// spark-components - Events Module
// ============================================================================

pub mod bus;
pub mod event;

pub use bus::{BusFactory, EventBus, Listener, ListenerId, LocalBus};
pub use event::Event;
