// ============================================================================
// spark-components - Reactivity Module
// Equality gates, change flushing, the tick timer and deferred completions
// ============================================================================

pub mod equality;
pub mod scheduling;
pub mod tasks;
pub mod timer;

pub use equality::{equals, value_equals, EqualsFn};
pub use scheduling::FlushReport;
pub use tasks::{TaskQueue, TaskReport};
pub use timer::Timer;
