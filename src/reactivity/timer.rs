// ============================================================================
// spark-components - Flush Timer
// A repeating zero-delay callback, driven by the host's loop
// ============================================================================

use std::cell::Cell;
use std::time::{Duration, Instant};

use tracing::debug;

/// Repeating timer gating scheduled flushes.
///
/// The timer never sleeps or spawns; the host calls `Runtime::poll` from
/// its loop and the timer decides whether a tick is due.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use spark_components::reactivity::Timer;
///
/// let timer = Timer::new(Duration::from_millis(10));
/// let now = Instant::now();
/// assert!(!timer.is_due(now));
///
/// timer.start();
/// assert!(timer.is_due(now));
/// timer.mark_fired(now);
/// assert!(!timer.is_due(now + Duration::from_millis(5)));
/// assert!(timer.is_due(now + Duration::from_millis(10)));
/// ```
#[derive(Debug)]
pub struct Timer {
    interval: Duration,
    running: Cell<bool>,
    last_fired: Cell<Option<Instant>>,
}

impl Timer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Cell::new(false),
            last_fired: Cell::new(None),
        }
    }

    /// Start ticking. Returns false if already running.
    pub fn start(&self) -> bool {
        if self.running.replace(true) {
            return false;
        }
        self.last_fired.set(None);
        debug!(interval_ms = self.interval.as_millis() as u64, "flush timer started");
        true
    }

    /// Stop ticking. Returns false if already stopped.
    pub fn stop(&self) -> bool {
        if !self.running.replace(false) {
            return false;
        }
        debug!("flush timer stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Running, and at least one interval since the last tick.
    pub fn is_due(&self, now: Instant) -> bool {
        if !self.running.get() {
            return false;
        }
        match self.last_fired.get() {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        }
    }

    pub fn mark_fired(&self, now: Instant) {
        self.last_fired.set(Some(now));
    }
}
