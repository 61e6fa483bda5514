// ============================================================================
// spark-components - Runtime Configuration
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for a [`Runtime`](crate::Runtime).
///
/// Deserializable so hosts can keep it next to the rest of their config:
///
/// ```
/// use spark_components::RuntimeConfig;
///
/// let config: RuntimeConfig = serde_json::from_str(r#"{ "tick_interval_ms": 16 }"#).unwrap();
/// assert_eq!(config.tick_interval_ms, 16);
/// assert!(config.autostart);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Minimum time between two scheduled flushes. 0 means "every poll".
    pub tick_interval_ms: u64,

    /// Start the flush timer as soon as the runtime is built.
    pub autostart: bool,

    /// Upper bound on `run_until_idle` rounds before reporting a loop.
    pub max_idle_rounds: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 0,
            autostart: true,
            max_idle_rounds: 100,
        }
    }
}

impl RuntimeConfig {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    pub fn with_max_idle_rounds(mut self, rounds: usize) -> Self {
        self.max_idle_rounds = rounds;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
