// ============================================================================
// spark-components - Instance Identifiers
// ============================================================================

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier of a component instance.
///
/// Never reused while the instance is registered; the registry enforces
/// this even if a generator were to repeat itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Ulid);

impl InstanceId {
    /// Build an id from a millisecond timestamp and a random component.
    pub fn from_parts(timestamp_ms: u64, random: u128) -> Self {
        Self(Ulid::from_parts(timestamp_ms, random))
    }

    /// The underlying ULID.
    pub fn ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for InstanceId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// GENERATORS
// =============================================================================

/// Source of fresh instance ids.
pub trait IdGenerator {
    fn next_id(&self) -> InstanceId;
}

/// Random ULIDs. The default generator.
#[derive(Debug, Default)]
pub struct UlidIds;

impl IdGenerator for UlidIds {
    fn next_id(&self) -> InstanceId {
        InstanceId(Ulid::new())
    }
}

/// Deterministic ids `1, 2, 3, ...` (timestamp 0). Handy in tests and snapshots.
#[derive(Debug)]
pub struct SequentialIds {
    next: Cell<u128>,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self { next: Cell::new(1) }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> InstanceId {
        let n = self.next.get();
        self.next.set(n + 1);
        InstanceId::from_parts(0, n)
    }
}
