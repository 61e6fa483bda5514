// ============================================================================
// spark-components - ChangeStore
// A keyed value store that records coalesced change records between flushes
// ============================================================================
//
// Used twice per instance: once for properties (Value), once for states (bool).
//
// Write algorithm (validation has already happened in the instance layer):
// 1. Equal to the stored value and not forced → no effect
// 2. Store the value
// 3. Silent → stop, no record
// 4. Merge a record into the pending map:
//    - first write of the batch window captures old_value
//    - later writes replace new_value and keep that original old_value
//    - a write that lands back on the original old_value deletes the record
// ============================================================================

use indexmap::IndexMap;

use crate::core::types::{ChangeRecord, Changes, WriteOptions};
use crate::reactivity::equality::{equals, EqualsFn};

// =============================================================================
// WRITE RESULT
// =============================================================================

/// What a single `write` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    /// Value equal to the stored one, nothing happened.
    Unchanged,
    /// Value stored silently, no change recorded.
    Stored,
    /// Value stored and a pending record created or updated.
    Recorded,
    /// Value stored and the pending record removed: the key is back where
    /// the batch window started.
    Cancelled,
}

impl WriteResult {
    /// True when the stored value was written.
    pub fn stored(self) -> bool {
        !matches!(self, WriteResult::Unchanged)
    }
}

// =============================================================================
// CHANGE STORE
// =============================================================================

/// Keyed store with equality-gated writes and a pending-changes map.
///
/// # Example
///
/// ```
/// use spark_components::collections::{ChangeStore, WriteResult};
/// use spark_components::WriteOptions;
///
/// let mut store: ChangeStore<i32> = ChangeStore::new();
/// let opts = WriteOptions::default();
///
/// store.write("x", 1, &WriteOptions::silent());
/// assert_eq!(store.write("x", 1, &opts), WriteResult::Unchanged);
/// assert_eq!(store.write("x", 2, &opts), WriteResult::Recorded);
/// assert_eq!(store.write("x", 1, &opts), WriteResult::Cancelled);
/// assert!(!store.has_pending());
/// ```
#[derive(Debug, Clone)]
pub struct ChangeStore<V> {
    values: IndexMap<String, V>,
    pending: Changes<V>,
    equals: EqualsFn<V>,
}

impl<V: Clone + PartialEq> ChangeStore<V> {
    /// Create an empty store gated by `PartialEq`.
    pub fn new() -> Self {
        Self::with_equals(equals)
    }
}

impl<V: Clone + PartialEq> Default for ChangeStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ChangeStore<V> {
    /// Create an empty store with a custom equality gate.
    pub fn with_equals(equals: EqualsFn<V>) -> Self {
        Self {
            values: IndexMap::new(),
            pending: Changes::new(),
            equals,
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub fn get(&self, key: &str) -> Option<&V> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Copy of every stored key/value, in first-write order.
    pub fn snapshot(&self) -> IndexMap<String, V> {
        self.values.clone()
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Write one key. See the module header for the algorithm.
    pub fn write(&mut self, key: &str, value: V, options: &WriteOptions) -> WriteResult {
        let old_value = self.values.get(key).cloned();

        if !options.force
            && old_value
                .as_ref()
                .is_some_and(|current| (self.equals)(current, &value))
        {
            return WriteResult::Unchanged;
        }

        self.values.insert(key.to_owned(), value.clone());

        if options.silent {
            return WriteResult::Stored;
        }

        self.merge(key, value, old_value, options)
    }

    /// Batch form: write every entry with the same options.
    pub fn write_many<K, I>(&mut self, entries: I, options: &WriteOptions) -> Vec<WriteResult>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        entries
            .into_iter()
            .map(|(key, value)| self.write(key.as_ref(), value, options))
            .collect()
    }

    fn merge(
        &mut self,
        key: &str,
        new_value: V,
        old_value: Option<V>,
        options: &WriteOptions,
    ) -> WriteResult {
        if let Some(record) = self.pending.get_mut(key) {
            let back_to_start = record
                .old_value
                .as_ref()
                .is_some_and(|original| (self.equals)(original, &new_value));

            if back_to_start {
                self.pending.shift_remove(key);
                return WriteResult::Cancelled;
            }

            record.new_value = new_value;
            record
                .meta
                .extend(options.meta.iter().map(|(k, v)| (k.clone(), v.clone())));
            return WriteResult::Recorded;
        }

        let mut record = ChangeRecord::new(new_value, old_value);
        record.meta = options.meta.clone();
        self.pending.insert(key.to_owned(), record);
        WriteResult::Recorded
    }

    // =========================================================================
    // PENDING CHANGES
    // =========================================================================

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending(&self) -> &Changes<V> {
        &self.pending
    }

    /// Hand the pending map to the flusher, leaving an empty one behind.
    pub fn take_pending(&mut self) -> Changes<V> {
        std::mem::take(&mut self.pending)
    }

    /// Drop every value and every pending record.
    pub fn clear(&mut self) {
        self.values.clear();
        self.pending.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
