// ============================================================================
// spark-components - Type Definitions
// Change records, write options and the dynamic value type
// ============================================================================

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Dynamic value stored in properties, inners, options and event payloads.
pub use serde_json::Value;

/// Positional arguments passed to operations and option callbacks.
pub type Args = [Value];

// =============================================================================
// CHANGE RECORDS
// =============================================================================

/// One pending change: the value a key moved to, the value it had when the
/// batch window opened, and caller-supplied metadata.
///
/// Serializes as `{ "newValue": .., "oldValue": .., ...meta }`; `oldValue` is
/// omitted for a key that had never been written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord<V> {
    pub new_value: V,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<V>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl<V> ChangeRecord<V> {
    pub fn new(new_value: V, old_value: Option<V>) -> Self {
        Self {
            new_value,
            old_value,
            meta: Map::new(),
        }
    }
}

/// Pending changes of one store, in first-write order.
pub type Changes<V> = IndexMap<String, ChangeRecord<V>>;

/// Serialize a change map into an event payload.
pub fn changes_to_value<V: Serialize>(changes: &Changes<V>) -> Value {
    serde_json::to_value(changes).unwrap_or_default()
}

// =============================================================================
// WRITE OPTIONS
// =============================================================================

/// Options accepted by `set` / `state` and their batch forms.
///
/// `force` and `silent` steer the write and are never copied into the
/// change record; `meta` is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    /// Write (and record) even when the value equals the stored one.
    pub force: bool,
    /// Store the value without recording a change.
    pub silent: bool,
    /// Pass-through metadata merged into the change record.
    pub meta: Map<String, Value>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    /// Attach a metadata entry that will travel with the change record.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serializes_camel_case_with_meta() {
        let mut record = ChangeRecord::new(json!(2), Some(json!(1)));
        record.meta.insert("source".into(), json!("drag"));

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "newValue": 2, "oldValue": 1, "source": "drag" })
        );
    }

    #[test]
    fn absent_old_value_is_omitted() {
        let record = ChangeRecord::new(true, None);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({ "newValue": true })
        );
    }

    #[test]
    fn changes_keep_insertion_order() {
        let mut changes: Changes<Value> = Changes::new();
        changes.insert("z".into(), ChangeRecord::new(json!(1), None));
        changes.insert("a".into(), ChangeRecord::new(json!(2), None));

        let keys: Vec<_> = changes.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);

        let payload = changes_to_value(&changes);
        assert_eq!(payload["a"]["newValue"], json!(2));
    }

    #[test]
    fn write_options_builders() {
        let opts = WriteOptions::force().with_meta("reason", "user");
        assert!(opts.force);
        assert!(!opts.silent);
        assert_eq!(opts.meta.get("reason"), Some(&json!("user")));
    }
}
