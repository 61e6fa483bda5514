// ============================================================================
// spark-components - Change Flushing
// Deliver every instance's pending changes in one pass
// ============================================================================
//
// One flush walks the given instances in order. Per instance:
// 1. Property pass: take the pending map, run the type's updaters for every
//    changed key, then the instance's (options) updaters, then emit one
//    `propertychange` carrying the whole map.
// 2. State pass: the same with `statechange`.
//
// The pending map is taken before any updater runs, so writes made by an
// updater start a fresh batch window and go out on the next flush.
// An updater error stops that instance's remaining steps only.
// ============================================================================

use serde::Serialize;
use tracing::{trace, warn};

use crate::component::{Instance, UpdaterTable};
use crate::core::constants::{FLUSHING, PROPERTY_CHANGE, STATE_CHANGE};
use crate::core::error::{Error, Result};
use crate::core::types::{changes_to_value, Changes};

// =============================================================================
// FLUSH REPORT
// =============================================================================

/// Outcome of one flush.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Instances that had pending changes and delivered at least one pass.
    pub flushed: usize,
    /// Updater failures (one per aborted instance), plus failed deferred
    /// completions when the report comes from `poll` or `run_until_idle`.
    pub errors: Vec<Error>,
}

impl FlushReport {
    /// True when no updater failed.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: FlushReport) {
        self.flushed += other.flushed;
        self.errors.extend(other.errors);
    }
}

// =============================================================================
// FLUSH
// =============================================================================

/// Flush every instance, collecting failures instead of stopping.
pub(crate) fn flush_all(instances: Vec<Instance>) -> FlushReport {
    let mut report = FlushReport::default();

    for instance in instances {
        match flush_instance(&instance) {
            Ok(true) => report.flushed += 1,
            Ok(false) => {}
            Err(err) => {
                warn!(id = %instance.id(), error = %err, "flush aborted for instance");
                report.flushed += 1;
                report.errors.push(err);
            }
        }
    }

    trace!(flushed = report.flushed, errors = report.errors.len(), "flush pass");
    report
}

/// Flush one instance. Returns whether anything was delivered.
pub(crate) fn flush_instance(instance: &Instance) -> Result<bool> {
    if instance.is_disposed() || instance.flags() & FLUSHING != 0 {
        return Ok(false);
    }
    if !instance.has_pending_changes() {
        return Ok(false);
    }

    instance.set_flag(FLUSHING);
    let _guard = FlushingFlag(instance);
    deliver(instance).map(|()| true)
}

/// Drops the instance's FLUSHING bit on every exit path, unwinding included.
struct FlushingFlag<'a>(&'a Instance);

impl Drop for FlushingFlag<'_> {
    fn drop(&mut self) {
        self.0.clear_flag(FLUSHING);
    }
}

fn deliver(instance: &Instance) -> Result<()> {
    let properties = instance.take_property_changes();
    if !properties.is_empty() {
        run_pass(
            instance,
            &properties,
            [
                instance.component().property_updaters(),
                instance.options().property_updaters(),
            ],
            PROPERTY_CHANGE,
        )?;
    }

    // An updater may have disposed the instance
    if instance.is_disposed() {
        return Ok(());
    }

    let states = instance.take_state_changes();
    if !states.is_empty() {
        run_pass(
            instance,
            &states,
            [
                instance.component().state_updaters(),
                instance.options().state_updaters(),
            ],
            STATE_CHANGE,
        )?;
    }

    Ok(())
}

fn run_pass<V: Serialize>(
    instance: &Instance,
    changes: &Changes<V>,
    tables: [&UpdaterTable<V>; 2],
    event: &str,
) -> Result<()> {
    trace!(id = %instance.id(), event, keys = changes.len(), "delivering changes");

    for table in tables {
        for (key, record) in changes {
            let Some(updater) = table.get(key) else {
                continue;
            };
            updater(instance, &record.new_value, record.old_value.as_ref(), changes).map_err(
                |source| Error::Updater {
                    key: key.clone(),
                    source,
                },
            )?;
        }
    }

    if !instance.is_disposed() {
        instance.emit(event, changes_to_value(changes));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::{json, Value};
    use tracing_test::traced_test;

    use super::*;
    use crate::component::{ComponentType, Options};
    use crate::core::types::WriteOptions;
    use crate::runtime::Runtime;

    type Log = Rc<RefCell<Vec<String>>>;

    fn logging_type(log: &Log) -> ComponentType {
        let value_log = log.clone();
        let open_log = log.clone();
        ComponentType::builder("logged")
            .property_updater("value", move |_, new, old, _| {
                value_log
                    .borrow_mut()
                    .push(format!("value {:?} -> {}", old, new));
                Ok(())
            })
            .state_updater("open", move |_, new, _, _| {
                open_log.borrow_mut().push(format!("open {}", new));
                Ok(())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn nothing_pending_is_not_flushed() {
        let runtime = Runtime::new();
        let instance = runtime.create(&logging_type(&Log::default()), Options::new()).unwrap();

        assert!(!flush_instance(&instance).unwrap());
    }

    #[test]
    fn properties_before_states() {
        let log: Log = Rc::default();
        let runtime = Runtime::new();
        let instance = runtime.create(&logging_type(&log), Options::new()).unwrap();

        instance.state("open", true).unwrap();
        instance.set("value", 3).unwrap();
        assert!(flush_instance(&instance).unwrap());

        assert_eq!(
            *log.borrow(),
            vec!["value None -> 3".to_string(), "open true".into()]
        );
        assert!(!instance.has_pending_changes());
    }

    #[test]
    fn type_updaters_run_before_option_updaters() {
        let log: Log = Rc::default();
        let option_log = log.clone();
        let runtime = Runtime::new();
        let instance = runtime
            .create(
                &logging_type(&log),
                Options::new().with_property_updater("value", move |_, _, _, _| {
                    option_log.borrow_mut().push("option".into());
                    Ok(())
                }),
            )
            .unwrap();

        instance.set("value", 1).unwrap();
        flush_instance(&instance).unwrap();

        assert_eq!(*log.borrow(), vec!["value None -> 1".to_string(), "option".into()]);
    }

    #[test]
    fn updater_sees_whole_batch() {
        let seen = Rc::new(RefCell::new(Value::Null));
        let seen_clone = seen.clone();
        let component = ComponentType::builder("range")
            .property_updater("min", move |_, _, _, changes| {
                *seen_clone.borrow_mut() = changes_to_value(changes);
                Ok(())
            })
            .build()
            .unwrap();
        let runtime = Runtime::new();
        let instance = runtime.create(&component, Options::new()).unwrap();

        instance
            .set_many([("min", json!(0)), ("max", json!(10))], &WriteOptions::default())
            .unwrap();
        flush_instance(&instance).unwrap();

        assert_eq!(
            *seen.borrow(),
            json!({ "min": { "newValue": 0 }, "max": { "newValue": 10 } })
        );
    }

    #[test]
    fn event_carries_change_map() {
        let runtime = Runtime::new();
        let instance = runtime
            .create(&ComponentType::builder("plain").build().unwrap(), Options::new())
            .unwrap();
        let payload = Rc::new(RefCell::new(Value::Null));
        let payload_clone = payload.clone();
        instance
            .on(PROPERTY_CHANGE, move |e| *payload_clone.borrow_mut() = e.data().clone())
            .unwrap();

        instance.set("value", 1).unwrap();
        instance
            .set_with("value", 2, &WriteOptions::default().with_meta("source", "key"))
            .unwrap();
        flush_instance(&instance).unwrap();

        assert_eq!(
            *payload.borrow(),
            json!({ "value": { "newValue": 2, "source": "key" } })
        );
    }

    #[test]
    fn failing_updater_skips_event_and_state_pass() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let component = ComponentType::builder("fragile")
            .property_updater("value", |_, _, _, _| Err("bad value".into()))
            .build()
            .unwrap();
        let runtime = Runtime::new();
        let instance = runtime.create(&component, Options::new()).unwrap();
        for kind in [PROPERTY_CHANGE, STATE_CHANGE] {
            let events = events.clone();
            instance
                .on(kind, move |e| events.borrow_mut().push(e.kind().to_owned()))
                .unwrap();
        }

        instance.set("value", 1).unwrap();
        instance.state("open", true).unwrap();
        let err = flush_instance(&instance).unwrap_err();

        assert!(matches!(err, Error::Updater { ref key, .. } if key == "value"));
        assert!(events.borrow().is_empty());
        // State changes stay pending for the next tick
        assert!(instance.has_pending_changes());
    }

    #[test]
    fn writes_from_updaters_go_to_next_flush() {
        let component = ComponentType::builder("mirror")
            .property_updater("value", |instance, new, _, _| {
                instance.set("mirror", new.clone())?;
                Ok(())
            })
            .build()
            .unwrap();
        let runtime = Runtime::new();
        let instance = runtime.create(&component, Options::new()).unwrap();

        instance.set("value", 5).unwrap();
        flush_instance(&instance).unwrap();
        assert_eq!(instance.get("mirror"), Some(json!(5)));
        assert!(instance.has_pending_changes());

        flush_instance(&instance).unwrap();
        assert!(!instance.has_pending_changes());
    }

    #[test]
    fn flush_all_isolates_failures() {
        let component = ComponentType::builder("fragile")
            .property_updater("value", |_, _, _, _| Err("bad value".into()))
            .build()
            .unwrap();
        let plain = ComponentType::builder("plain").build().unwrap();
        let runtime = Runtime::new();
        let broken = runtime.create(&component, Options::new()).unwrap();
        let healthy = runtime.create(&plain, Options::new()).unwrap();

        broken.set("value", 1).unwrap();
        healthy.set("value", 1).unwrap();
        let report = flush_all(vec![broken, healthy.clone()]);

        assert_eq!(report.flushed, 2);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_clean());
        assert!(!healthy.has_pending_changes());
    }

    #[test]
    #[traced_test]
    fn updater_failure_is_logged() {
        let component = ComponentType::builder("fragile")
            .state_updater("open", |_, _, _, _| Err("cannot open".into()))
            .build()
            .unwrap();
        let runtime = Runtime::new();
        let instance = runtime.create(&component, Options::new()).unwrap();

        instance.state("open", true).unwrap();
        let report = flush_all(vec![instance]);

        assert_eq!(report.errors.len(), 1);
        assert!(logs_contain("flush aborted for instance"));
        assert!(logs_contain("updater for `open` failed"));
    }
}
