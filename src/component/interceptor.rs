// ============================================================================
// spark-components - Method Interception
// precheck → before<op> → body → (await) → postcheck → after<op>
// ============================================================================

use serde_json::Value;
use tracing::{trace, warn};

use super::instance::Instance;
use super::operation::{Completion, Gate, Invocation, Operation};
use crate::core::constants::{after_event, before_event};
use crate::core::error::{Error, Result};
use crate::core::types::Args;

type PhaseFn = Box<dyn FnOnce(&Instance)>;

/// Extra steps spliced into the protocol. Used by `dispose`.
#[derive(Default)]
pub(crate) struct Phases {
    /// Runs right after the body returned successfully (before awaiting).
    pub after_body: Option<PhaseFn>,
    /// Runs once the after-event step is over, whether or not it fired.
    pub settled: Option<PhaseFn>,
}

/// Run one intercepted call.
pub(crate) fn run(
    instance: &Instance,
    operation: &Operation,
    args: &Args,
    phases: Phases,
) -> Result<Invocation> {
    instance.ensure_live()?;
    let name = operation.name();

    // 1. Pre-check: a silent precondition failure is not an error
    let payload = match operation.precheck_hook() {
        Some(precheck) => match precheck(instance, args) {
            Gate::Halt => {
                trace!(id = %instance.id(), op = name, "precondition failed");
                return Ok(Invocation::PreconditionFailed);
            }
            Gate::Proceed => Value::Null,
            Gate::ProceedWith(payload) => payload,
        },
        None => Value::Null,
    };

    // 2. Cancellable before-event
    let before = instance.emit(&before_event(name), payload);
    if before.is_default_prevented() {
        trace!(id = %instance.id(), op = name, "cancelled by before listener");
        return Ok(Invocation::Cancelled);
    }
    // A before listener may have torn the instance down
    if instance.is_disposed() {
        trace!(id = %instance.id(), op = name, "disposed by before listener");
        return Ok(Invocation::Cancelled);
    }

    // 3. Body
    let completion = match operation.body() {
        Some(body) => body(instance, args).map_err(|source| Error::Operation {
            name: name.to_owned(),
            source,
        })?,
        None => Completion::done(),
    };

    let Phases {
        after_body,
        settled,
    } = phases;
    if let Some(step) = after_body {
        step(instance);
    }

    // 4. Completion: now, or when the awaitable resolves
    match completion {
        Completion::Ready(value) => {
            let notified = notify_after(instance, operation, args);
            if let Some(step) = settled {
                step(instance);
            }
            trace!(id = %instance.id(), op = name, notified, "completed");
            Ok(Invocation::Completed { value, notified })
        }
        Completion::Pending(future) => {
            let id = instance.id();
            let Some(runtime) = instance.runtime() else {
                warn!(id = %id, op = name, "runtime dropped, deferred completion discarded");
                drop(future);
                if let Some(step) = settled {
                    step(instance);
                }
                return Ok(Invocation::Deferred);
            };

            let instance = instance.clone();
            let operation = operation.clone();
            let args = args.to_vec();
            runtime.spawn(async move {
                let outcome = match future.await {
                    Ok(_) => {
                        let notified = notify_after(&instance, &operation, &args);
                        trace!(id = %instance.id(), op = operation.name(), notified, "deferred completion");
                        Ok(())
                    }
                    Err(source) => {
                        warn!(id = %instance.id(), op = operation.name(), error = %source, "deferred operation failed");
                        Err(Error::Operation {
                            name: operation.name().to_owned(),
                            source,
                        })
                    }
                };
                if let Some(step) = settled {
                    step(&instance);
                }
                outcome
            });

            trace!(id = %id, op = name, "deferred");
            Ok(Invocation::Deferred)
        }
    }
}

/// Steps 5 and 6: post-hook, then the after-event unless suppressed.
fn notify_after(instance: &Instance, operation: &Operation, args: &Args) -> bool {
    if instance.is_disposed() {
        return false;
    }

    let payload = match operation.postcheck_hook() {
        Some(postcheck) => match postcheck(instance, args) {
            Gate::Halt => return false,
            Gate::Proceed => Value::Null,
            Gate::ProceedWith(payload) => payload,
        },
        None => Value::Null,
    };

    instance.emit(&after_event(operation.name()), payload);
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use crate::component::{ComponentType, Completion, Gate, Invocation, Operation, Options};
    use crate::core::ids::SequentialIds;
    use crate::runtime::Runtime;

    type Log = Rc<RefCell<Vec<String>>>;

    fn dialog(log: &Log) -> ComponentType {
        let body_log = log.clone();
        let post_log = log.clone();
        ComponentType::builder("dialog")
            .operation(
                Operation::new("open", move |_, _| {
                    body_log.borrow_mut().push("body".into());
                    Ok(Completion::ready("opened"))
                })
                .precheck(|instance, _| {
                    if instance.is("locked") {
                        Gate::Halt
                    } else {
                        Gate::ProceedWith(json!({ "reason": "x" }))
                    }
                })
                .postcheck(move |instance, _| {
                    post_log.borrow_mut().push("post".into());
                    if instance.is("quiet") { Gate::Halt } else { Gate::Proceed }
                }),
            )
            .build()
            .unwrap()
    }

    fn listen(instance: &crate::Instance, log: &Log) {
        for kind in ["beforeopen", "afteropen"] {
            let log = log.clone();
            instance
                .on(kind, move |e| log.borrow_mut().push(format!("{}:{}", e.kind(), e.data())))
                .unwrap();
        }
    }

    #[test]
    fn full_sequence_in_order() {
        let log: Log = Rc::default();
        let runtime = Runtime::builder().ids(SequentialIds::new()).build();
        let instance = runtime.create(&dialog(&log), Options::new()).unwrap();
        listen(&instance, &log);

        let outcome = instance.invoke("open", &[]).unwrap();

        assert_eq!(
            outcome,
            Invocation::Completed {
                value: json!("opened"),
                notified: true
            }
        );
        assert_eq!(
            *log.borrow(),
            vec![
                r#"beforeopen:{"reason":"x"}"#.to_string(),
                "body".into(),
                "post".into(),
                "afteropen:null".into(),
            ]
        );
    }

    #[test]
    fn halted_precheck_skips_everything() {
        let log: Log = Rc::default();
        let runtime = Runtime::new();
        let instance = runtime.create(&dialog(&log), Options::new()).unwrap();
        listen(&instance, &log);
        instance.state("locked", true).unwrap();

        assert_eq!(instance.invoke("open", &[]).unwrap(), Invocation::PreconditionFailed);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn prevented_before_event_cancels_body() {
        let log: Log = Rc::default();
        let runtime = Runtime::new();
        let instance = runtime.create(&dialog(&log), Options::new()).unwrap();
        instance.before("open", |e| e.prevent_default()).unwrap();
        listen(&instance, &log);

        assert_eq!(instance.invoke("open", &[]).unwrap(), Invocation::Cancelled);
        assert_eq!(*log.borrow(), vec![r#"beforeopen:{"reason":"x"}"#.to_string()]);
    }

    #[test]
    fn option_callback_returning_false_cancels() {
        let log: Log = Rc::default();
        let runtime = Runtime::new();
        let instance = runtime
            .create(
                &dialog(&log),
                Options::new().with_callback("onbeforeopen", |_, _| json!(false)),
            )
            .unwrap();

        assert_eq!(instance.invoke("open", &[]).unwrap(), Invocation::Cancelled);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn halted_postcheck_suppresses_after_event_only() {
        let log: Log = Rc::default();
        let runtime = Runtime::new();
        let instance = runtime.create(&dialog(&log), Options::new()).unwrap();
        listen(&instance, &log);
        instance.state("quiet", true).unwrap();

        let outcome = instance.invoke("open", &[]).unwrap();
        assert_eq!(
            outcome,
            Invocation::Completed {
                value: json!("opened"),
                notified: false
            }
        );
        assert!(log.borrow().contains(&"body".to_string()));
        assert!(!log.borrow().iter().any(|entry| entry.starts_with("afteropen")));
    }

    #[test]
    fn failing_body_propagates_without_after_event() {
        let component = ComponentType::builder("broken")
            .operation(Operation::new("render", |_, _| Err("no template".into())))
            .build()
            .unwrap();
        let runtime = Runtime::new();
        let instance = runtime.create(&component, Options::new()).unwrap();
        let after = Rc::new(RefCell::new(0));
        let after_clone = after.clone();
        instance
            .after("render", move |_| *after_clone.borrow_mut() += 1)
            .unwrap();

        let err = instance.invoke("render", &[]).unwrap_err();
        assert_eq!(err.to_string(), "operation `render` failed");
        assert_eq!(*after.borrow(), 0);
    }

    #[test]
    fn deferred_dispose_without_runtime_still_releases() {
        let component = ComponentType::builder("fading")
            .operation(Operation::new("dispose", |_, _| {
                Ok(Completion::pending(async { Ok::<_, crate::BoxError>(json!(null)) }))
            }))
            .build()
            .unwrap();
        let runtime = Runtime::new();
        let instance = runtime.create(&component, Options::new()).unwrap();
        instance.set("label", "x").unwrap();
        drop(runtime);

        assert!(instance.runtime().is_none());
        assert_eq!(instance.dispose().unwrap(), Invocation::Deferred);
        assert!(instance.is_disposed());
        assert!(!instance.is_disposing());
        assert_eq!(instance.get("label"), None);
    }
}
