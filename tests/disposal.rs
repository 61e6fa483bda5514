use serde_json::json;
use spark_components::{
    cloned, Completion, ComponentType, Invocation, Operation, Options, Runtime,
};
use std::cell::RefCell;
use std::rc::Rc;

fn widget() -> ComponentType {
    ComponentType::builder("widget").build().unwrap()
}

#[test]
fn test_dispose_removes_from_registry() {
    let runtime = Runtime::new();
    let instance = runtime.create(&widget(), Options::new()).unwrap();
    let id = instance.id();

    let outcome = instance.dispose().unwrap();

    assert!(matches!(outcome, Invocation::Completed { notified: true, .. }));
    assert!(!runtime.contains(id));
    assert!(runtime.get(id).is_none());
    assert!(instance.is_disposed());
    assert!(!instance.is_registered());
}

#[test]
fn test_afterdispose_handler_sees_intact_instance() {
    let seen = Rc::new(RefCell::new(None));
    let runtime = Runtime::new();
    let instance = runtime.create(&widget(), Options::new()).unwrap();
    instance.set("label", "ok").unwrap();
    instance.state("open", true).unwrap();
    instance.set_inner("main", "#w").unwrap();

    let handle = instance.downgrade();
    instance
        .after("dispose", cloned!(seen, runtime => move |_| {
            let instance = handle.upgrade().unwrap();
            *seen.borrow_mut() = Some((
                instance.get("label"),
                instance.is("open"),
                instance.inner("main"),
                instance.is_disposed(),
                runtime.contains(instance.id()),
            ));
        }))
        .unwrap();

    instance.dispose().unwrap();

    assert_eq!(
        *seen.borrow(),
        Some((Some(json!("ok")), true, Some(json!("#w")), false, false))
    );
    assert_eq!(instance.get("label"), None);
    assert_eq!(instance.listener_count("afterdispose"), 0);
}

#[test]
fn test_cancelled_dispose_leaves_instance_alive() {
    let runtime = Runtime::new();
    let instance = runtime
        .create(
            &widget(),
            Options::new().with_callback("onBeforeDispose", |_, _| json!(false)),
        )
        .unwrap();
    instance.set("label", "keep").unwrap();

    assert_eq!(instance.dispose().unwrap(), Invocation::Cancelled);
    assert!(runtime.contains(instance.id()));
    assert!(!instance.is_disposed());
    assert_eq!(instance.get("label"), Some(json!("keep")));
}

#[test]
fn test_declared_dispose_body_runs_before_teardown() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let component = ComponentType::builder("timer-widget")
        .operation(Operation::new(
            "dispose",
            cloned!(log => move |instance, _| {
                log.borrow_mut().push(format!(
                    "body registered={} timer={}",
                    instance.is_registered(),
                    instance.inner("timer").unwrap_or_default()
                ));
                Ok(Completion::done())
            }),
        ))
        .build()
        .unwrap();
    let runtime = Runtime::new();
    let instance = runtime.create(&component, Options::new()).unwrap();
    instance.set_inner("timer", 7).unwrap();

    instance.dispose().unwrap();

    assert_eq!(*log.borrow(), vec!["body registered=true timer=7".to_string()]);
    assert!(runtime.is_empty());
}

#[test]
fn test_pending_changes_are_dropped_on_dispose() {
    let delivered = Rc::new(RefCell::new(0));
    let runtime = Runtime::new();
    let instance = runtime.create(&widget(), Options::new()).unwrap();
    instance
        .on("propertychange", cloned!(delivered => move |_| *delivered.borrow_mut() += 1))
        .unwrap();

    instance.set("label", "x").unwrap();
    instance.dispose().unwrap();
    runtime.run_until_idle().unwrap();

    assert_eq!(*delivered.borrow(), 0);
}

#[test]
fn test_use_after_dispose_is_an_error() {
    let runtime = Runtime::new();
    let instance = runtime.create(&widget(), Options::new()).unwrap();
    instance.dispose().unwrap();

    assert!(instance.set("label", 1).unwrap_err().is_disposed());
    assert!(instance.invoke("dispose", &[]).unwrap_err().is_disposed());
    assert_eq!(instance.get("label"), None);
}

#[test]
fn test_nested_dispose_from_before_listener_is_refused() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let component = ComponentType::builder("guarded")
        .operation(Operation::new(
            "dispose",
            cloned!(log => move |instance, _| {
                log.borrow_mut().push(format!("body disposed={}", instance.is_disposed()));
                Ok(Completion::done())
            }),
        ))
        .build()
        .unwrap();
    let runtime = Runtime::new();
    let instance = runtime.create(&component, Options::new()).unwrap();
    let nested = Rc::new(RefCell::new(Vec::new()));
    let handle = instance.downgrade();
    instance
        .before("dispose", cloned!(nested => move |_| {
            if let Some(instance) = handle.upgrade() {
                nested.borrow_mut().push(instance.dispose().unwrap());
            }
        }))
        .unwrap();

    let outcome = instance.dispose().unwrap();

    assert!(matches!(outcome, Invocation::Completed { notified: true, .. }));
    assert_eq!(*nested.borrow(), vec![Invocation::PreconditionFailed]);
    assert_eq!(*log.borrow(), vec!["body disposed=false".to_string()]);
    assert!(instance.is_disposed());
    assert!(runtime.is_empty());
}

#[test]
fn test_nested_dispose_from_body_is_refused() {
    let nested = Rc::new(RefCell::new(None));
    let component = ComponentType::builder("self-disposing")
        .operation(Operation::new(
            "dispose",
            cloned!(nested => move |instance, _| {
                *nested.borrow_mut() = Some(instance.dispose()?);
                Ok(Completion::done())
            }),
        ))
        .build()
        .unwrap();
    let runtime = Runtime::new();
    let instance = runtime.create(&component, Options::new()).unwrap();

    assert!(instance.dispose().unwrap().proceeded());
    assert_eq!(*nested.borrow(), Some(Invocation::PreconditionFailed));
    assert!(instance.is_disposed());
}

#[test]
fn test_cancelled_dispose_can_be_retried() {
    let runtime = Runtime::new();
    let instance = runtime.create(&widget(), Options::new()).unwrap();
    let allow = Rc::new(RefCell::new(false));
    instance
        .before("dispose", cloned!(allow => move |e| {
            if !*allow.borrow() {
                e.prevent_default();
            }
        }))
        .unwrap();

    assert_eq!(instance.dispose().unwrap(), Invocation::Cancelled);
    assert!(!instance.is_disposing());

    *allow.borrow_mut() = true;
    assert!(instance.dispose().unwrap().proceeded());
    assert!(instance.is_disposed());
}

#[test]
fn test_execute_resolves_dispose_without_declared_operation() {
    let runtime = Runtime::new();
    let instance = runtime.create(&widget(), Options::new()).unwrap();

    assert_eq!(instance.execute("dispose", &[]).unwrap(), Some(json!(null)));
    assert!(instance.is_disposed());
    assert!(runtime.is_empty());
}
