// ============================================================================
// spark-components - Operation Descriptors
// An interceptable operation: body plus optional pre-check and post-hook
// ============================================================================
//
// Every operation goes through the same protocol (see `interceptor`):
//
//   precheck ──Halt──► PreconditionFailed
//      │
//   before<op> ──prevent_default──► Cancelled
//      │
//   body ──Ready──► postcheck ──► after<op>        (Completed)
//      └──Pending─► (await) ─► postcheck ─► after<op>   (Deferred)
//
// The descriptor replaces naming conventions: hooks are fields, not
// methods discovered by name.
// ============================================================================

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;

use super::instance::Instance;
use crate::core::error::{BoxError, Error, Result};
use crate::core::types::Args;

// =============================================================================
// HOOK AND BODY RESULTS
// =============================================================================

/// Result of a pre-check or post-hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// Continue with no event payload.
    Proceed,
    /// Continue and use this value as the event payload.
    ProceedWith(Value),
    /// Pre-check: abort silently. Post-hook: suppress the after-event.
    Halt,
}

impl From<bool> for Gate {
    fn from(proceed: bool) -> Self {
        if proceed { Gate::Proceed } else { Gate::Halt }
    }
}

/// How an operation body finished.
pub enum Completion {
    /// Done synchronously with a return value.
    Ready(Value),
    /// Still running; the post-hook and after-event wait for this future.
    Pending(LocalBoxFuture<'static, Result<Value, BoxError>>),
}

impl Completion {
    /// Finished synchronously with no return value.
    pub fn done() -> Self {
        Completion::Ready(Value::Null)
    }

    /// Finished synchronously returning `value`.
    pub fn ready(value: impl Into<Value>) -> Self {
        Completion::Ready(value.into())
    }

    /// Finishes when `future` resolves.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, BoxError>> + 'static,
    {
        Completion::Pending(future.boxed_local())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Completion::Pending(_))
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Completion::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Operation body.
pub type Body = Rc<dyn Fn(&Instance, &Args) -> Result<Completion, BoxError>>;

/// Pre-check / post-hook.
pub type Hook = Rc<dyn Fn(&Instance, &Args) -> Gate>;

// =============================================================================
// INVOCATION
// =============================================================================

/// Outcome of one intercepted call.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The pre-check halted. Nothing ran, no event fired.
    PreconditionFailed,
    /// A `before` listener prevented the default action. The body did not run.
    Cancelled,
    /// The body finished synchronously. `notified` is false when the
    /// post-hook suppressed the after-event.
    Completed { value: Value, notified: bool },
    /// The body returned a pending completion; the after-event fires when
    /// the runtime drives it to completion.
    Deferred,
}

impl Invocation {
    /// True when the body ran (or is running).
    pub fn proceeded(&self) -> bool {
        matches!(self, Invocation::Completed { .. } | Invocation::Deferred)
    }

    /// Value as seen by `execute`: the body's return value, `false` for an
    /// aborted call, `null` for a deferred one.
    pub fn into_value(self) -> Value {
        match self {
            Invocation::PreconditionFailed | Invocation::Cancelled => Value::Bool(false),
            Invocation::Completed { value, .. } => value,
            Invocation::Deferred => Value::Null,
        }
    }
}

// =============================================================================
// OPERATION
// =============================================================================

/// Descriptor of one interceptable operation.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use spark_components::{Completion, Gate, Operation};
///
/// let open = Operation::new("open", |instance, _args| {
///     instance.state("opened", true)?;
///     Ok(Completion::done())
/// })
/// .precheck(|instance, _args| {
///     if instance.is("opened") { Gate::Halt } else { Gate::ProceedWith(json!({ "reason": "user" })) }
/// });
///
/// assert_eq!(open.name(), "open");
/// assert!(open.has_precheck());
/// ```
#[derive(Clone)]
pub struct Operation {
    name: String,
    body: Option<Body>,
    precheck: Option<Hook>,
    postcheck: Option<Hook>,
}

impl Operation {
    /// Create an operation with a body.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Instance, &Args) -> Result<Completion, BoxError> + 'static,
    {
        Self {
            name: name.into(),
            body: Some(Rc::new(body)),
            precheck: None,
            postcheck: None,
        }
    }

    /// Create an operation whose body does nothing. Useful for `dispose`
    /// when only the hooks matter.
    pub fn hooks_only(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: None,
            precheck: None,
            postcheck: None,
        }
    }

    /// Gate the operation. `Halt` aborts silently; `ProceedWith` sets the
    /// before-event payload.
    pub fn precheck<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance, &Args) -> Gate + 'static,
    {
        self.precheck = Some(Rc::new(hook));
        self
    }

    /// Observe completion. `Halt` suppresses the after-event; `ProceedWith`
    /// sets its payload.
    pub fn postcheck<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance, &Args) -> Gate + 'static,
    {
        self.postcheck = Some(Rc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_precheck(&self) -> bool {
        self.precheck.is_some()
    }

    pub fn has_postcheck(&self) -> bool {
        self.postcheck.is_some()
    }

    pub(crate) fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub(crate) fn precheck_hook(&self) -> Option<&Hook> {
        self.precheck.as_ref()
    }

    pub(crate) fn postcheck_hook(&self) -> Option<&Hook> {
        self.postcheck.as_ref()
    }

    /// Names starting or ending with `_` are reserved for hooks.
    pub(crate) fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() || name.starts_with('_') || name.ends_with('_') {
            return Err(Error::InvalidOperationName {
                name: name.to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("body", &self.body.is_some())
            .field("precheck", &self.precheck.is_some())
            .field("postcheck", &self.postcheck.is_some())
            .finish()
    }
}
