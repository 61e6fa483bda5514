// ============================================================================
// spark-components - Ergonomic Macros
// ============================================================================

/// Clone variables into a move closure.
///
/// Listeners, updaters and operation bodies are `'static` closures; this
/// saves the `let x = x.clone();` lines before each one.
///
/// # Usage
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use spark_components::{cloned, ComponentType, Options, Runtime};
///
/// let opened = Rc::new(Cell::new(0));
/// let runtime = Runtime::new();
/// let dialog = ComponentType::builder("dialog").build().unwrap();
/// let instance = runtime.create(&dialog, Options::new()).unwrap();
///
/// instance
///     .on("open", cloned!(opened => move |_| opened.set(opened.get() + 1)))
///     .unwrap();
/// instance.emit("open", serde_json::Value::Null);
/// assert_eq!(opened.get(), 1);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}
