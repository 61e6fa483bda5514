// ============================================================================
// spark-components - Errors
// ============================================================================

use super::ids::InstanceId;

/// Error type produced by operation bodies, updaters and deferred completions.
///
/// Kept unsized-friendly and non-`Send`: everything in this crate lives on a
/// single logical thread.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Crate result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the component runtime.
///
/// A pre-hook returning `Halt` or a `before` listener calling
/// `prevent_default` is not an error; those come back as
/// [`Invocation`](crate::component::Invocation) values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A mutator or an operation was called on an instance after `dispose`.
    #[error("instance {id} has been disposed")]
    Disposed { id: InstanceId },

    /// `invoke` was called with a name the component type never declared.
    #[error("component `{component}` has no operation named `{name}`")]
    UnknownOperation { component: String, name: String },

    /// Operation names starting or ending with `_` are reserved for hooks.
    #[error("`{name}` is not a valid operation name")]
    InvalidOperationName { name: String },

    /// An operation body (or its awaitable completion) failed.
    #[error("operation `{name}` failed")]
    Operation {
        name: String,
        #[source]
        source: BoxError,
    },

    /// A property or state updater failed during a flush.
    #[error("updater for `{key}` failed")]
    Updater {
        key: String,
        #[source]
        source: BoxError,
    },

    /// `run_until_idle` kept finding new work after the configured round limit.
    #[error("changes did not settle after {rounds} flush rounds")]
    FlushLoop { rounds: usize },
}

impl Error {
    /// True for errors caused by touching an instance after teardown.
    pub fn is_disposed(&self) -> bool {
        matches!(self, Error::Disposed { .. })
    }
}
