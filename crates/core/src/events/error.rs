//! Event system errors

use scripthook_sdk::{ErrorCode, TypeId};

/// Errors from hooking functions and managing events
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The hooked value's type id is not known to the engine
    #[error("Unknown type id {0:#x}")]
    UnknownType(TypeId),

    /// The hooked value is not a function or delegate
    #[error("Object of type '{0}' is not a function or delegate")]
    NotAFunction(String),

    #[error("Object is null")]
    NullObject,

    /// The function's signature doesn't match the event's hook signature
    #[error("{target} is incompatible with event '{event}'")]
    Incompatible { target: String, event: String },

    /// The event has no hook signature yet
    #[error("Event '{0}' has not been registered with the engine")]
    NotRegistered(String),

    /// Hooks can't be added or removed while the event is being dispatched
    #[error("Event '{0}' is being invoked")]
    InvocationInProgress(String),

    #[error("Couldn't find event \"{0}\"")]
    EventNotFound(String),

    #[error("Maximum number of events reached")]
    TooManyEvents,

    /// The engine rejected a registration
    #[error("Failed to register {what}: {code}")]
    Registration { what: String, code: ErrorCode },
}

impl EventError {
    pub(crate) fn registration(what: impl Into<String>) -> impl FnOnce(ErrorCode) -> Self {
        let what = what.into();
        move |code| Self::Registration { what, code }
    }
}
