//! scripthook Engine - Callables and Call Dispatch
//!
//! This crate handles:
//! - Wrapping script functions and bound methods as [`Callable`]s
//! - Marshalling typed [`Arguments`] into the engine calling convention
//! - Borrowing execution contexts from the engine pool ([`OwningContext`])
//!
//! # Architecture
//!
//! Every call, whatever its argument source, funnels into one path:
//! prepare the context, run the callable's stage hooks, push each argument,
//! execute, and map the execution state to a [`CallError`].
//!
//! # Context Ownership
//!
//! Contexts borrowed from the pool are returned when the [`OwningContext`]
//! guard drops, including on failure.

pub mod arguments;
pub mod call;
pub mod callable;
pub mod context;
pub mod error;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use arguments::{Arguments, FromScriptValue, IntoArguments};
pub use call::{call_function, call_method};
pub use callable::{CallFlags, Callable, FunctionCall, MethodCall};
pub use context::{with_context, OwningContext};
pub use error::{CallError, CallStage};

// Re-exported for the `args!` macro
pub use scripthook_sdk::ScriptValue;
