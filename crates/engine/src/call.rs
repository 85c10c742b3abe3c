//! One-shot call helpers
//!
//! Call a function or method without building a callable by hand. When no
//! context is supplied, one is borrowed from the function's engine for the
//! duration of the call.

use scripthook_sdk::{FunctionRef, ObjectRef, ScriptContext, ScriptValue};

use crate::arguments::IntoArguments;
use crate::callable::{CallFlags, Callable, FunctionCall, MethodCall};
use crate::context::with_context;
use crate::error::CallError;

/// Call a free function, returning its return value
///
/// # Arguments
/// * `function` - Function to call
/// * `context` - Context to use; borrowed from the engine pool if `None`
/// * `flags` - Call flags
/// * `args` - Arguments for the function
pub fn call_function(
    function: &FunctionRef,
    context: Option<&dyn ScriptContext>,
    flags: CallFlags,
    args: impl IntoArguments,
) -> Result<ScriptValue, CallError> {
    let args = args.into_arguments();

    with_context(context, || function.engine(), |context| {
        let call = FunctionCall::new(function, context);
        call.call_args(flags, &args)?;
        call.return_value()
    })?
}

/// Call an object method, returning its return value
///
/// # Arguments
/// * `this` - Receiver object; the call fails if `None`
/// * `function` - Method to call
/// * `context` - Context to use; borrowed from the engine pool if `None`
/// * `flags` - Call flags
/// * `args` - Arguments for the method
pub fn call_method(
    this: Option<&ObjectRef>,
    function: &FunctionRef,
    context: Option<&dyn ScriptContext>,
    flags: CallFlags,
    args: impl IntoArguments,
) -> Result<ScriptValue, CallError> {
    let args = args.into_arguments();

    with_context(context, || function.engine(), |context| {
        let call = MethodCall::new(function, context, this);
        call.call_args(flags, &args)?;
        call.return_value()
    })?
}
