//! Callable types
//!
//! A callable pairs a script function with the context used to run it and
//! exposes one call surface for free functions and bound methods alike.
//!
//! # Example
//!
//! ```ignore
//! use scripthook_engine::{args, CallFlags, Callable, FunctionCall};
//!
//! let call = FunctionCall::new(&function, &*context);
//! call.call(CallFlags::empty(), (player_index, "spawned"))?;
//! let handled: i32 = call.return_value_as()?;
//! ```

use bitflags::bitflags;
use scripthook_sdk::{ExecutionState, FunctionRef, ObjectRef, ScriptContext, ScriptValue, TYPEID_VOID};

use crate::arguments::{Arguments, FromScriptValue, IntoArguments};
use crate::error::{CallError, CallStage};

bitflags! {
    /// Flags that affect function calls
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CallFlags: u32 {
        /// Don't log script exceptions raised by the call
        const QUIET = 0x01;
    }
}

/// A function paired with the context that will execute it
///
/// The stage hooks let an implementation validate itself while a call is in
/// progress; any hook returning `false` aborts the call.
pub trait Callable {
    fn function(&self) -> &FunctionRef;

    fn context(&self) -> &dyn ScriptContext;

    /// Whether this callable can be called at all
    fn is_valid(&self) -> bool {
        true
    }

    /// Called after the context is prepared, before arguments are set
    fn pre_set_arguments(&self) -> bool {
        true
    }

    /// Called after arguments are set, before execution
    fn pre_execute(&self) -> bool {
        true
    }

    /// Called after execution with the resulting state
    fn post_execute(&self, _state: &ExecutionState) -> bool {
        true
    }

    /// Call with positional arguments
    fn call(&self, flags: CallFlags, args: impl IntoArguments) -> Result<(), CallError>
    where
        Self: Sized,
    {
        let args = args.into_arguments();
        invoke(self, flags, args.as_slice())
    }

    /// Call with a forwarded argument list
    fn call_slice(&self, flags: CallFlags, args: &[ScriptValue]) -> Result<(), CallError> {
        invoke(self, flags, args)
    }

    /// Call with a prebuilt argument list
    fn call_args(&self, flags: CallFlags, args: &Arguments) -> Result<(), CallError> {
        invoke(self, flags, args.as_slice())
    }

    /// Value returned by the last call, read as the function's declared
    /// return type
    fn return_value(&self) -> Result<ScriptValue, CallError> {
        let function = self.function();
        let type_id = function.return_type_id();

        if type_id == TYPEID_VOID {
            return Ok(ScriptValue::Void);
        }

        self.context()
            .return_value(type_id)
            .ok_or_else(|| CallError::ReturnValue {
                function: function.declaration(),
                type_id,
            })
    }

    /// Return value converted to `T`
    fn return_value_as<T: FromScriptValue>(&self) -> Result<T, CallError>
    where
        Self: Sized,
    {
        let value = self.return_value()?;
        let found = value.kind();
        T::from_script_value(value).ok_or(CallError::ReturnType {
            expected: T::KIND,
            found,
        })
    }
}

/// A free function
pub struct FunctionCall<'a> {
    function: &'a FunctionRef,
    context: &'a dyn ScriptContext,
}

impl<'a> FunctionCall<'a> {
    pub fn new(function: &'a FunctionRef, context: &'a dyn ScriptContext) -> Self {
        Self { function, context }
    }
}

impl Callable for FunctionCall<'_> {
    fn function(&self) -> &FunctionRef {
        self.function
    }

    fn context(&self) -> &dyn ScriptContext {
        self.context
    }
}

/// An object method bound to a receiver
pub struct MethodCall<'a> {
    function: &'a FunctionRef,
    context: &'a dyn ScriptContext,
    this: Option<&'a ObjectRef>,
}

impl<'a> MethodCall<'a> {
    pub fn new(
        function: &'a FunctionRef,
        context: &'a dyn ScriptContext,
        this: Option<&'a ObjectRef>,
    ) -> Self {
        Self {
            function,
            context,
            this,
        }
    }
}

impl Callable for MethodCall<'_> {
    fn function(&self) -> &FunctionRef {
        self.function
    }

    fn context(&self) -> &dyn ScriptContext {
        self.context
    }

    fn is_valid(&self) -> bool {
        self.this.is_some()
    }

    fn pre_set_arguments(&self) -> bool {
        let Some(this) = self.this else {
            return false;
        };

        match self.context.set_object(this) {
            Ok(()) => true,
            Err(code) => {
                tracing::error!(
                    "Failed to set receiver for '{}': {}",
                    self.function.declaration(),
                    code
                );
                false
            }
        }
    }
}

/// Push arguments into the call frame, execute, and collect the outcome.
///
/// Every call path funnels through here.
pub(crate) fn invoke<C>(callable: &C, flags: CallFlags, args: &[ScriptValue]) -> Result<(), CallError>
where
    C: Callable + ?Sized,
{
    let function = callable.function();

    if !callable.is_valid() {
        return Err(CallError::InvalidCallable(function.declaration()));
    }

    let context = callable.context();

    context.prepare(function).map_err(|code| CallError::Prepare {
        function: function.declaration(),
        code,
    })?;

    if !callable.pre_set_arguments() {
        return Err(CallError::Rejected {
            function: function.declaration(),
            stage: CallStage::SetArguments,
        });
    }

    let expected = function.param_count();
    if expected != args.len() {
        return Err(CallError::ArgumentCount {
            function: function.declaration(),
            expected,
            actual: args.len(),
        });
    }

    for (index, value) in args.iter().enumerate() {
        context
            .set_arg(index, value)
            .map_err(|code| CallError::Argument {
                function: function.declaration(),
                index,
                kind: value.kind(),
                code,
            })?;
    }

    if !callable.pre_execute() {
        return Err(CallError::Rejected {
            function: function.declaration(),
            stage: CallStage::Execute,
        });
    }

    let state = context.execute();

    if !callable.post_execute(&state) {
        return Err(CallError::Rejected {
            function: function.declaration(),
            stage: CallStage::Completion,
        });
    }

    match state {
        ExecutionState::Finished => Ok(()),
        ExecutionState::Exception(message) => {
            if !flags.contains(CallFlags::QUIET) {
                tracing::warn!(
                    "Script exception in '{}': {}",
                    function.declaration(),
                    message
                );
            }
            Err(CallError::Exception {
                function: function.declaration(),
                message,
            })
        }
        state => Err(CallError::Execution {
            function: function.declaration(),
            state,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scripthook_sdk::{ScriptEngine, TYPEID_INT32};

    use super::*;
    use crate::mock::{MockEngine, MockFunction};

    #[test]
    fn test_function_call_passes_arguments() {
        let engine = MockEngine::new();
        let function: FunctionRef = MockFunction::builder(&engine, "Add")
            .params(&[TYPEID_INT32, TYPEID_INT32])
            .return_type(TYPEID_INT32)
            .returns(ScriptValue::Int32(7))
            .build();
        let context = engine.request_context().unwrap();

        let call = FunctionCall::new(&function, &*context);
        call.call(CallFlags::empty(), (3i32, 4i32)).unwrap();

        assert_eq!(call.return_value_as::<i32>().unwrap(), 7);
        let mock = engine.mock_function(&function).unwrap();
        assert_eq!(mock.calls(), 1);
        assert!(matches!(
            mock.last_args().as_slice(),
            [ScriptValue::Int32(3), ScriptValue::Int32(4)]
        ));

        engine.return_context(context);
    }

    #[test]
    fn test_argument_count_mismatch() {
        let engine = MockEngine::new();
        let function: FunctionRef = MockFunction::builder(&engine, "Unary")
            .params(&[TYPEID_INT32])
            .build();
        let context = engine.request_context().unwrap();

        let call = FunctionCall::new(&function, &*context);
        let err = call.call(CallFlags::empty(), ()).unwrap_err();

        assert!(matches!(err, CallError::ArgumentCount { expected: 1, actual: 0, .. }));
        assert_eq!(engine.mock_function(&function).unwrap().calls(), 0);
        engine.return_context(context);
    }

    #[test]
    fn test_argument_type_mismatch_aborts() {
        let engine = MockEngine::new();
        let function: FunctionRef = MockFunction::builder(&engine, "TakesInt")
            .params(&[TYPEID_INT32])
            .build();
        let context = engine.request_context().unwrap();

        let call = FunctionCall::new(&function, &*context);
        let err = call.call_slice(CallFlags::empty(), &[ScriptValue::Bool(true)]).unwrap_err();

        assert!(matches!(err, CallError::Argument { index: 0, kind: "bool", .. }));
        assert_eq!(engine.mock_function(&function).unwrap().calls(), 0);
        engine.return_context(context);
    }

    #[test]
    fn test_exception_is_an_error() {
        let engine = MockEngine::new();
        let function: FunctionRef = MockFunction::builder(&engine, "Throws")
            .throws("null pointer access")
            .build();
        let context = engine.request_context().unwrap();

        let call = FunctionCall::new(&function, &*context);
        let err = call.call(CallFlags::QUIET, ()).unwrap_err();

        assert!(matches!(err, CallError::Exception { ref message, .. } if message == "null pointer access"));
        engine.return_context(context);
    }

    #[test]
    fn test_method_requires_receiver() {
        let engine = MockEngine::new();
        let function: FunctionRef = MockFunction::builder(&engine, "Think").build();
        let context = engine.request_context().unwrap();

        let method = MethodCall::new(&function, &*context, None);
        assert!(!method.is_valid());
        let err = method.call(CallFlags::empty(), ()).unwrap_err();
        assert!(matches!(err, CallError::InvalidCallable(_)));
        assert_eq!(engine.mock_function(&function).unwrap().calls(), 0);

        let this: ObjectRef = Arc::new(42u32);
        let method = MethodCall::new(&function, &*context, Some(&this));
        method.call(CallFlags::empty(), ()).unwrap();

        let mock = engine.mock_function(&function).unwrap();
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.last_receiver::<u32>().map(|v| *v), Some(42));
        engine.return_context(context);
    }

    #[test]
    fn test_void_return_value() {
        let engine = MockEngine::new();
        let function: FunctionRef = MockFunction::builder(&engine, "Nothing").build();
        let context = engine.request_context().unwrap();

        let call = FunctionCall::new(&function, &*context);
        call.call(CallFlags::empty(), ()).unwrap();

        assert!(call.return_value().unwrap().is_void());
        assert!(matches!(
            call.return_value_as::<i32>(),
            Err(CallError::ReturnType { expected: "int32", found: "void" })
        ));
        engine.return_context(context);
    }

    struct RejectingCall<'a> {
        inner: FunctionCall<'a>,
    }

    impl Callable for RejectingCall<'_> {
        fn function(&self) -> &FunctionRef {
            self.inner.function()
        }

        fn context(&self) -> &dyn ScriptContext {
            self.inner.context()
        }

        fn pre_execute(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_stage_rejection_skips_execution() {
        let engine = MockEngine::new();
        let function: FunctionRef = MockFunction::builder(&engine, "Never").build();
        let context = engine.request_context().unwrap();

        let call = RejectingCall {
            inner: FunctionCall::new(&function, &*context),
        };
        let err = call.call(CallFlags::empty(), ()).unwrap_err();

        assert!(matches!(err, CallError::Rejected { stage: CallStage::Execute, .. }));
        assert_eq!(engine.mock_function(&function).unwrap().calls(), 0);
        engine.return_context(context);
    }
}
