//! Script engine interface definitions
//!
//! These traits describe the parts of the embedded engine the binding layer
//! consumes. A concrete engine binding implements them; nothing in this
//! workspace assumes a particular engine beyond this surface.
//!
//! Reference counting stays with the engine: [`ScriptFunction::add_ref`] and
//! [`ScriptFunction::release`] adjust the engine-side count and must be
//! paired by callers that retain functions.

use std::fmt;
use std::sync::Arc;

use crate::types::{TypeId, TypeInfo};
use crate::value::{ObjectRef, ScriptValue, VariableRef};

pub type EngineRef = Arc<dyn ScriptEngine>;
pub type FunctionRef = Arc<dyn ScriptFunction>;
pub type ModuleRef = Arc<dyn ScriptModule>;
pub type ContextRef = Arc<dyn ScriptContext>;

/// Negative engine return code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const ERROR: ErrorCode = ErrorCode(-1);
    pub const CONTEXT_ACTIVE: ErrorCode = ErrorCode(-2);
    pub const CONTEXT_NOT_FINISHED: ErrorCode = ErrorCode(-3);
    pub const CONTEXT_NOT_PREPARED: ErrorCode = ErrorCode(-4);
    pub const INVALID_ARG: ErrorCode = ErrorCode(-5);
    pub const NO_FUNCTION: ErrorCode = ErrorCode(-6);
    pub const NOT_SUPPORTED: ErrorCode = ErrorCode(-7);
    pub const INVALID_NAME: ErrorCode = ErrorCode(-8);
    pub const NAME_TAKEN: ErrorCode = ErrorCode(-9);
    pub const INVALID_DECLARATION: ErrorCode = ErrorCode(-10);
    pub const INVALID_OBJECT: ErrorCode = ErrorCode(-11);
    pub const INVALID_TYPE: ErrorCode = ErrorCode(-12);
    pub const ALREADY_REGISTERED: ErrorCode = ErrorCode(-13);
    pub const OUT_OF_MEMORY: ErrorCode = ErrorCode(-27);

    /// Symbolic name of the code, if known
    pub fn name(self) -> &'static str {
        match self.0 {
            -1 => "asERROR",
            -2 => "asCONTEXT_ACTIVE",
            -3 => "asCONTEXT_NOT_FINISHED",
            -4 => "asCONTEXT_NOT_PREPARED",
            -5 => "asINVALID_ARG",
            -6 => "asNO_FUNCTION",
            -7 => "asNOT_SUPPORTED",
            -8 => "asINVALID_NAME",
            -9 => "asNAME_TAKEN",
            -10 => "asINVALID_DECLARATION",
            -11 => "asINVALID_OBJECT",
            -12 => "asINVALID_TYPE",
            -13 => "asALREADY_REGISTERED",
            -27 => "asOUT_OF_MEMORY",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl std::error::Error for ErrorCode {}

/// Result type for engine calls
pub type ScriptResult<T> = Result<T, ErrorCode>;

/// Identity of a compiled script module
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub u64);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A compiled script module and its host-side descriptor data
pub trait ScriptModule: Send + Sync {
    fn id(&self) -> ModuleId;

    fn name(&self) -> &str;

    /// Access mask granted to code in this module
    fn access_mask(&self) -> u32;

    /// Ordering priority; higher runs first
    fn priority(&self) -> i32 {
        0
    }
}

/// A script function, funcdef signature, or delegate
pub trait ScriptFunction: Send + Sync {
    /// Engine that owns this function
    fn engine(&self) -> EngineRef;

    fn name(&self) -> &str;

    fn namespace(&self) -> &str;

    /// Full declaration, for diagnostics
    fn declaration(&self) -> String;

    /// Type id of this function's signature
    fn type_id(&self) -> TypeId;

    /// Module that declared the function. Delegates have none.
    fn module(&self) -> Option<ModuleRef>;

    fn param_count(&self) -> usize;

    fn param_type_id(&self, index: usize) -> Option<TypeId>;

    fn return_type_id(&self) -> TypeId;

    /// Bound method if this function is a delegate
    fn delegate_function(&self) -> Option<FunctionRef> {
        None
    }

    /// Type of the object bound by a delegate
    fn delegate_object_type(&self) -> Option<TypeInfo> {
        None
    }

    /// Whether a function with the given signature type id can be called
    /// through this function's signature
    fn is_compatible_with_type_id(&self, type_id: TypeId) -> bool;

    /// Increment the engine-side reference count, returning the new count
    fn add_ref(&self) -> i32;

    /// Decrement the engine-side reference count, returning the new count
    fn release(&self) -> i32;
}

/// State of a context after `execute`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionState {
    Finished,
    Suspended,
    Aborted,
    /// A script exception was raised
    Exception(String),
    Prepared,
    Uninitialized,
    Active,
    Error,
}

/// An execution context: the VM call state for one invocation
pub trait ScriptContext: Send + Sync {
    fn engine(&self) -> EngineRef;

    /// Prepare the context for calling `function`
    fn prepare(&self, function: &FunctionRef) -> ScriptResult<()>;

    /// Set the receiver for a method call
    fn set_object(&self, object: &ObjectRef) -> ScriptResult<()>;

    /// Set argument `index` of the prepared call
    fn set_arg(&self, index: usize, value: &ScriptValue) -> ScriptResult<()>;

    fn execute(&self) -> ExecutionState;

    /// Value returned by the last execution, read as `type_id`
    fn return_value(&self, type_id: TypeId) -> Option<ScriptValue>;

    fn unprepare(&self) -> ScriptResult<()>;
}

/// An argument passed through the generic calling convention
#[derive(Debug, Clone)]
pub enum GenericArg {
    Value(ScriptValue),
    Var(VariableRef),
}

/// Generic calling convention frame for native methods
pub struct GenericCall<'a> {
    /// Object the method was called on
    pub object: &'a ObjectRef,
    /// Module of the calling script, `None` when called from the host
    pub caller: Option<ModuleRef>,
    pub args: &'a [GenericArg],
    /// Set by the native method
    pub return_value: ScriptValue,
}

impl<'a> GenericCall<'a> {
    pub fn new(object: &'a ObjectRef, caller: Option<ModuleRef>, args: &'a [GenericArg]) -> Self {
        Self {
            object,
            caller,
            args,
            return_value: ScriptValue::Void,
        }
    }

    /// Value argument at `index`
    pub fn arg_value(&self, index: usize) -> Option<&ScriptValue> {
        match self.args.get(index) {
            Some(GenericArg::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Generic reference argument at `index`
    pub fn arg_var(&self, index: usize) -> Option<&VariableRef> {
        match self.args.get(index) {
            Some(GenericArg::Var(var)) => Some(var),
            _ => None,
        }
    }

    /// Downcast the called object
    pub fn object_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }
}

/// Native method bound through the generic calling convention
pub type NativeMethod = Arc<dyn Fn(&mut GenericCall<'_>) + Send + Sync>;

/// The script engine
pub trait ScriptEngine: Send + Sync {
    /// Resolve type metadata. Handle modifiers are ignored.
    fn type_info_by_id(&self, type_id: TypeId) -> Option<TypeInfo>;

    /// Borrow a context from the engine's pool
    fn request_context(&self) -> ScriptResult<ContextRef>;

    /// Return a context obtained from [`ScriptEngine::request_context`]
    fn return_context(&self, context: ContextRef);

    fn default_namespace(&self) -> String;

    fn set_default_namespace(&self, namespace: &str) -> ScriptResult<()>;

    /// Set the access mask applied to subsequent registrations, returning
    /// the previous mask
    fn set_default_access_mask(&self, mask: u32) -> u32;

    fn register_enum(&self, name: &str) -> ScriptResult<TypeId>;

    fn register_enum_value(&self, enum_name: &str, name: &str, value: i32) -> ScriptResult<()>;

    /// Register an application object type, returning its type id
    fn register_object_type(&self, name: &str, flags: u32) -> ScriptResult<TypeId>;

    fn register_object_method(
        &self,
        type_name: &str,
        declaration: &str,
        method: NativeMethod,
    ) -> ScriptResult<()>;

    fn register_global_property(&self, declaration: &str, object: ObjectRef) -> ScriptResult<()>;

    /// Register a funcdef in the current default namespace, returning its
    /// signature
    fn register_funcdef(&self, declaration: &str) -> ScriptResult<FunctionRef>;
}

/// Identity comparison for shared engine objects
pub fn same_object<T: ?Sized, U: ?Sized>(a: &Arc<T>, b: &Arc<U>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
