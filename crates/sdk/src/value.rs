//! Tagged script values and generic references
//!
//! [`ScriptValue`] replaces untyped argument marshalling: every argument and
//! return value carries its own type so the call frame can be filled with
//! strongly-typed setters.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::interfaces::FunctionRef;
use crate::types::*;

/// Shared reference to an application object exposed to scripts
pub type ObjectRef = Arc<dyn Any + Send + Sync>;

/// A single argument or return value
#[derive(Clone)]
pub enum ScriptValue {
    Void,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    /// Object or handle of a registered type; `None` is a null handle
    Object {
        type_id: TypeId,
        object: Option<ObjectRef>,
    },
}

impl ScriptValue {
    /// Runtime type id of this value
    pub fn type_id(&self) -> TypeId {
        match self {
            ScriptValue::Void => TYPEID_VOID,
            ScriptValue::Bool(_) => TYPEID_BOOL,
            ScriptValue::Int8(_) => TYPEID_INT8,
            ScriptValue::Int16(_) => TYPEID_INT16,
            ScriptValue::Int32(_) => TYPEID_INT32,
            ScriptValue::Int64(_) => TYPEID_INT64,
            ScriptValue::UInt8(_) => TYPEID_UINT8,
            ScriptValue::UInt16(_) => TYPEID_UINT16,
            ScriptValue::UInt32(_) => TYPEID_UINT32,
            ScriptValue::UInt64(_) => TYPEID_UINT64,
            ScriptValue::Float(_) => TYPEID_FLOAT,
            ScriptValue::Double(_) => TYPEID_DOUBLE,
            // Strings are registered application objects; bindings map them.
            ScriptValue::String(_) => TYPEID_APPOBJECT,
            ScriptValue::Object { type_id, .. } => *type_id,
        }
    }

    /// Short name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptValue::Void => "void",
            ScriptValue::Bool(_) => "bool",
            ScriptValue::Int8(_) => "int8",
            ScriptValue::Int16(_) => "int16",
            ScriptValue::Int32(_) => "int32",
            ScriptValue::Int64(_) => "int64",
            ScriptValue::UInt8(_) => "uint8",
            ScriptValue::UInt16(_) => "uint16",
            ScriptValue::UInt32(_) => "uint32",
            ScriptValue::UInt64(_) => "uint64",
            ScriptValue::Float(_) => "float",
            ScriptValue::Double(_) => "double",
            ScriptValue::String(_) => "string",
            ScriptValue::Object { .. } => "object",
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, ScriptValue::Void)
    }

    /// Wrap an application object
    pub fn object(type_id: TypeId, object: ObjectRef) -> Self {
        ScriptValue::Object {
            type_id,
            object: Some(object),
        }
    }

    /// Null handle of the given type
    pub fn null(type_id: TypeId) -> Self {
        ScriptValue::Object {
            type_id,
            object: None,
        }
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Void => f.write_str("Void"),
            ScriptValue::Bool(v) => write!(f, "Bool({v})"),
            ScriptValue::Int8(v) => write!(f, "Int8({v})"),
            ScriptValue::Int16(v) => write!(f, "Int16({v})"),
            ScriptValue::Int32(v) => write!(f, "Int32({v})"),
            ScriptValue::Int64(v) => write!(f, "Int64({v})"),
            ScriptValue::UInt8(v) => write!(f, "UInt8({v})"),
            ScriptValue::UInt16(v) => write!(f, "UInt16({v})"),
            ScriptValue::UInt32(v) => write!(f, "UInt32({v})"),
            ScriptValue::UInt64(v) => write!(f, "UInt64({v})"),
            ScriptValue::Float(v) => write!(f, "Float({v})"),
            ScriptValue::Double(v) => write!(f, "Double({v})"),
            ScriptValue::String(v) => write!(f, "String({v:?})"),
            ScriptValue::Object { type_id, object } => write!(
                f,
                "Object({:#x}, {})",
                type_id,
                if object.is_some() { "set" } else { "null" }
            ),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ScriptValue {
                fn from(value: $ty) -> Self {
                    ScriptValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
}

impl From<&str> for ScriptValue {
    fn from(value: &str) -> Self {
        ScriptValue::String(value.to_string())
    }
}

impl From<()> for ScriptValue {
    fn from(_: ()) -> Self {
        ScriptValue::Void
    }
}

/// Storage referenced by a generic `?&` parameter
#[derive(Clone)]
pub enum RefValue {
    /// Nothing was referenced
    Null,
    /// A function or delegate object
    Function(FunctionRef),
    /// A handle variable; dereferences to the function it holds, if any
    Handle(Option<FunctionRef>),
    /// Any other value
    Value(ScriptValue),
}

/// A generic `?&` reference: a type id plus the referenced storage
#[derive(Clone)]
pub struct VariableRef {
    pub type_id: TypeId,
    pub value: RefValue,
}

impl VariableRef {
    pub fn new(type_id: TypeId, value: RefValue) -> Self {
        Self { type_id, value }
    }

    /// Reference to a handle variable holding `function`
    pub fn function_handle(type_id: TypeId, function: Option<FunctionRef>) -> Self {
        Self::new(type_id | TYPEID_OBJHANDLE, RefValue::Handle(function))
    }

    /// Whether the referenced storage itself is null
    pub fn is_null(&self) -> bool {
        matches!(self.value, RefValue::Null)
    }

    /// Resolve the referenced function.
    ///
    /// Handle variables are dereferenced one level when the type id carries
    /// the handle flag. Returns `None` for null handles and non-function
    /// values.
    pub fn resolve_function(&self) -> Option<FunctionRef> {
        match &self.value {
            RefValue::Function(function) => Some(function.clone()),
            RefValue::Handle(inner) if is_handle_type(self.type_id) => inner.clone(),
            _ => None,
        }
    }
}

impl fmt::Debug for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match &self.value {
            RefValue::Null => "null".to_string(),
            RefValue::Function(function) => format!("function {}", function.name()),
            RefValue::Handle(Some(function)) => format!("handle {}", function.name()),
            RefValue::Handle(None) => "null handle".to_string(),
            RefValue::Value(value) => format!("{value:?}"),
        };
        write!(f, "VariableRef({:#x}, {})", self.type_id, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_ids() {
        assert_eq!(ScriptValue::from(true).type_id(), TYPEID_BOOL);
        assert_eq!(ScriptValue::from(7i32).type_id(), TYPEID_INT32);
        assert_eq!(ScriptValue::from(7u64).type_id(), TYPEID_UINT64);
        assert_eq!(ScriptValue::from(1.5f32).type_id(), TYPEID_FLOAT);
        assert_eq!(ScriptValue::from(()).type_id(), TYPEID_VOID);
        assert_eq!(ScriptValue::null(TYPEID_APPOBJECT | 4).type_id(), TYPEID_APPOBJECT | 4);
    }

    #[test]
    fn test_value_debug() {
        assert_eq!(format!("{:?}", ScriptValue::from("hi")), "String(\"hi\")");
        assert_eq!(format!("{:?}", ScriptValue::null(0x10)), "Object(0x10, null)");
    }

    #[test]
    fn test_null_reference() {
        let var = VariableRef::new(TYPEID_SCRIPTOBJECT | 1, RefValue::Null);
        assert!(var.is_null());
        assert!(var.resolve_function().is_none());
    }

    #[test]
    fn test_empty_handle_resolves_to_none() {
        let var = VariableRef::function_handle(TYPEID_SCRIPTOBJECT | 1, None);
        assert!(!var.is_null());
        assert!(var.resolve_function().is_none());
    }

    #[test]
    fn test_plain_value_is_not_a_function() {
        let var = VariableRef::new(TYPEID_INT32, RefValue::Value(ScriptValue::Int32(3)));
        assert!(var.resolve_function().is_none());
    }
}
