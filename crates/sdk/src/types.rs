//! Script runtime type ids and type metadata
//!
//! Type ids follow the engine's encoding: the low bits carry a sequence
//! number for registered types, primitives use small fixed values, and the
//! high bits mark handles and object kinds.

use std::fmt;

/// Runtime type identifier
pub type TypeId = i32;

// Primitive type ids
pub const TYPEID_VOID: TypeId = 0;
pub const TYPEID_BOOL: TypeId = 1;
pub const TYPEID_INT8: TypeId = 2;
pub const TYPEID_INT16: TypeId = 3;
pub const TYPEID_INT32: TypeId = 4;
pub const TYPEID_INT64: TypeId = 5;
pub const TYPEID_UINT8: TypeId = 6;
pub const TYPEID_UINT16: TypeId = 7;
pub const TYPEID_UINT32: TypeId = 8;
pub const TYPEID_UINT64: TypeId = 9;
pub const TYPEID_FLOAT: TypeId = 10;
pub const TYPEID_DOUBLE: TypeId = 11;

/// The value is a handle to an object
pub const TYPEID_OBJHANDLE: TypeId = 0x4000_0000;
/// The value is a handle to a const object
pub const TYPEID_HANDLETOCONST: TypeId = 0x2000_0000;
/// Mask selecting the object kind bits
pub const TYPEID_MASK_OBJECT: TypeId = 0x1C00_0000;
/// Registered application object
pub const TYPEID_APPOBJECT: TypeId = 0x0400_0000;
/// Script declared object
pub const TYPEID_SCRIPTOBJECT: TypeId = 0x0800_0000;
/// Template instance
pub const TYPEID_TEMPLATE: TypeId = 0x1000_0000;
/// Mask selecting the sequence number
pub const TYPEID_MASK_SEQNBR: TypeId = 0x03FF_FFFF;

/// Returns true if the type id carries the handle flag
pub fn is_handle_type(type_id: TypeId) -> bool {
    type_id & TYPEID_OBJHANDLE != 0
}

/// Strips handle modifiers from a type id
pub fn strip_handle(type_id: TypeId) -> TypeId {
    type_id & !(TYPEID_OBJHANDLE | TYPEID_HANDLETOCONST)
}

/// Object type flags as reported by [`TypeInfo::flags`]
pub mod object_flags {
    pub const REF: u32 = 1 << 0;
    pub const VALUE: u32 = 1 << 1;
    pub const GC: u32 = 1 << 2;
    pub const POD: u32 = 1 << 3;
    pub const NOHANDLE: u32 = 1 << 4;
    pub const SCOPED: u32 = 1 << 5;
    pub const TEMPLATE: u32 = 1 << 6;
    pub const NOCOUNT: u32 = 1 << 18;
    pub const SCRIPT_OBJECT: u32 = 1 << 19;
    pub const SHARED: u32 = 1 << 20;
    pub const NOINHERIT: u32 = 1 << 21;
    /// Function definition (function signature type)
    pub const FUNCDEF: u32 = 1 << 22;
    pub const ENUM: u32 = 1 << 24;
}

/// Type metadata resolved from a type id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    /// Type id without handle modifiers
    pub type_id: TypeId,
    /// Unqualified type name
    pub name: String,
    /// Namespace, empty for the global namespace
    pub namespace: String,
    /// Combination of [`object_flags`]
    pub flags: u32,
}

impl TypeInfo {
    /// Create new type metadata
    pub fn new(type_id: TypeId, namespace: &str, name: &str, flags: u32) -> Self {
        Self {
            type_id,
            name: name.to_string(),
            namespace: namespace.to_string(),
            flags,
        }
    }

    /// Whether this type is a function definition
    pub fn is_funcdef(&self) -> bool {
        self.flags & object_flags::FUNCDEF != 0
    }

    /// `namespace::name`, or just the name in the global namespace
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}
