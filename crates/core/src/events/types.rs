//! Event system types

use std::cmp::Ordering;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use scripthook_engine::FromScriptValue;
use scripthook_sdk::{FunctionRef, ModuleRef, ScriptValue};

/// Value returned by a hook function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum HookReturnCode {
    /// Keep calling other hooks
    #[default]
    Continue = 0,

    /// The hook handled the event
    Handled = 1,
}

impl HookReturnCode {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Continue),
            1 => Some(Self::Handled),
            _ => None,
        }
    }

    /// Name as registered with the script engine
    pub fn script_name(self) -> &'static str {
        match self {
            Self::Continue => "HOOK_CONTINUE",
            Self::Handled => "HOOK_HANDLED",
        }
    }
}

impl FromScriptValue for HookReturnCode {
    const KIND: &'static str = "HookReturnCode";

    fn from_script_value(value: ScriptValue) -> Option<Self> {
        match value {
            ScriptValue::Int32(v) => Self::from_i32(v),
            ScriptValue::UInt32(v) => i32::try_from(v).ok().and_then(Self::from_i32),
            _ => None,
        }
    }
}

/// Aggregate result of dispatching an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookCallResult {
    /// At least one hook could not be called, or returned an unreadable value
    Failed,

    /// Every hook ran and none handled the event
    NoneHandled,

    /// At least one hook handled the event
    Handled,
}

/// When dispatch stops calling hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStopMode {
    /// Call every hook
    #[default]
    CallAll,

    /// Stop as soon as a hook returns handled
    OnHandled,

    /// Let the rest of the handling module's hooks run, then stop
    ModuleHandled,
}

bitflags! {
    /// Which script modules may see an event
    ///
    /// A module sees an event when the two masks share at least one bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        const SHARED = 1 << 0;
        const MAP_SCRIPT = 1 << 1;
        const PLUGIN = 1 << 2;
        const ALL = u32::MAX;
    }
}

impl AccessMask {
    /// Whether code running with `caller` may access an object with this mask
    pub fn allows(self, caller: u32) -> bool {
        self.bits() & caller != 0
    }
}

/// Module that owns a hook function
///
/// Delegates carry no module of their own; they belong to the module of the
/// bound method.
pub fn module_of(function: &FunctionRef) -> Option<ModuleRef> {
    function
        .module()
        .or_else(|| function.delegate_function().and_then(|method| method.module()))
}

/// Order in which modules' hooks run
///
/// Hooks with a module come before hooks without one. Between modules,
/// higher priority runs first, then lower module id.
pub fn module_order(lhs: Option<&ModuleRef>, rhs: Option<&ModuleRef>) -> Ordering {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => rhs
            .priority()
            .cmp(&lhs.priority())
            .then_with(|| lhs.id().cmp(&rhs.id())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Whether both hooks belong to the same module
pub fn same_module(lhs: Option<&ModuleRef>, rhs: Option<&ModuleRef>) -> bool {
    match (lhs, rhs) {
        (Some(lhs), Some(rhs)) => lhs.id() == rhs.id(),
        (None, None) => true,
        _ => false,
    }
}
