//! Script events
//!
//! An [`Event`] holds the hook functions scripts attached to one named event
//! and calls them in module order when the host fires it.
//!
//! # Example
//!
//! ```ignore
//! use scripthook_core::events::{AccessMask, Event, EventStopMode, HookCallResult};
//!
//! let event = Event::new("PlayerSpawn", "int index", "Player", AccessMask::ALL, EventStopMode::CallAll);
//!
//! // After EventManager::register_events, scripts hook it with
//! // `Player::PlayerSpawn.Hook(@OnPlayerSpawn);`
//!
//! if event.call((player_index,)) == HookCallResult::Handled {
//!     tracing::debug!("spawn was handled by a script");
//! }
//! ```

use std::sync::atomic::{AtomicI32, Ordering as AtomicOrdering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use scripthook_engine::{
    Arguments, CallError, CallFlags, Callable, FunctionCall, IntoArguments, OwningContext,
};
use scripthook_sdk::{same_object, FunctionRef, ModuleRef, ScriptContext, VariableRef};

use super::error::EventError;
use super::types::{
    module_of, module_order, same_module, AccessMask, EventStopMode, HookCallResult,
    HookReturnCode,
};

/// A named event scripts can hook
pub struct Event {
    name: String,
    arguments: String,
    category: String,
    access_mask: AccessMask,
    stop_mode: EventStopMode,

    /// Signature hook functions must match, set on registration
    funcdef: RwLock<Option<FunctionRef>>,

    /// Hooks, kept sorted by module order
    functions: RwLock<Vec<FunctionRef>>,

    /// Number of dispatches in progress
    in_call_count: AtomicI32,
}

impl Event {
    /// Create an event
    ///
    /// # Arguments
    /// * `name` - Event name, also used for the hook funcdef `<name>Hook`
    /// * `arguments` - Parameter list of the hook funcdef
    /// * `category` - Namespace the event is grouped under
    /// * `access_mask` - Modules that may see the event; must not be empty
    /// * `stop_mode` - When dispatch stops calling hooks
    pub fn new(
        name: &str,
        arguments: &str,
        category: &str,
        access_mask: AccessMask,
        stop_mode: EventStopMode,
    ) -> Self {
        debug_assert!(!access_mask.is_empty(), "Event '{name}' has an empty access mask");

        Self {
            name: name.to_string(),
            arguments: arguments.to_string(),
            category: category.to_string(),
            access_mask,
            stop_mode,
            funcdef: RwLock::new(None),
            functions: RwLock::new(Vec::new()),
            in_call_count: AtomicI32::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn access_mask(&self) -> AccessMask {
        self.access_mask
    }

    pub fn stop_mode(&self) -> EventStopMode {
        self.stop_mode
    }

    /// `category::name`, or just the name without a category
    pub fn qualified_name(&self) -> String {
        if self.category.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.category, self.name)
        }
    }

    pub fn funcdef(&self) -> Option<FunctionRef> {
        self.funcdef.read().clone()
    }

    pub fn set_funcdef(&self, funcdef: FunctionRef) {
        *self.funcdef.write() = Some(funcdef);
    }

    /// Whether a dispatch is in progress
    pub fn is_invoking(&self) -> bool {
        self.in_call_count.load(AtomicOrdering::SeqCst) > 0
    }

    pub fn function_count(&self) -> usize {
        self.functions.read_recursive().len()
    }

    pub fn function_by_index(&self, index: usize) -> Option<FunctionRef> {
        self.functions.read_recursive().get(index).cloned()
    }

    /// Snapshot of the hooks in call order
    pub fn functions(&self) -> Vec<FunctionRef> {
        self.functions.read_recursive().clone()
    }

    /// Add a hook function
    ///
    /// Adding a function that is already hooked succeeds without change.
    ///
    /// # Returns
    /// `Err(EventError::InvocationInProgress)` while the event is being
    /// dispatched
    pub fn add_function(&self, function: &FunctionRef) -> Result<(), EventError> {
        if self.is_invoking() {
            warn!(
                "Event '{}': cannot add function '{}' while the event is being invoked",
                self.qualified_name(),
                function.declaration()
            );
            return Err(EventError::InvocationInProgress(self.qualified_name()));
        }

        let mut functions = self.functions.write();

        if functions.iter().any(|hooked| same_object(hooked, function)) {
            return Ok(());
        }

        function.add_ref();
        functions.push(function.clone());

        // Stable, so hooks from one module keep their hook order
        functions.sort_by(|lhs, rhs| module_order(module_of(lhs).as_ref(), module_of(rhs).as_ref()));

        trace!(
            "Event '{}': hooked '{}' ({} hooks)",
            self.qualified_name(),
            function.declaration(),
            functions.len()
        );
        Ok(())
    }

    /// Remove a hook function
    ///
    /// # Returns
    /// Whether the function was hooked and got removed
    pub fn remove_function(&self, function: &FunctionRef) -> bool {
        if self.is_invoking() {
            warn!(
                "Event '{}': cannot remove function '{}' while the event is being invoked",
                self.qualified_name(),
                function.declaration()
            );
            return false;
        }

        let mut functions = self.functions.write();

        let Some(index) = functions.iter().position(|hooked| same_object(hooked, function)) else {
            return false;
        };

        functions.remove(index).release();
        true
    }

    /// Remove every hook owned by `module`
    ///
    /// Must not be called while the event is being dispatched.
    ///
    /// # Returns
    /// Number of hooks removed
    pub fn remove_functions_of_module(&self, module: &ModuleRef) -> usize {
        debug_assert!(
            !self.is_invoking(),
            "Module hooks removed while the event is being invoked"
        );
        if self.is_invoking() {
            error!(
                "Event '{}': cannot remove hooks of module '{}' while the event is being invoked",
                self.qualified_name(),
                module.name()
            );
            return 0;
        }

        let mut functions = self.functions.write();
        let before = functions.len();

        functions.retain(|function| {
            let owned = module_of(function).is_some_and(|owner| owner.id() == module.id());
            if owned {
                function.release();
            }
            !owned
        });

        before - functions.len()
    }

    /// Remove every hook
    ///
    /// Must not be called while the event is being dispatched.
    pub fn remove_all_functions(&self) {
        debug_assert!(
            !self.is_invoking(),
            "Hooks removed while the event is being invoked"
        );
        if self.is_invoking() {
            error!(
                "Event '{}': cannot remove all hooks while the event is being invoked",
                self.qualified_name()
            );
            return;
        }

        release_all(&mut self.functions.write());
    }

    /// Hook the function referenced by a script value
    pub fn hook(&self, value: &VariableRef) -> Result<(), EventError> {
        let function = self.validate_hook_function(value, "Hook")?;
        self.add_function(&function)
    }

    /// Unhook the function referenced by a script value
    pub fn unhook(&self, value: &VariableRef) -> Result<(), EventError> {
        let function = self.validate_hook_function(value, "Unhook")?;
        self.remove_function(&function);
        Ok(())
    }

    /// Resolve a script value to a function that can hook this event
    fn validate_hook_function(
        &self,
        value: &VariableRef,
        scope: &str,
    ) -> Result<FunctionRef, EventError> {
        self.resolve_hook_function(value).inspect_err(|err| {
            error!("Event::{}: {}: {}", scope, self.qualified_name(), err);
        })
    }

    fn resolve_hook_function(&self, value: &VariableRef) -> Result<FunctionRef, EventError> {
        let funcdef = self
            .funcdef()
            .ok_or_else(|| EventError::NotRegistered(self.qualified_name()))?;
        let engine = funcdef.engine();

        let object_type = engine
            .type_info_by_id(value.type_id)
            .ok_or(EventError::UnknownType(value.type_id))?;

        if !object_type.is_funcdef() {
            return Err(EventError::NotAFunction(object_type.qualified_name()));
        }

        if value.is_null() {
            return Err(EventError::NullObject);
        }

        let function = value.resolve_function().ok_or(EventError::NullObject)?;

        if !funcdef.is_compatible_with_type_id(function.type_id()) {
            let target = match (function.delegate_function(), function.delegate_object_type()) {
                (Some(method), Some(object_type)) => format!(
                    "Method '{}::{}'",
                    object_type.qualified_name(),
                    method.name()
                ),
                (Some(method), None) => format!("Method '{}'", method.name()),
                _ => format!("Function '{}'", qualify(function.namespace(), function.name())),
            };

            return Err(EventError::Incompatible {
                target,
                event: funcdef.name().to_string(),
            });
        }

        Ok(function)
    }

    /// Dispatch with no flags, using a pooled context
    pub fn call(&self, args: impl IntoArguments) -> HookCallResult {
        self.call_with(None, CallFlags::empty(), args)
    }

    /// Dispatch with flags, using a pooled context
    pub fn call_flags(&self, flags: CallFlags, args: impl IntoArguments) -> HookCallResult {
        self.call_with(None, flags, args)
    }

    /// Dispatch on the given context
    pub fn call_in(&self, context: &dyn ScriptContext, args: impl IntoArguments) -> HookCallResult {
        self.call_with(Some(context), CallFlags::empty(), args)
    }

    /// Call the event's hooks
    ///
    /// Hooks run in module order. Hooks returning an unreadable value or
    /// failing to run make the result [`HookCallResult::Failed`], but don't
    /// stop the dispatch.
    ///
    /// # Arguments
    /// * `context` - Context to run hooks on; borrowed from the engine of the
    ///   first hook if `None`
    /// * `flags` - Call flags for every hook
    /// * `args` - Hook arguments, matching the event's argument list
    pub fn call_with(
        &self,
        context: Option<&dyn ScriptContext>,
        flags: CallFlags,
        args: impl IntoArguments,
    ) -> HookCallResult {
        let args = args.into_arguments();

        if let Some(context) = context {
            return self.dispatch(context, flags, &args);
        }

        let Some(engine) = self.functions.read_recursive().first().map(|f| f.engine()) else {
            return HookCallResult::NoneHandled;
        };

        match OwningContext::acquire(engine) {
            Ok(context) => self.dispatch(&*context, flags, &args),
            Err(err) => {
                error!("Event '{}': {}", self.qualified_name(), err);
                HookCallResult::Failed
            }
        }
    }

    fn dispatch(
        &self,
        context: &dyn ScriptContext,
        flags: CallFlags,
        args: &Arguments,
    ) -> HookCallResult {
        let _guard = InvocationGuard::enter(&self.in_call_count);

        // Recursive so hooks may fire or inspect this event
        let functions = self.functions.read_recursive();

        let mut success = true;
        let mut return_code = HookReturnCode::Continue;
        let mut last_module: Option<ModuleRef> = None;

        for function in functions.iter() {
            let module = module_of(function);

            if self.stop_mode == EventStopMode::ModuleHandled
                && return_code == HookReturnCode::Handled
                && last_module.is_some()
                && !same_module(last_module.as_ref(), module.as_ref())
            {
                break;
            }

            last_module = module;

            let call = FunctionCall::new(function, context);

            match call.call_args(flags, args) {
                Ok(()) => {
                    if return_code == HookReturnCode::Continue {
                        match call.return_value_as::<HookReturnCode>() {
                            Ok(code) => return_code = code,
                            Err(err) => {
                                warn!("Event '{}': {}", self.qualified_name(), err);
                                success = false;
                            }
                        }
                    }
                }
                Err(CallError::Exception { .. }) => success = false,
                Err(err) => {
                    warn!("Event '{}': {}", self.qualified_name(), err);
                    success = false;
                }
            }

            if return_code == HookReturnCode::Handled && self.stop_mode == EventStopMode::OnHandled {
                break;
            }
        }

        if !success {
            HookCallResult::Failed
        } else if return_code == HookReturnCode::Handled {
            HookCallResult::Handled
        } else {
            HookCallResult::NoneHandled
        }
    }

    /// Describe every hook, one per line
    pub fn dump_hooked_functions(&self) -> String {
        let mut dump = format!(
            "Event \"{}::{}({})\"\n",
            self.category, self.name, self.arguments
        );

        for function in self.functions.read_recursive().iter() {
            let (module, target) = match function.module() {
                Some(module) => (Some(module), function.clone()),
                None => match function.delegate_function() {
                    Some(method) => (method.module(), method),
                    None => (None, function.clone()),
                },
            };

            match module {
                Some(module) => dump.push_str(&format!(
                    "Module \"{}\", \"{}::{}\"\n",
                    module.name(),
                    target.namespace(),
                    target.name()
                )),
                None => dump.push_str("Null module!\n"),
            }
        }

        dump.push_str("End functions\n");
        debug!("{}", dump.trim_end());
        dump
    }

    /// Serializable view of the event and its hooks
    pub fn snapshot(&self) -> EventSnapshot {
        let hooks = self
            .functions
            .read_recursive()
            .iter()
            .map(|function| {
                let target = function.delegate_function().unwrap_or_else(|| function.clone());
                HookSnapshot {
                    module: module_of(function).map(|module| module.name().to_string()),
                    function: qualify(target.namespace(), target.name()),
                    delegate: function.delegate_function().is_some(),
                }
            })
            .collect();

        EventSnapshot {
            name: self.name.clone(),
            category: self.category.clone(),
            arguments: self.arguments.clone(),
            access_mask: self.access_mask.bits(),
            stop_mode: self.stop_mode,
            hooks,
        }
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        release_all(self.functions.get_mut());
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.qualified_name())
            .field("arguments", &self.arguments)
            .field("access_mask", &self.access_mask)
            .field("stop_mode", &self.stop_mode)
            .field("hooks", &self.function_count())
            .finish()
    }
}

/// Serializable view of an [`Event`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub name: String,
    pub category: String,
    pub arguments: String,
    pub access_mask: u32,
    pub stop_mode: EventStopMode,
    pub hooks: Vec<HookSnapshot>,
}

/// Serializable view of one hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSnapshot {
    pub module: Option<String>,
    /// Function, or bound method for delegates
    pub function: String,
    pub delegate: bool,
}

/// Keeps an event's dispatch count raised for the guard's lifetime
struct InvocationGuard<'a> {
    count: &'a AtomicI32,
}

impl<'a> InvocationGuard<'a> {
    fn enter(count: &'a AtomicI32) -> Self {
        count.fetch_add(1, AtomicOrdering::SeqCst);
        Self { count }
    }
}

impl Drop for InvocationGuard<'_> {
    fn drop(&mut self) {
        let previous = self.count.fetch_sub(1, AtomicOrdering::SeqCst);
        debug_assert!(previous > 0, "Event dispatch count went negative");
    }
}

/// Release and clear hooks. Delegates hold an extra reference.
fn release_all(functions: &mut Vec<FunctionRef>) {
    for function in functions.drain(..) {
        if function.delegate_function().is_some() {
            function.release();
        }
        function.release();
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", namespace, name)
    }
}
