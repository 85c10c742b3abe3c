//! Script-facing event API
//!
//! Registers `HookReturnCode`, `CEvent`, and `CEventManager` with the engine.
//! Must run before [`EventManager::register_events`], which declares globals
//! of these types.

use std::sync::Arc;

use scripthook_sdk::{
    object_flags, GenericCall, NativeMethod, ObjectRef, ScriptEngine, ScriptValue, TypeId,
    TYPEID_OBJHANDLE,
};

use super::error::EventError;
use super::event::Event;
use super::manager::{Caller, EventManager, ScriptEventManager};
use super::types::HookReturnCode;

pub const HOOK_RETURN_CODE_TYPE: &str = "HookReturnCode";
pub const EVENT_TYPE: &str = "CEvent";
pub const EVENT_MANAGER_TYPE: &str = "CEventManager";

/// Register the event API types and methods
///
/// Everything is registered visible to all modules; the engine's previous
/// default access mask is restored afterwards.
pub fn register_script_event_api(engine: &dyn ScriptEngine) -> Result<(), EventError> {
    let old_access_mask = engine.set_default_access_mask(u32::MAX);

    let result = register_hook_return_code(engine)
        .and_then(|()| register_event_type(engine))
        .and_then(|event_type| register_event_manager_type(engine, event_type));

    engine.set_default_access_mask(old_access_mask);
    result
}

fn register_hook_return_code(engine: &dyn ScriptEngine) -> Result<(), EventError> {
    engine
        .register_enum(HOOK_RETURN_CODE_TYPE)
        .map_err(EventError::registration(HOOK_RETURN_CODE_TYPE))?;

    for code in [HookReturnCode::Continue, HookReturnCode::Handled] {
        engine
            .register_enum_value(HOOK_RETURN_CODE_TYPE, code.script_name(), code as i32)
            .map_err(EventError::registration(code.script_name()))?;
    }

    Ok(())
}

fn register_event_type(engine: &dyn ScriptEngine) -> Result<TypeId, EventError> {
    let event_type = engine
        .register_object_type(EVENT_TYPE, object_flags::REF | object_flags::NOCOUNT)
        .map_err(EventError::registration(EVENT_TYPE))?;

    register_method(engine, EVENT_TYPE, "bool Hook(?& in)", |call| {
        let hooked = match (call.object_as::<Event>(), call.arg_var(0)) {
            (Some(event), Some(value)) => event.hook(value).is_ok(),
            _ => false,
        };
        call.return_value = ScriptValue::Bool(hooked);
    })?;

    register_method(engine, EVENT_TYPE, "void Unhook(?& in)", |call| {
        if let (Some(event), Some(value)) = (call.object_as::<Event>(), call.arg_var(0)) {
            // Failures are logged by the event
            let _ = event.unhook(value);
        }
    })?;

    Ok(event_type)
}

fn register_event_manager_type(engine: &dyn ScriptEngine, event_type: TypeId) -> Result<(), EventError> {
    engine
        .register_object_type(EVENT_MANAGER_TYPE, object_flags::REF | object_flags::NOCOUNT)
        .map_err(EventError::registration(EVENT_MANAGER_TYPE))?;

    let event_handle = event_type | TYPEID_OBJHANDLE;
    let event_value = move |event: Option<Arc<Event>>| ScriptValue::Object {
        type_id: event_handle,
        object: event.map(|event| event as ObjectRef),
    };

    register_method(engine, EVENT_MANAGER_TYPE, "uint32 GetEventCount() const", |call| {
        if let Some(manager) = manager_of(call) {
            call.return_value = ScriptValue::UInt32(manager.event_count());
        }
    })?;

    register_method(
        engine,
        EVENT_MANAGER_TYPE,
        "CEvent@ GetEventByIndex(const uint32 uiIndex)",
        move |call| {
            let event = match (manager_of(call), call.arg_value(0)) {
                (Some(manager), Some(ScriptValue::UInt32(index))) => {
                    manager.get_event_by_index(*index, Caller::Script(call.caller.as_ref()))
                }
                _ => None,
            };
            call.return_value = event_value(event);
        },
    )?;

    register_method(
        engine,
        EVENT_MANAGER_TYPE,
        "CEvent@ FindEventByName(const string& in szName)",
        move |call| {
            let event = match (manager_of(call), call.arg_value(0)) {
                (Some(manager), Some(ScriptValue::String(name))) => {
                    manager.find_event_by_name(name, Caller::Script(call.caller.as_ref()))
                }
                _ => None,
            };
            call.return_value = event_value(event);
        },
    )?;

    register_method(
        engine,
        EVENT_MANAGER_TYPE,
        "bool HookEvent(const string& in szName, ?& in)",
        |call| {
            let hooked = match (manager_of(call), call.arg_value(0), call.arg_var(1)) {
                (Some(manager), Some(ScriptValue::String(name)), Some(value)) => manager
                    .hook_event(name, value, Caller::Script(call.caller.as_ref()))
                    .inspect_err(|err| tracing::error!("CEventManager::HookEvent: {}", err))
                    .is_ok(),
                _ => false,
            };
            call.return_value = ScriptValue::Bool(hooked);
        },
    )?;

    register_method(
        engine,
        EVENT_MANAGER_TYPE,
        "void UnhookEvent(const string& in szName, ?& in)",
        |call| {
            if let (Some(manager), Some(ScriptValue::String(name)), Some(value)) =
                (manager_of(call), call.arg_value(0), call.arg_var(1))
            {
                if let Err(err) = manager.unhook_event(name, value, Caller::Script(call.caller.as_ref())) {
                    tracing::error!("CEventManager::UnhookEvent: {}", err);
                }
            }
        },
    )?;

    Ok(())
}

/// Manager behind a `CEventManager` call, unless it has been dropped
fn manager_of(call: &GenericCall<'_>) -> Option<Arc<EventManager>> {
    call.object_as::<ScriptEventManager>()
        .and_then(|object| object.manager())
}

fn register_method<F>(
    engine: &dyn ScriptEngine,
    type_name: &str,
    declaration: &str,
    method: F,
) -> Result<(), EventError>
where
    F: Fn(&mut GenericCall<'_>) + Send + Sync + 'static,
{
    let method: NativeMethod = Arc::new(method);
    engine
        .register_object_method(type_name, declaration, method)
        .map_err(EventError::registration(format!("{type_name}::{declaration}")))
}

#[cfg(test)]
mod tests {
    use scripthook_engine::mock::{MockEngine, MockFunction, MockModule};
    use scripthook_sdk::{FunctionRef, GenericArg, ModuleRef, VariableRef, TYPEID_INT32};

    use super::*;
    use crate::events::{AccessMask, EventStopMode, EVENT_MANAGER_GLOBAL};

    fn setup() -> (Arc<MockEngine>, Arc<EventManager>) {
        let engine = MockEngine::new();
        register_script_event_api(&*engine).unwrap();

        let manager = Arc::new(EventManager::new("Events"));
        manager
            .add_event(Arc::new(Event::new("Spawn", "int index", "Player", AccessMask::ALL, EventStopMode::CallAll)))
            .unwrap();
        manager
            .add_event(Arc::new(Event::new("Ban", "int index", "Admin", AccessMask::PLUGIN, EventStopMode::CallAll)))
            .unwrap();
        manager.register_events(&*engine).unwrap();

        (engine, manager)
    }

    fn manager_object(engine: &MockEngine) -> ObjectRef {
        engine.global(EVENT_MANAGER_GLOBAL).unwrap()
    }

    fn plugin() -> ModuleRef {
        MockModule::new(7, "plugin")
            .with_access_mask(AccessMask::PLUGIN.bits())
            .build()
    }

    fn event_of(value: Option<ScriptValue>) -> Option<Arc<Event>> {
        match value {
            Some(ScriptValue::Object { object: Some(object), .. }) => object.downcast::<Event>().ok(),
            _ => None,
        }
    }

    #[test]
    fn test_registers_types_and_methods() {
        let engine = MockEngine::new();
        register_script_event_api(&*engine).unwrap();

        let registrations = engine.registrations();
        assert_eq!(registrations[0], "enum HookReturnCode");
        assert!(registrations.contains(&"enum value HookReturnCode::HOOK_HANDLED = 1".to_string()));
        assert!(registrations.contains(&"type CEvent".to_string()));
        assert!(registrations.contains(&"method CEvent::bool Hook(?& in)".to_string()));
        assert!(registrations.contains(&"method CEventManager::bool HookEvent(const string& in szName, ?& in)".to_string()));
        assert_eq!(engine.default_access_mask(), 1);
    }

    #[test]
    fn test_registering_twice_fails() {
        let engine = MockEngine::new();
        register_script_event_api(&*engine).unwrap();

        let result = register_script_event_api(&*engine);
        assert!(matches!(result, Err(EventError::Registration { .. })));
        assert_eq!(engine.default_access_mask(), 1);
    }

    #[test]
    fn test_manager_methods() {
        let (engine, _manager) = setup();
        let object = manager_object(&engine);

        let count = engine.call_native(EVENT_MANAGER_TYPE, "GetEventCount", &object, None, &[]);
        assert!(matches!(count, Some(ScriptValue::UInt32(2))));

        let args = [GenericArg::Value(ScriptValue::UInt32(1))];
        let by_index = engine.call_native(EVENT_MANAGER_TYPE, "GetEventByIndex", &object, Some(plugin()), &args);
        assert_eq!(event_of(by_index).map(|e| e.name().to_string()), Some("Ban".to_string()));

        let args = [GenericArg::Value(ScriptValue::from("Events::Player::Spawn"))];
        let by_name = engine.call_native(EVENT_MANAGER_TYPE, "FindEventByName", &object, Some(plugin()), &args);
        assert_eq!(event_of(by_name).map(|e| e.name().to_string()), Some("Spawn".to_string()));
    }

    #[test]
    fn test_unresolved_module_is_denied() {
        let (engine, _manager) = setup();
        let object = manager_object(&engine);

        let args = [GenericArg::Value(ScriptValue::from("Player::Spawn"))];
        let found = engine.call_native(EVENT_MANAGER_TYPE, "FindEventByName", &object, None, &args);
        assert!(matches!(found, Some(ScriptValue::Object { object: None, .. })));

        let args = [GenericArg::Value(ScriptValue::UInt32(0))];
        let found = engine.call_native(EVENT_MANAGER_TYPE, "GetEventByIndex", &object, None, &args);
        assert!(matches!(found, Some(ScriptValue::Object { object: None, .. })));
    }

    #[test]
    fn test_calls_after_manager_dropped() {
        let (engine, manager) = setup();
        let object = manager_object(&engine);
        drop(manager);

        let count = engine.call_native(EVENT_MANAGER_TYPE, "GetEventCount", &object, None, &[]);
        assert!(matches!(count, Some(ScriptValue::Void)));

        let args = [GenericArg::Value(ScriptValue::from("Player::Spawn"))];
        let found = engine.call_native(EVENT_MANAGER_TYPE, "FindEventByName", &object, Some(plugin()), &args);
        assert!(matches!(found, Some(ScriptValue::Object { object: None, .. })));
    }

    #[test]
    fn test_caller_access_mask_applies() {
        let (engine, _manager) = setup();
        let object = manager_object(&engine);
        let map_script: ModuleRef = MockModule::new(1, "map")
            .with_access_mask(AccessMask::MAP_SCRIPT.bits())
            .build();

        let args = [GenericArg::Value(ScriptValue::from("Admin::Ban"))];
        let found = engine.call_native(
            EVENT_MANAGER_TYPE,
            "FindEventByName",
            &object,
            Some(map_script),
            &args,
        );

        assert!(matches!(found, Some(ScriptValue::Object { object: None, .. })));
    }

    #[test]
    fn test_script_hook_and_unhook() {
        let (engine, manager) = setup();
        let spawn = manager.find_event_by_name("Player::Spawn", Caller::Host).unwrap();
        let funcdef = spawn.funcdef().unwrap();
        let handler: FunctionRef = MockFunction::builder(&engine, "OnSpawn")
            .signature(funcdef.type_id())
            .params(&[TYPEID_INT32])
            .return_type(TYPEID_INT32)
            .returns(ScriptValue::Int32(0))
            .build();
        let handle = VariableRef::function_handle(funcdef.type_id(), Some(handler.clone()));

        let event_object: ObjectRef = spawn.clone();
        let args = [GenericArg::Var(handle.clone())];
        let hooked = engine.call_native(EVENT_TYPE, "Hook", &event_object, None, &args);
        assert!(matches!(hooked, Some(ScriptValue::Bool(true))));
        assert_eq!(spawn.function_count(), 1);

        engine.call_native(EVENT_TYPE, "Unhook", &event_object, None, &args);
        assert_eq!(spawn.function_count(), 0);

        let manager_handle = manager_object(&engine);
        let args = [
            GenericArg::Value(ScriptValue::from("Player::Spawn")),
            GenericArg::Var(handle),
        ];
        let hooked = engine.call_native(EVENT_MANAGER_TYPE, "HookEvent", &manager_handle, Some(plugin()), &args);
        assert!(matches!(hooked, Some(ScriptValue::Bool(true))));
        assert_eq!(spawn.function_count(), 1);

        engine.call_native(EVENT_MANAGER_TYPE, "UnhookEvent", &manager_handle, Some(plugin()), &args);
        assert_eq!(spawn.function_count(), 0);
        assert_eq!(engine.mock_function(&handler).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_hook_with_bad_value_returns_false() {
        let (engine, manager) = setup();
        let spawn = manager.find_event_by_name("Player::Spawn", Caller::Host).unwrap();
        let event_object: ObjectRef = spawn.clone();

        let args = [GenericArg::Value(ScriptValue::Int32(3))];
        let hooked = engine.call_native(EVENT_TYPE, "Hook", &event_object, None, &args);

        assert!(matches!(hooked, Some(ScriptValue::Bool(false))));
        assert_eq!(spawn.function_count(), 0);
    }
}
