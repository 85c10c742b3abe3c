//! Event manager - event registry, name lookup, and engine registration
//!
//! The manager owns the events exposed under one script namespace. Scripts
//! reach it through the `g_EventManager` global and each event through a
//! global `CEvent` named after it.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, error, info, trace};

use scripthook_sdk::{ModuleRef, ObjectRef, ScriptEngine, VariableRef};

use super::error::EventError;
use super::event::{Event, EventSnapshot};
use crate::config::{ConfigError, ConfigResult, EventsConfig};

new_key_type! {
    /// Key identifying an event in an [`EventManager`]
    pub struct EventKey;
}

/// Global declaration of the manager object
pub const EVENT_MANAGER_GLOBAL: &str = "CEventManager g_EventManager";

/// Who is asking for an event
#[derive(Clone, Copy)]
pub enum Caller<'a> {
    /// Host code, which sees every event
    Host,

    /// A script, with its module if it could be resolved
    ///
    /// Scripts whose module is unknown are denied every event.
    Script(Option<&'a ModuleRef>),
}

/// Object scripts see as `g_EventManager`
///
/// Holds the manager weakly, so the engine's globals do not keep it alive
/// and dropping the host's manager still unhooks everything.
pub struct ScriptEventManager {
    manager: Weak<EventManager>,
}

impl ScriptEventManager {
    pub fn new(manager: &Arc<EventManager>) -> Self {
        Self {
            manager: Arc::downgrade(manager),
        }
    }

    /// The manager, unless it has been dropped
    pub fn manager(&self) -> Option<Arc<EventManager>> {
        self.manager.upgrade()
    }
}

#[derive(Default)]
struct EventRegistry {
    events: SlotMap<EventKey, Arc<Event>>,
    /// Keys in insertion order
    order: Vec<EventKey>,
}

impl EventRegistry {
    fn iter(&self) -> impl Iterator<Item = &Arc<Event>> + '_ {
        self.order.iter().filter_map(|key| self.events.get(*key))
    }
}

/// Registry of the events exposed under one namespace
pub struct EventManager {
    namespace: String,
    registry: RwLock<EventRegistry>,
}

impl EventManager {
    /// Create a manager for events under `namespace`
    ///
    /// Surrounding whitespace is ignored; an empty namespace puts events in
    /// the global namespace.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.trim().to_string(),
            registry: RwLock::new(EventRegistry::default()),
        }
    }

    /// Create a manager holding the events defined in `config`
    pub fn from_config(namespace: &str, config: &EventsConfig) -> ConfigResult<Self> {
        let manager = Self::new(namespace);

        for definition in &config.events {
            let event = definition.to_event()?;

            if manager.find_event_by_name(&event.qualified_name(), Caller::Host).is_some() {
                return Err(ConfigError::InvalidEvent {
                    name: definition.name.clone(),
                    reason: format!("'{}' is defined more than once", event.qualified_name()),
                });
            }

            manager
                .add_event(Arc::new(event))
                .map_err(|err| ConfigError::InvalidEvent {
                    name: definition.name.clone(),
                    reason: err.to_string(),
                })?;
        }

        debug!(
            "Loaded {} events into namespace '{}'",
            manager.event_count(),
            manager.namespace
        );
        Ok(manager)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Add an event
    ///
    /// Adding an event that is already present returns its existing key.
    pub fn add_event(&self, event: Arc<Event>) -> Result<EventKey, EventError> {
        let mut registry = self.registry.write();

        if let Some(key) = registry
            .order
            .iter()
            .copied()
            .find(|key| registry.events.get(*key).is_some_and(|e| Arc::ptr_eq(e, &event)))
        {
            return Ok(key);
        }

        if registry.order.len() >= u32::MAX as usize {
            return Err(EventError::TooManyEvents);
        }

        trace!("Added event '{}'", event.qualified_name());
        let key = registry.events.insert(event);
        registry.order.push(key);
        Ok(key)
    }

    pub fn event(&self, key: EventKey) -> Option<Arc<Event>> {
        self.registry.read().events.get(key).cloned()
    }

    /// All events in insertion order
    pub fn events(&self) -> Vec<Arc<Event>> {
        self.registry.read().iter().cloned().collect()
    }

    pub fn event_count(&self) -> u32 {
        // add_event caps the count at u32::MAX
        self.registry.read().order.len() as u32
    }

    /// Event at `index`, if `caller` may access it
    pub fn get_event_by_index(&self, index: u32, caller: Caller<'_>) -> Option<Arc<Event>> {
        let event = {
            let registry = self.registry.read();
            let key = *registry.order.get(index as usize)?;
            registry.events.get(key).cloned()?
        };

        self.check_access(event, caller)
    }

    /// Find an event by name, if `caller` may access it
    ///
    /// The name may be `Name`, `Category::Name`, or the same prefixed with
    /// this manager's namespace.
    ///
    pub fn find_event_by_name(&self, name: &str, caller: Caller<'_>) -> Option<Arc<Event>> {
        let (category, event_name) = self.split_event_name(name);

        let event = self
            .registry
            .read()
            .iter()
            .find(|event| event.category() == category && event.name() == event_name)
            .cloned()?;

        self.check_access(event, caller)
    }

    /// Split a possibly qualified event name into category and name,
    /// dropping this manager's namespace
    fn split_event_name<'a>(&self, name: &'a str) -> (&'a str, &'a str) {
        let name = name.trim();
        let (category, event_name) = name.rsplit_once("::").unwrap_or(("", name));

        if self.namespace.is_empty() {
            return (category, event_name);
        }

        if category == self.namespace {
            return ("", event_name);
        }

        let category = category
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix("::"))
            .unwrap_or(category);

        (category, event_name)
    }

    fn check_access(&self, event: Arc<Event>, caller: Caller<'_>) -> Option<Arc<Event>> {
        let module = match caller {
            Caller::Host => return Some(event),
            Caller::Script(Some(module)) => module,
            Caller::Script(None) => {
                error!(
                    "Couldn't get calling module for event '{}'",
                    event.qualified_name()
                );
                return None;
            }
        };

        if event.access_mask().allows(module.access_mask()) {
            Some(event)
        } else {
            debug!(
                "Module '{}' may not access event '{}'",
                module.name(),
                event.qualified_name()
            );
            None
        }
    }

    /// Hook a function to the event named `name`
    pub fn hook_event(
        &self,
        name: &str,
        value: &VariableRef,
        caller: Caller<'_>,
    ) -> Result<(), EventError> {
        self.find_event_by_name(name, caller)
            .ok_or_else(|| EventError::EventNotFound(name.to_string()))?
            .hook(value)
    }

    /// Unhook a function from the event named `name`
    pub fn unhook_event(
        &self,
        name: &str,
        value: &VariableRef,
        caller: Caller<'_>,
    ) -> Result<(), EventError> {
        self.find_event_by_name(name, caller)
            .ok_or_else(|| EventError::EventNotFound(name.to_string()))?
            .unhook(value)
    }

    /// Register the manager, its events, and their hook funcdefs
    ///
    /// Every event becomes a global `CEvent` in `<namespace>::<category>`
    /// visible to modules matching its access mask, with a global funcdef
    /// `HookReturnCode <Name>Hook(<arguments>)`. The engine's default
    /// namespace and access mask are restored afterwards, even on failure.
    ///
    /// Scripts reach the manager through a [`ScriptEventManager`], so the
    /// engine holds no strong reference to it. The script event API must be
    /// registered first.
    pub fn register_events(self: &Arc<Self>, engine: &dyn ScriptEngine) -> Result<(), EventError> {
        let old_namespace = engine.default_namespace();
        let old_access_mask = engine.set_default_access_mask(u32::MAX);

        let result = self.register_events_inner(engine);

        let restored = engine
            .set_default_namespace(&old_namespace)
            .map_err(EventError::registration(format!("namespace '{old_namespace}'")));
        engine.set_default_access_mask(old_access_mask);

        result.and(restored)
    }

    fn register_events_inner(self: &Arc<Self>, engine: &dyn ScriptEngine) -> Result<(), EventError> {
        let manager: ObjectRef = Arc::new(ScriptEventManager::new(self));
        engine
            .register_global_property(EVENT_MANAGER_GLOBAL, manager)
            .map_err(EventError::registration(EVENT_MANAGER_GLOBAL))?;

        let events = self.events();

        for event in &events {
            let namespace = match (self.namespace.is_empty(), event.category().is_empty()) {
                (_, true) => self.namespace.clone(),
                (true, false) => event.category().to_string(),
                (false, false) => format!("{}::{}", self.namespace, event.category()),
            };

            engine
                .set_default_namespace(&namespace)
                .map_err(EventError::registration(format!("namespace '{namespace}'")))?;
            engine.set_default_access_mask(event.access_mask().bits());

            let declaration = format!("::CEvent {}", event.name());
            let object: ObjectRef = event.clone();
            engine
                .register_global_property(&declaration, object)
                .map_err(EventError::registration(declaration.clone()))?;

            engine
                .set_default_namespace("")
                .map_err(EventError::registration("global namespace"))?;

            let declaration = format!("HookReturnCode {}Hook({})", event.name(), event.arguments());
            let funcdef = engine
                .register_funcdef(&declaration)
                .map_err(EventError::registration(declaration.clone()))?;
            event.set_funcdef(funcdef);
        }

        info!(
            "Registered {} events in namespace '{}'",
            events.len(),
            self.namespace
        );
        Ok(())
    }

    /// Remove every hook owned by `module`, typically before it is discarded
    pub fn unhook_module_functions(&self, module: &ModuleRef) {
        let removed: usize = self
            .events()
            .iter()
            .map(|event| event.remove_functions_of_module(module))
            .sum();

        debug!("Unhooked {} functions of module '{}'", removed, module.name());
    }

    /// Remove every hook from every event
    pub fn unhook_all_functions(&self) {
        for event in self.events() {
            event.remove_all_functions();
        }
    }

    /// Describe the hooks of every event
    pub fn dump_hooked_functions(&self) -> String {
        self.events()
            .iter()
            .map(|event| event.dump_hooked_functions())
            .collect()
    }

    /// Serializable view of every event
    pub fn snapshot(&self) -> Vec<EventSnapshot> {
        self.events().iter().map(|event| event.snapshot()).collect()
    }

    /// Every event and its hooks as pretty-printed JSON
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl Drop for EventManager {
    fn drop(&mut self) {
        for event in self.registry.get_mut().iter() {
            event.remove_all_functions();
        }
    }
}

#[cfg(test)]
mod tests {
    use scripthook_engine::mock::{MockEngine, MockFunction, MockModule};
    use scripthook_sdk::{FunctionRef, ScriptFunction, ScriptValue, TYPEID_INT32};

    use super::*;
    use crate::events::{AccessMask, EventStopMode, HookCallResult};

    fn event(name: &str, category: &str, mask: AccessMask) -> Arc<Event> {
        Arc::new(Event::new(name, "int index", category, mask, EventStopMode::CallAll))
    }

    fn manager() -> EventManager {
        let manager = EventManager::new(" Events ");
        manager.add_event(event("Spawn", "Player", AccessMask::ALL)).unwrap();
        manager.add_event(event("MapInit", "", AccessMask::ALL)).unwrap();
        manager.add_event(event("Secret", "Admin", AccessMask::PLUGIN)).unwrap();
        manager
    }

    #[test]
    fn test_add_event_is_idempotent() {
        let manager = EventManager::new("");
        let spawn = event("Spawn", "", AccessMask::ALL);

        let first = manager.add_event(spawn.clone()).unwrap();
        let second = manager.add_event(spawn.clone()).unwrap();

        assert_eq!(first, second);
        assert_eq!(manager.event_count(), 1);
        assert!(Arc::ptr_eq(&manager.event(first).unwrap(), &spawn));
    }

    #[test]
    fn test_from_config() {
        let config: EventsConfig = toml::from_str(
            r#"
            [[events]]
            name = "Spawn"
            category = "Player"
            arguments = "int index"
            stop_mode = "module_handled"

            [[events]]
            name = "Ban"
            category = "Admin"
            access_mask = 4
            "#,
        )
        .unwrap();

        let manager = EventManager::from_config("Events", &config).unwrap();

        assert_eq!(manager.event_count(), 2);
        let spawn = manager.find_event_by_name("Events::Player::Spawn", Caller::Host).unwrap();
        assert_eq!(spawn.stop_mode(), EventStopMode::ModuleHandled);
        assert_eq!(spawn.arguments(), "int index");
        let ban = manager.get_event_by_index(1, Caller::Host).unwrap();
        assert_eq!(ban.access_mask(), AccessMask::PLUGIN);
    }

    #[test]
    fn test_from_config_rejects_duplicates() {
        let mut config = EventsConfig::default();
        config.events.push(crate::config::EventDefinition::new("Spawn", "Player", "int"));
        config.events.push(crate::config::EventDefinition::new("Spawn", "Player", ""));

        let result = EventManager::from_config("", &config);
        assert!(matches!(result, Err(ConfigError::InvalidEvent { name, .. }) if name == "Spawn"));
    }

    #[test]
    fn test_namespace_is_trimmed() {
        assert_eq!(manager().namespace(), "Events");
    }

    #[test]
    fn test_get_event_by_index() {
        let manager = manager();

        assert_eq!(manager.get_event_by_index(0, Caller::Host).unwrap().name(), "Spawn");
        assert_eq!(manager.get_event_by_index(2, Caller::Host).unwrap().name(), "Secret");
        assert!(manager.get_event_by_index(3, Caller::Host).is_none());
    }

    #[test]
    fn test_find_event_by_name() {
        let manager = manager();

        for name in ["Player::Spawn", "Events::Player::Spawn", " Player::Spawn "] {
            let found = manager.find_event_by_name(name, Caller::Host);
            assert_eq!(found.map(|e| e.qualified_name()), Some("Player::Spawn".to_string()), "{name}");
        }

        assert!(manager.find_event_by_name("MapInit", Caller::Host).is_some());
        assert!(manager.find_event_by_name("Events::MapInit", Caller::Host).is_some());
        assert!(manager.find_event_by_name("Spawn", Caller::Host).is_none());
        assert!(manager.find_event_by_name("Other::Spawn", Caller::Host).is_none());
    }

    #[test]
    fn test_access_mask_filters_callers() {
        let manager = manager();
        let map_script = MockModule::new(1, "map")
            .with_access_mask(AccessMask::MAP_SCRIPT.bits())
            .build();
        let plugin = MockModule::new(2, "plugin")
            .with_access_mask(AccessMask::PLUGIN.bits())
            .build();

        assert!(manager.find_event_by_name("Admin::Secret", Caller::Script(Some(&map_script))).is_none());
        assert!(manager.get_event_by_index(2, Caller::Script(Some(&map_script))).is_none());
        assert!(manager.find_event_by_name("Admin::Secret", Caller::Script(Some(&plugin))).is_some());
        assert!(manager.find_event_by_name("Player::Spawn", Caller::Script(Some(&map_script))).is_some());
    }

    #[test]
    fn test_script_without_module_is_denied() {
        let manager = manager();

        assert!(manager.find_event_by_name("Player::Spawn", Caller::Script(None)).is_none());
        assert!(manager.get_event_by_index(0, Caller::Script(None)).is_none());
        assert!(manager.find_event_by_name("Player::Spawn", Caller::Host).is_some());
    }

    #[test]
    fn test_hook_event_not_found() {
        let engine = MockEngine::new();
        let manager = manager();
        let funcdef = engine.funcdef("", "HookReturnCode SpawnHook(int index)");
        let value = VariableRef::function_handle(funcdef.type_id(), None);

        let result = manager.hook_event("Player::Missing", &value, Caller::Host);
        assert!(matches!(result, Err(EventError::EventNotFound(name)) if name == "Player::Missing"));

        let map_script = MockModule::new(1, "map")
            .with_access_mask(AccessMask::MAP_SCRIPT.bits())
            .build();
        let result = manager.unhook_event("Admin::Secret", &value, Caller::Script(Some(&map_script)));
        assert!(matches!(result, Err(EventError::EventNotFound(_))));
    }

    #[test]
    fn test_register_events() {
        let engine = MockEngine::new();
        engine.set_default_namespace("Previous").unwrap();
        let manager = Arc::new(manager());

        manager.register_events(&*engine).unwrap();

        assert_eq!(engine.default_namespace(), "Previous");
        assert_eq!(engine.default_access_mask(), 1);

        let registrations = engine.registrations();
        assert!(registrations.contains(&"property CEventManager g_EventManager [Previous] (access 0xffffffff)".to_string()));
        assert!(registrations.contains(&"property ::CEvent Spawn [Events::Player] (access 0xffffffff)".to_string()));
        assert!(registrations.contains(&"property ::CEvent MapInit [Events] (access 0xffffffff)".to_string()));
        assert!(registrations.contains(&"property ::CEvent Secret [Events::Admin] (access 0x4)".to_string()));
        assert!(registrations.contains(&"funcdef HookReturnCode SpawnHook(int index)".to_string()));

        let spawn = manager.find_event_by_name("Player::Spawn", Caller::Host).unwrap();
        assert_eq!(spawn.funcdef().unwrap().name(), "SpawnHook");

        let global = engine.global("::CEvent Spawn [Events::Player]").unwrap();
        assert!(Arc::ptr_eq(&global.downcast::<Event>().unwrap(), &spawn));

        let global = engine.global("CEventManager g_EventManager [Previous]").unwrap();
        let script_manager = global.downcast::<ScriptEventManager>().unwrap();
        assert!(Arc::ptr_eq(&script_manager.manager().unwrap(), &manager));
        assert_eq!(Arc::strong_count(&manager), 1);
    }

    #[test]
    fn test_register_events_without_namespace() {
        let engine = MockEngine::new();
        let manager = Arc::new(EventManager::new(""));
        manager.add_event(event("Spawn", "Player", AccessMask::ALL)).unwrap();
        manager.add_event(event("MapInit", "", AccessMask::ALL)).unwrap();

        manager.register_events(&*engine).unwrap();

        assert!(engine.global("::CEvent Spawn [Player]").is_some());
        assert!(engine.global("::CEvent MapInit").is_some());
    }

    #[test]
    fn test_hook_by_name_and_dispatch() {
        let engine = MockEngine::new();
        let manager = Arc::new(manager());
        manager.register_events(&*engine).unwrap();

        let spawn = manager.find_event_by_name("Player::Spawn", Caller::Host).unwrap();
        let funcdef = spawn.funcdef().unwrap();
        let module = MockModule::new(1, "plugin").build();
        let handler: FunctionRef = MockFunction::builder(&engine, "OnSpawn")
            .signature(funcdef.type_id())
            .module(&module)
            .params(&[TYPEID_INT32])
            .return_type(TYPEID_INT32)
            .returns(ScriptValue::Int32(1))
            .build();
        let value = VariableRef::function_handle(funcdef.type_id(), Some(handler.clone()));

        manager.hook_event("Events::Player::Spawn", &value, Caller::Script(Some(&module))).unwrap();
        assert_eq!(spawn.call((3i32,)), HookCallResult::Handled);

        manager.unhook_module_functions(&module);
        assert_eq!(spawn.function_count(), 0);
        assert_eq!(engine.mock_function(&handler).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_drop_unhooks_everything() {
        let engine = MockEngine::new();
        let manager = manager();
        let spawn = manager.find_event_by_name("Player::Spawn", Caller::Host).unwrap();
        let handler: FunctionRef = MockFunction::builder(&engine, "OnSpawn").build();
        spawn.add_function(&handler).unwrap();

        drop(manager);

        assert_eq!(spawn.function_count(), 0);
        assert_eq!(engine.mock_function(&handler).unwrap().ref_count(), 1);
    }

    #[test]
    fn test_drop_after_register_unhooks_everything() {
        let engine = MockEngine::new();
        let manager = Arc::new(manager());
        manager.register_events(&*engine).unwrap();

        let spawn = manager.find_event_by_name("Player::Spawn", Caller::Host).unwrap();
        let funcdef = spawn.funcdef().unwrap();
        let handler: FunctionRef = MockFunction::builder(&engine, "OnSpawn")
            .signature(funcdef.type_id())
            .build();
        spawn
            .hook(&VariableRef::function_handle(funcdef.type_id(), Some(handler.clone())))
            .unwrap();
        assert_eq!(engine.mock_function(&handler).unwrap().ref_count(), 2);

        drop(manager);

        assert_eq!(spawn.function_count(), 0);
        assert_eq!(engine.mock_function(&handler).unwrap().ref_count(), 1);

        let global = engine.global("CEventManager g_EventManager").unwrap();
        assert!(global.downcast::<ScriptEventManager>().unwrap().manager().is_none());
    }

    #[test]
    fn test_dump_and_snapshot() {
        let manager = manager();

        let dump = manager.dump_hooked_functions();
        assert!(dump.starts_with("Event \"Player::Spawn(int index)\"\nEnd functions\n"));
        assert_eq!(dump.matches("End functions").count(), 3);

        let json = manager.snapshot_json().unwrap();
        let parsed: Vec<EventSnapshot> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[2].access_mask, AccessMask::PLUGIN.bits());
    }
}
