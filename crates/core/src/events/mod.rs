//! Script Event System
//!
//! Lets scripts hook host-defined events and lets the host fire them.
//!
//! # Architecture
//!
//! ```text
//! host code → Event::call → hooks in module order → HookCallResult
//! scripts  → CEvent.Hook / g_EventManager.HookEvent → Event::hook
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use scripthook_core::events::{
//!     register_script_event_api, AccessMask, Event, EventManager, EventStopMode,
//! };
//!
//! let manager = Arc::new(EventManager::new("Events"));
//! let spawn = Arc::new(Event::new(
//!     "PlayerSpawn",
//!     "int index",
//!     "Player",
//!     AccessMask::ALL,
//!     EventStopMode::OnHandled,
//! ));
//! manager.add_event(spawn.clone())?;
//!
//! register_script_event_api(&*engine)?;
//! manager.register_events(&*engine)?;
//!
//! // Scripts: Events::Player::PlayerSpawn.Hook(@OnPlayerSpawn);
//! spawn.call((player_index,));
//!
//! // Before discarding a module
//! manager.unhook_module_functions(&module);
//! ```

mod error;
mod event;
mod manager;
mod script_api;
mod types;

pub use error::EventError;
pub use event::{Event, EventSnapshot, HookSnapshot};
pub use manager::{Caller, EventKey, EventManager, ScriptEventManager, EVENT_MANAGER_GLOBAL};
pub use script_api::{
    register_script_event_api, EVENT_MANAGER_TYPE, EVENT_TYPE, HOOK_RETURN_CODE_TYPE,
};
pub use types::{
    module_of, module_order, same_module, AccessMask, EventStopMode, HookCallResult,
    HookReturnCode,
};
