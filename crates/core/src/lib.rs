//! scripthook - Core Logic
//!
//! This crate contains the script event system built on the callable layer:
//! events scripts can hook, the event manager that exposes them, their
//! script API, configuration, and logging setup.
//!
//! # Re-exports
//!
//! This crate re-exports the SDK and engine crates for convenience:
//! - [`sdk`] - Script runtime types and engine interfaces
//! - [`engine`] - Callables and the function-call dispatcher

use tracing::info;

// Re-export SDK and engine crates
pub use scripthook_engine as engine;
pub use scripthook_sdk as sdk;

pub mod config;
pub mod events;
pub mod logging;

// Re-export commonly used items
pub use events::{
    register_script_event_api, AccessMask, Caller, Event, EventError, EventKey, EventManager,
    EventStopMode, HookCallResult, HookReturnCode,
};

// Re-export config types
pub use config::{ConfigError, ConfigFile, ConfigResult, CoreConfig, EventDefinition, EventsConfig};

/// Shut down the event system
///
/// Removes every hook so scripts can be discarded safely.
pub fn shutdown(manager: &EventManager) {
    info!("scripthook shutting down...");
    manager.unhook_all_functions();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::engine::mock::{MockEngine, MockFunction};
    use crate::sdk::FunctionRef;

    use super::*;

    #[test]
    fn test_shutdown_unhooks() {
        let engine = MockEngine::new();
        let manager = EventManager::new("");
        let event = Arc::new(Event::new("Tick", "", "", AccessMask::ALL, EventStopMode::CallAll));
        manager.add_event(event.clone()).unwrap();
        let handler: FunctionRef = MockFunction::builder(&engine, "OnTick").build();
        event.add_function(&handler).unwrap();

        shutdown(&manager);

        assert_eq!(event.function_count(), 0);
        assert_eq!(engine.mock_function(&handler).unwrap().ref_count(), 1);
    }
}
