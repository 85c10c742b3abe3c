//! Configuration system for scripthook
//!
//! This module provides a trait-based configuration system that supports:
//! - Type-safe config structs via serde
//! - TOML file format
//! - Auto-generation of default configs
//! - Manual reload capability
//!
//! Two files are defined here: `core.toml` for framework settings and
//! `events.toml` for the events exposed to scripts.
//!
//! # Example
//!
//! ```ignore
//! use scripthook_core::{ConfigFile, CoreConfig, EventManager, EventsConfig};
//!
//! let core = CoreConfig::load()?;
//! scripthook_core::logging::init(&core);
//!
//! let events = EventsConfig::load()?;
//! let manager = EventManager::from_config(&core.namespace, &events)?;
//! ```
//!
//! ```toml
//! # configs/events.toml
//! [[events]]
//! name = "PlayerSpawn"
//! category = "Player"
//! arguments = "int index"
//! stop_mode = "on_handled"
//! ```

mod loader;

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::events::{AccessMask, Event, EventStopMode};

pub use loader::{configs_dir, core_config_path, events_config_path, scripthook_base_dir, HOME_ENV};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine config directory
    #[error("Config directory not available - set {} or run from an installed layout", HOME_ENV)]
    NoConfigDirectory,

    /// An event definition can't be turned into an event
    #[error("Invalid event definition '{name}': {reason}")]
    InvalidEvent { name: String, reason: String },
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Trait for configuration files.
///
/// # Requirements
///
/// Your config type must implement:
/// - `Default` - for generating initial config files
/// - `Serialize` - for saving to TOML
/// - `DeserializeOwned` - for loading from TOML
/// - `Send + Sync` - for thread-safe access
///
/// # File Location
///
/// Configs are stored at `<base>/configs/{FILE_NAME}`.
pub trait ConfigFile: Default + Serialize + DeserializeOwned + Send + Sync {
    /// File name under the configs directory
    const FILE_NAME: &'static str;

    fn path() -> ConfigResult<PathBuf> {
        Ok(configs_dir()?.join(Self::FILE_NAME))
    }

    /// Load config from file, creating default if missing.
    fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load config from `path`, creating default if missing.
    fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            tracing::debug!("Loaded {} from {:?}", Self::FILE_NAME, path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!("Created default {} at {:?}", Self::FILE_NAME, path);
            Ok(default)
        }
    }

    /// Save config to file.
    fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::path()?)
    }

    /// Save config to `path`.
    ///
    /// Creates parent directories if they don't exist.
    fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved {} to {:?}", Self::FILE_NAME, path);
        Ok(())
    }

    /// Reload config from file.
    ///
    /// Updates self with the current file contents.
    fn reload(&mut self) -> ConfigResult<()> {
        self.reload_from(&Self::path()?)
    }

    fn reload_from(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = toml::from_str(&content)?;
        tracing::debug!("Reloaded {} from {:?}", Self::FILE_NAME, path);
        Ok(())
    }
}

/// Core framework configuration.
///
/// Loaded from `<base>/configs/core.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// `tracing` filter directive used when `debug` is off
    pub log_filter: String,

    /// Script namespace events are registered under
    pub namespace: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            log_filter: "info".to_string(),
            namespace: String::new(),
        }
    }
}

impl ConfigFile for CoreConfig {
    const FILE_NAME: &'static str = "core.toml";
}

/// Events exposed to scripts.
///
/// Loaded from `<base>/configs/events.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub events: Vec<EventDefinition>,
}

impl ConfigFile for EventsConfig {
    const FILE_NAME: &'static str = "events.toml";
}

/// One event in `events.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,

    #[serde(default)]
    pub category: String,

    /// Hook parameter list, e.g. `int index, const string& in reason`
    #[serde(default)]
    pub arguments: String,

    #[serde(default = "default_access_mask")]
    pub access_mask: u32,

    #[serde(default)]
    pub stop_mode: EventStopMode,
}

fn default_access_mask() -> u32 {
    AccessMask::ALL.bits()
}

impl EventDefinition {
    pub fn new(name: &str, category: &str, arguments: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            arguments: arguments.to_string(),
            access_mask: default_access_mask(),
            stop_mode: EventStopMode::default(),
        }
    }

    /// Build the event this definition describes
    pub fn to_event(&self) -> ConfigResult<Event> {
        let invalid = |reason: &str| ConfigError::InvalidEvent {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if !is_identifier(&self.name) {
            return Err(invalid("name must be a script identifier"));
        }

        if !self.category.is_empty() && !self.category.split("::").all(is_identifier) {
            return Err(invalid("category must be a script namespace"));
        }

        if self.access_mask == 0 {
            return Err(invalid("access mask must not be empty"));
        }

        Ok(Event::new(
            &self.name,
            &self.arguments,
            &self.category,
            AccessMask::from_bits_retain(self.access_mask),
            self.stop_mode,
        ))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("scripthook-config-{}-{}", std::process::id(), name))
            .join("configs")
            .join(name)
    }

    #[test]
    fn test_core_config_default() {
        let config = CoreConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.log_filter, "info");
        assert!(config.namespace.is_empty());
    }

    #[test]
    fn test_core_config_serialize() {
        let config = CoreConfig {
            version: 2,
            debug: true,
            namespace: "Events".to_string(),
            ..Default::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("version = 2"));
        assert!(toml_str.contains("debug = true"));
        assert!(toml_str.contains("namespace = \"Events\""));
    }

    #[test]
    fn test_core_config_partial_file() {
        let config: CoreConfig = toml::from_str("debug = true").unwrap();
        assert!(config.debug);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_load_creates_default_then_round_trips() {
        let path = temp_path("core.toml");
        let _ = std::fs::remove_file(&path);

        let created = CoreConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.version, 1);

        let mut edited = created.clone();
        edited.namespace = "Game".to_string();
        edited.save_to(&path).unwrap();

        let mut reloaded = created;
        reloaded.reload_from(&path).unwrap();
        assert_eq!(reloaded.namespace, "Game");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_events_config_parse() {
        let config: EventsConfig = toml::from_str(
            r#"
            [[events]]
            name = "PlayerSpawn"
            category = "Player"
            arguments = "int index"
            stop_mode = "on_handled"

            [[events]]
            name = "MapInit"
            access_mask = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.events.len(), 2);
        assert_eq!(config.events[0].stop_mode, EventStopMode::OnHandled);
        assert_eq!(config.events[0].access_mask, u32::MAX);
        assert_eq!(config.events[1].category, "");
        assert_eq!(config.events[1].access_mask, 2);
    }

    #[test]
    fn test_event_definition_to_event() {
        let event = EventDefinition::new("PlayerSpawn", "Game::Player", "int index")
            .to_event()
            .unwrap();
        assert_eq!(event.qualified_name(), "Game::Player::PlayerSpawn");
        assert_eq!(event.access_mask(), AccessMask::ALL);
    }

    #[test]
    fn test_event_definition_rejects_invalid() {
        let mut definition = EventDefinition::new("PlayerSpawn", "", "");
        definition.access_mask = 0;
        assert!(matches!(definition.to_event(), Err(ConfigError::InvalidEvent { .. })));

        let definition = EventDefinition::new("Player Spawn", "", "");
        assert!(matches!(definition.to_event(), Err(ConfigError::InvalidEvent { .. })));

        let definition = EventDefinition::new("Spawn", "Player::", "");
        assert!(matches!(definition.to_event(), Err(ConfigError::InvalidEvent { .. })));
    }
}
