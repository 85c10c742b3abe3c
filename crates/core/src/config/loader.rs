//! Config path resolution
//!
//! Handles resolving paths for configuration files based on the install
//! location.

use std::path::{Path, PathBuf};

use super::{ConfigError, ConfigResult};

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "SCRIPTHOOK_HOME";

/// Returns the scripthook base directory.
///
/// Uses `SCRIPTHOOK_HOME` when set. Otherwise the host binary is expected at
/// `<base>/bin/<host>`, so this navigates up 2 levels from it.
pub fn scripthook_base_dir() -> ConfigResult<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|home| !home.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    let exe = std::env::current_exe().map_err(ConfigError::IoError)?;
    base_dir_from_exe(&exe)
}

fn base_dir_from_exe(exe: &Path) -> ConfigResult<PathBuf> {
    // Navigate: <host> -> bin -> <base>
    exe.parent() // bin/
        .and_then(|p| p.parent()) // <base>/
        .map(PathBuf::from)
        .ok_or(ConfigError::NoConfigDirectory)
}

/// Returns the base configs directory.
///
/// Path: `<base>/configs/`
pub fn configs_dir() -> ConfigResult<PathBuf> {
    Ok(scripthook_base_dir()?.join("configs"))
}

/// Returns the core framework config path.
///
/// Path: `<base>/configs/core.toml`
pub fn core_config_path() -> ConfigResult<PathBuf> {
    Ok(configs_dir()?.join("core.toml"))
}

/// Returns the event definitions path.
///
/// Path: `<base>/configs/events.toml`
pub fn events_config_path() -> ConfigResult<PathBuf> {
    Ok(configs_dir()?.join("events.toml"))
}
