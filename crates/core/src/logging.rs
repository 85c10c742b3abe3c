//! Logging setup
//!
//! Installs a `tracing-subscriber` fmt subscriber filtered by the core
//! config. `RUST_LOG` takes precedence when set.

use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;

/// Filter directive for `config`
pub fn filter_directive(config: &CoreConfig) -> String {
    if config.debug {
        "debug".to_string()
    } else if config.log_filter.trim().is_empty() {
        "info".to_string()
    } else {
        config.log_filter.trim().to_string()
    }
}

/// Install the global subscriber
///
/// # Returns
/// `false` if a subscriber was already installed
pub fn init(config: &CoreConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(config)))
        .unwrap_or_else(|err| {
            eprintln!("Invalid log filter '{}': {}", config.log_filter, err);
            EnvFilter::new("info")
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
