//! Configuration.
//!
//! Static settings are read once from an INI file ([`ConfigFile`]); values
//! that may change while the engine runs live in [`SharedSettings`].

mod file;
mod settings;

pub use file::{
    default_path, ConfigError, ConfigFile, NavigationConfig, DEFAULT_RECONCILE_INTERVAL_MS,
};
pub use settings::{SharedSettings, DEFAULT_REFRESH_RATE_MS, MIN_REFRESH_RATE_MS};
