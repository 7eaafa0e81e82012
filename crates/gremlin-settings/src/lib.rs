//! # gremlin-settings
//!
//! Configuration for the Gremlin WebSocket driver.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`GremlinSettings::default()`]
//! 2. **User file**: `~/.gremlin/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `GREMLIN_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use gremlin_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("server: {}", settings.connection.url().unwrap());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_from, deep_merge, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
