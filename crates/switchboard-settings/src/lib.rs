//! # switchboard-settings
//!
//! Configuration for the switchboard relay server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SwitchboardSettings::default()`]
//! 2. **Settings file**: `~/.switchboard/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `SWITCHBOARD_*` overrides
//!
//! The binary applies CLI flags on top of whatever this crate returns.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides, deep_merge, load_settings, load_settings_from_path,
    load_with_env, settings_path,
};
pub use types::{LogLevel, LoggingSettings, ServerSettings, SwitchboardSettings};
