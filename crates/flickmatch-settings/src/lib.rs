//! # flickmatch-settings
//!
//! Layered configuration for the Flickmatch server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`FlickmatchSettings::default()`]
//! 2. **User file**: `~/.flickmatch/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `FLICKMATCH_*` overrides (highest priority)
//!
//! The binary applies CLI flags on top of the loaded value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_file_layer, load_settings_from_path, settings_path,
};
pub use types::*;
