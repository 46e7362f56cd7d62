//! # chorus-settings
//!
//! Layered configuration for the chat orchestration core.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ChorusSettings::default()`]
//! 2. **User file**: `~/.chorus/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CHORUS_*` overrides (highest priority)
//!
//! ```no_run
//! use chorus_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("endpoint: {}", settings.channel.endpoint);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    chorus_home, deep_merge, load_settings, load_settings_from_path, resolve_database_path,
    settings_path, validate,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = ChorusSettings::default();
        assert!(validate(&settings).is_ok());
        assert_eq!(settings.orchestrator.default_agent, "general");
        assert_eq!(settings.orchestrator.credential_sentinel, "credentials_required");
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn settings_path_under_chorus_home() {
        assert!(settings_path().starts_with(chorus_home()));
        assert!(settings_path().ends_with("settings.json"));
    }
}
