//! # logrelay-settings
//!
//! Configuration for the relay server, the subscriber client and the producer.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **User file**: `~/.logrelay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `LOGRELAY_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use logrelay_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("relay port: {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<RelaySettings> = OnceLock::new();

/// Get the global settings instance.
///
/// Loaded on first call. Falls back to compiled defaults if the settings
/// file cannot be read or parsed.
pub fn get_settings() -> &'static RelaySettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: RelaySettings) -> std::result::Result<(), RelaySettings> {
    SETTINGS.set(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_relay_contract() {
        let settings = RelaySettings::default();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 60721);
        assert_eq!(settings.server.ticket, "debug_console_auth");
        assert!(!settings.server.strict_schema);
        assert_eq!(settings.client.backoff_ms, 5_000);
        assert_eq!(settings.client.relay_url, "ws://localhost:60721/ws");
        assert_eq!(settings.logging.level, "info");
    }
}
