//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If `~/.logrelay/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `LOGRELAY_*` environment overrides
//! 4. Validate values that would make the relay unusable

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

/// Resolve the path to the settings file (`~/.logrelay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".logrelay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = read_file_layer(path)?;
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    validate(&settings)?;
    Ok(settings)
}

fn read_file_layer(path: &Path) -> Result<RelaySettings> {
    let defaults = serde_json::to_value(RelaySettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `LOGRELAY_*` overrides read through `lookup`.
///
/// Invalid values are logged and ignored, keeping the file/default value.
pub fn apply_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    if let Some(v) = env.string("LOGRELAY_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("LOGRELAY_PORT", parse_port) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("LOGRELAY_TICKET") {
        settings.server.ticket.clone_from(&v);
        settings.client.ticket = v;
    }
    if let Some(v) = env.parsed("LOGRELAY_STRICT_SCHEMA", parse_bool) {
        settings.server.strict_schema = v;
    }
    if let Some(v) = env.parsed("LOGRELAY_QUEUE_CAPACITY", |s| parse_range(s, 1, 1_000_000)) {
        settings.server.broadcast_queue_capacity = v;
    }
    if let Some(v) = env.parsed("LOGRELAY_SEND_TIMEOUT_MS", |s| parse_range(s, 10, 600_000)) {
        settings.server.send_timeout_ms = v;
    }
    if let Some(v) = env.string("LOGRELAY_RELAY_URL") {
        settings.client.relay_url = v;
    }
    if let Some(v) = env.parsed("LOGRELAY_BACKOFF_MS", |s| parse_range(s, 1, 3_600_000)) {
        settings.client.backoff_ms = v;
    }
    if let Some(v) = env.string("LOGRELAY_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

/// Reject values that would make the relay unusable.
pub fn validate(settings: &RelaySettings) -> Result<()> {
    let server = &settings.server;
    if server.ticket.is_empty() {
        return Err(SettingsError::InvalidValue("server.ticket must not be empty".into()));
    }
    if server.broadcast_queue_capacity == 0 || server.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "queue capacities must be at least 1".into(),
        ));
    }
    if server.ping_interval_ms == 0 {
        return Err(SettingsError::InvalidValue("server.pingIntervalMs must be positive".into()));
    }
    Ok(())
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid env var, ignoring");
        }
        result
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_port(val: &str) -> Option<u16> {
    val.parse().ok().filter(|p| *p > 0)
}

fn parse_range<T: std::str::FromStr + PartialOrd>(val: &str, min: T, max: T) -> Option<T> {
    let n: T = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 60721, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn merge_array_replace() {
        let merged = deep_merge(
            serde_json::json!({"items": [1, 2, 3]}),
            serde_json::json!({"items": [4]}),
        );
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = read_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server.port, 60721);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"strictSchema": true, "ticket": "s3cret"}, "client": {"backoffMs": 250}}"#,
        )
        .unwrap();

        let settings = read_file_layer(&path).unwrap();
        assert!(settings.server.strict_schema);
        assert_eq!(settings.server.ticket, "s3cret");
        assert_eq!(settings.server.port, 60721);
        assert_eq!(settings.client.backoff_ms, 250);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = read_file_layer(&path);
        assert!(matches!(result, Err(SettingsError::Json(_))));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = RelaySettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("LOGRELAY_PORT", "7000"),
                ("LOGRELAY_TICKET", "other"),
                ("LOGRELAY_STRICT_SCHEMA", "yes"),
                ("LOGRELAY_BACKOFF_MS", "100"),
                ("LOGRELAY_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.server.ticket, "other");
        assert_eq!(settings.client.ticket, "other");
        assert!(settings.server.strict_schema);
        assert_eq!(settings.client.backoff_ms, 100);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = RelaySettings::default();
        apply_overrides(
            &mut settings,
            env(&[
                ("LOGRELAY_PORT", "0"),
                ("LOGRELAY_STRICT_SCHEMA", "maybe"),
                ("LOGRELAY_QUEUE_CAPACITY", "0"),
                ("LOGRELAY_HOST", ""),
            ]),
        );
        assert_eq!(settings.server.port, 60721);
        assert!(!settings.server.strict_schema);
        assert_eq!(settings.server.broadcast_queue_capacity, 1024);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn validate_rejects_empty_ticket() {
        let mut settings = RelaySettings::default();
        settings.server.ticket.clear();
        assert!(matches!(validate(&settings), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut settings = RelaySettings::default();
        settings.server.send_queue_capacity = 0;
        assert!(validate(&settings).is_err());
    }

    #[test]
    fn parse_bool_variants() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nope"), None);
    }
}
