//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`FlickmatchSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `FLICKMATCH_*` environment variable overrides
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{
    FlickmatchSettings, LOG_FORMATS, MAX_SESSION_ID_LENGTH, MIN_SESSION_ID_LENGTH, is_log_level,
};

/// Resolve the default settings file (`~/.flickmatch/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".flickmatch").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid final value
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<FlickmatchSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults plus the file at `path`, without env overrides or validation.
pub fn load_file_layer(path: &Path) -> Result<FlickmatchSettings> {
    let defaults = serde_json::to_value(FlickmatchSettings::default())?;

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

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut FlickmatchSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides using `lookup` as the variable source.
pub fn apply_overrides_from(
    settings: &mut FlickmatchSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let env = EnvReader { lookup };

    if let Some(v) = env.string("FLICKMATCH_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("FLICKMATCH_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.usize("FLICKMATCH_MAX_CONNECTIONS", 1, 1_000_000) {
        settings.server.max_connections = v;
    }
    let interval = env.u64("FLICKMATCH_HEARTBEAT_INTERVAL_SECS", 1, 3600);
    if let Some(v) = interval {
        settings.server.heartbeat_interval_secs = v;
    }
    let timeout = env.u64("FLICKMATCH_HEARTBEAT_TIMEOUT_SECS", 1, 7200);
    match timeout {
        Some(v) if v >= settings.server.heartbeat_interval_secs => {
            settings.server.heartbeat_timeout_secs = v;
        }
        Some(v) => warn!(
            key = "FLICKMATCH_HEARTBEAT_TIMEOUT_SECS",
            value = v,
            interval = settings.server.heartbeat_interval_secs,
            "heartbeat timeout shorter than interval, ignoring"
        ),
        None => {}
    }
    // An interval raised past the configured timeout drags the timeout along.
    let server = &mut settings.server;
    if interval.is_some() && server.heartbeat_timeout_secs < server.heartbeat_interval_secs {
        let raised = server.heartbeat_interval_secs * 2;
        warn!(
            from = server.heartbeat_timeout_secs,
            to = raised,
            "heartbeat timeout shorter than interval, raising"
        );
        server.heartbeat_timeout_secs = raised;
    }
    if let Some(v) = env.usize(
        "FLICKMATCH_SESSION_ID_LENGTH",
        MIN_SESSION_ID_LENGTH,
        MAX_SESSION_ID_LENGTH,
    ) {
        settings.sessions.id_length = v;
    }
    if let Some(v) = env.u64("FLICKMATCH_IDLE_TIMEOUT_SECS", 0, 7 * 24 * 3600) {
        settings.sessions.idle_timeout_secs = v;
    }
    if let Some(v) = env.string("FLICKMATCH_LOG_LEVEL") {
        if is_log_level(&v) {
            settings.logging.level = v;
        } else {
            warn!(key = "FLICKMATCH_LOG_LEVEL", value = %v, "invalid log level, ignoring");
        }
    }
    if let Some(v) = env.string("FLICKMATCH_LOG_FORMAT") {
        if LOG_FORMATS.contains(&v.as_str()) {
            settings.logging.format = v;
        } else {
            warn!(key = "FLICKMATCH_LOG_FORMAT", value = %v, "invalid log format, ignoring");
        }
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::errors::SettingsError;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 5000, "host": "0.0.0.0"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "0.0.0.0");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings, FlickmatchSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "sessions": {"idleTimeoutSecs": 900}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.sessions.idle_timeout_secs, 900);
        assert_eq!(settings.sessions.id_length, 9);
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn load_invalid_value_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"logging": {"format": "xml"}}"#).unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = FlickmatchSettings::default();
        apply_overrides_from(
            &mut settings,
            vars(&[
                ("FLICKMATCH_HOST", "127.0.0.1"),
                ("FLICKMATCH_PORT", "8088"),
                ("FLICKMATCH_MAX_CONNECTIONS", "50"),
                ("FLICKMATCH_HEARTBEAT_INTERVAL_SECS", "15"),
                ("FLICKMATCH_SESSION_ID_LENGTH", "12"),
                ("FLICKMATCH_IDLE_TIMEOUT_SECS", "600"),
                ("FLICKMATCH_LOG_LEVEL", "debug"),
                ("FLICKMATCH_LOG_FORMAT", "pretty"),
            ]),
        );
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8088);
        assert_eq!(settings.server.max_connections, 50);
        assert_eq!(settings.server.heartbeat_interval_secs, 15);
        assert_eq!(settings.sessions.id_length, 12);
        assert_eq!(settings.sessions.idle_timeout_secs, 600);
        assert_eq!(settings.logging.level, "debug");
        assert_eq!(settings.logging.format, "pretty");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = FlickmatchSettings::default();
        apply_overrides_from(
            &mut settings,
            vars(&[
                ("FLICKMATCH_PORT", "not-a-port"),
                ("FLICKMATCH_SESSION_ID_LENGTH", "1"),
                ("FLICKMATCH_LOG_FORMAT", "xml"),
                ("FLICKMATCH_HOST", ""),
            ]),
        );
        assert_eq!(settings, FlickmatchSettings::default());
    }

    #[test]
    fn invalid_log_level_is_ignored() {
        let mut settings = FlickmatchSettings::default();
        apply_overrides_from(&mut settings, vars(&[("FLICKMATCH_LOG_LEVEL", "verbose")]));
        assert_eq!(settings.logging.level, "info");
        assert!(settings.validate().is_ok());

        apply_overrides_from(&mut settings, vars(&[("FLICKMATCH_LOG_LEVEL", "TRACE")]));
        assert_eq!(settings.logging.level, "TRACE");
    }

    #[test]
    fn long_heartbeat_interval_raises_timeout() {
        let mut settings = FlickmatchSettings::default();
        apply_overrides_from(
            &mut settings,
            vars(&[("FLICKMATCH_HEARTBEAT_INTERVAL_SECS", "90")]),
        );
        assert_eq!(settings.server.heartbeat_interval_secs, 90);
        assert_eq!(settings.server.heartbeat_timeout_secs, 180);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn heartbeat_timeout_override() {
        let mut settings = FlickmatchSettings::default();
        apply_overrides_from(
            &mut settings,
            vars(&[
                ("FLICKMATCH_HEARTBEAT_INTERVAL_SECS", "90"),
                ("FLICKMATCH_HEARTBEAT_TIMEOUT_SECS", "120"),
            ]),
        );
        assert_eq!(settings.server.heartbeat_timeout_secs, 120);
        assert!(settings.validate().is_ok());

        // Shorter than the interval: ignored, the default still applies.
        let mut settings = FlickmatchSettings::default();
        apply_overrides_from(
            &mut settings,
            vars(&[("FLICKMATCH_HEARTBEAT_TIMEOUT_SECS", "10")]),
        );
        assert_eq!(settings.server.heartbeat_timeout_secs, 60);
        assert!(settings.validate().is_ok());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
        assert_eq!(parse_u64_range("30", 1, 60), Some(30));
        assert_eq!(parse_u64_range("-1", 0, 60), None);
        assert_eq!(parse_usize_range("9", 4, 64), Some(9));
        assert_eq!(parse_usize_range("abc", 4, 64), None);
    }
}
