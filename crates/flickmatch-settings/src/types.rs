//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file is valid; missing fields get their default value.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 5000 },
///   "sessions": { "idleTimeoutSecs": 1800 },
///   "logging": { "level": "debug", "format": "pretty" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlickmatchSettings {
    /// Network and connection settings.
    pub server: ServerSettings,
    /// Session registry settings.
    pub sessions: SessionSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl FlickmatchSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be at least 1".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalSecs must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutSecs ({}) is shorter than heartbeatIntervalSecs ({})",
                self.server.heartbeat_timeout_secs, self.server.heartbeat_interval_secs
            )));
        }
        if !(MIN_SESSION_ID_LENGTH..=MAX_SESSION_ID_LENGTH).contains(&self.sessions.id_length) {
            return Err(SettingsError::InvalidValue(format!(
                "sessions.idLength must be within {MIN_SESSION_ID_LENGTH}..={MAX_SESSION_ID_LENGTH}, got {}",
                self.sessions.id_length
            )));
        }
        if self.sessions.idle_timeout_secs > 0 && self.sessions.sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "sessions.sweepIntervalSecs must be at least 1 when idle expiry is enabled".into(),
            ));
        }
        if !is_log_level(&self.logging.level) {
            return Err(SettingsError::InvalidValue(format!(
                "logging.level must be one of {LOG_LEVELS:?}, got {:?}",
                self.logging.level
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(SettingsError::InvalidValue(format!(
                "logging.format must be one of {LOG_FORMATS:?}, got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

/// Shortest accepted session id length.
pub const MIN_SESSION_ID_LENGTH: usize = 4;
/// Longest accepted session id length.
pub const MAX_SESSION_ID_LENGTH: usize = 64;
/// Accepted `logging.format` values.
pub const LOG_FORMATS: &[&str] = &["json", "pretty"];
/// Accepted `logging.level` values, matched case-insensitively.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Whether `level` names a tracing level.
pub fn is_log_level(level: &str) -> bool {
    LOG_LEVELS.iter().any(|l| l.eq_ignore_ascii_case(level))
}

/// Server network and connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Seconds between server Ping frames.
    pub heartbeat_interval_secs: u64,
    /// Seconds without a Pong before the connection is closed.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_size: usize,
    /// Outbound queue length per connection.
    pub send_queue_capacity: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_connections: 1000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 64 * 1024,
            send_queue_capacity: 1024,
        }
    }
}

/// Session registry settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Length of generated session ids.
    pub id_length: usize,
    /// Inactivity after which a session is torn down. `0` disables expiry.
    pub idle_timeout_secs: u64,
    /// How often the idle sweeper runs.
    pub sweep_interval_secs: u64,
    /// Buffer of the session event channel.
    pub event_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            id_length: 9,
            idle_timeout_secs: 0,
            sweep_interval_secs: 60,
            event_capacity: 1024,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level filter (`RUST_LOG` wins when set).
    pub level: String,
    /// Output format: `json` or `pretty`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}
