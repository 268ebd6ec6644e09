//! # flickmatch-logging
//!
//! Global `tracing` subscriber setup: an [`EnvFilter`] (where `RUST_LOG`
//! wins over the configured level) feeding a JSON or human-readable
//! `fmt` layer on stdout.

#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level string is not a tracing level.
    #[error("invalid log level: {0}")]
    InvalidLevel(String),
    /// The format string is neither `json` nor `pretty`.
    #[error("invalid log format: {0}")]
    InvalidFormat(String),
    /// A global subscriber was already installed.
    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Output format of the stdout layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(LoggingError::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
        })
    }
}

/// Subscriber configuration.
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Default level. Overridden by `RUST_LOG`.
    pub level: Level,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
        }
    }
}

impl LogConfig {
    /// Build a config from the string forms used in settings files.
    pub fn from_strings(level: &str, format: &str) -> Result<Self, LoggingError> {
        Ok(Self {
            level: parse_level(level)?,
            format: format.parse()?,
        })
    }

    /// `EnvFilter` directive string for this config.
    pub fn filter_directive(&self) -> String {
        self.level.to_string().to_lowercase()
    }
}

/// Parse a level name (`trace`, `debug`, `info`, `warn`, `error`).
pub fn parse_level(s: &str) -> Result<Level, LoggingError> {
    s.parse::<Level>()
        .map_err(|_| LoggingError::InvalidLevel(s.to_string()))
}

/// Install the global subscriber. Call once at startup.
pub fn init_subscriber(config: &LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}
