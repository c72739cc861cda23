//! Logging setup for content services
//!
//! The subscriber is configured from the `logging` section of
//! [`ContentServiceConfig`](crate::config::ContentServiceConfig). `RUST_LOG`
//! directives are applied on top of the configured level.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::{codes, ContentError, Result};

/// Output format of the subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level, e.g. `info` or `debug`
    pub level: String,
    pub format: LogFormat,
    /// Include file and line information
    pub file_info: bool,
    /// Log span enter/exit, useful to follow one session's activation
    pub session_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file_info: false,
            session_spans: false,
        }
    }
}

impl LoggingConfig {
    /// Configured level, validated
    pub fn level(&self) -> Result<Level> {
        parse_log_level(&self.level)
    }
}

/// Install the global tracing subscriber.
///
/// Fails with `INVALID_CONFIGURATION` for an unknown level and with
/// `UNEXPECTED_FAILURE` if a global subscriber is already installed.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let level = config.level()?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let span_events = if config.session_spans { FmtSpan::ACTIVE } else { FmtSpan::NONE };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| {
        ContentError::internal(codes::UNEXPECTED_FAILURE, format!("Failed to install logging: {}", e))
    })?;

    tracing::info!("Content service logging at {} v{}", level, env!("CARGO_PKG_VERSION"));
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level)
        .map_err(|_| ContentError::validation(codes::INVALID_CONFIGURATION, format!("Invalid log level: {}", level)))
}
