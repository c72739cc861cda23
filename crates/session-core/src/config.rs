//! Session and service configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{codes, ContentError, Result};
use crate::logging::LoggingConfig;

/// Per-session behaviour flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Answer the request with a redirect to the media server endpoint
    pub redirect: bool,
    /// Answer through the control protocol instead of redirecting
    pub use_control_protocol: bool,
    /// Let the player's HTTP endpoint end the session at end of stream
    pub terminate_on_eos: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            redirect: true,
            use_control_protocol: false,
            terminate_on_eos: true,
        }
    }
}

impl SessionConfig {
    pub fn with_redirect(mut self, enabled: bool) -> Self {
        self.redirect = enabled;
        self
    }

    pub fn with_control_protocol(mut self, enabled: bool) -> Self {
        self.use_control_protocol = enabled;
        self
    }

    pub fn with_terminate_on_eos(mut self, enabled: bool) -> Self {
        self.terminate_on_eos = enabled;
        self
    }
}

/// Service-wide configuration for a content service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentServiceConfig {
    pub player: SessionConfig,
    pub recorder: SessionConfig,
    /// Code reported to sessions still live when the manager shuts down
    pub shutdown_code: i32,
    pub shutdown_description: String,
    pub logging: LoggingConfig,
}

impl Default for ContentServiceConfig {
    fn default() -> Self {
        Self {
            player: SessionConfig::default(),
            recorder: SessionConfig::default().with_terminate_on_eos(false),
            shutdown_code: codes::MANAGER_SHUTDOWN,
            shutdown_description: "Content service shutting down".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ContentServiceConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ContentError::validation(codes::INVALID_CONFIGURATION, format!("Invalid content service configuration: {}", e))
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            ContentError::validation(
                codes::INVALID_CONFIGURATION,
                format!("Cannot read configuration {}: {}", path.display(), e),
            )
        })?;
        Self::from_yaml_str(&yaml)
    }
}
