//! Public types shared by sessions, the manager and user handlers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{codes, ContentError};

/// Unique identifier of a content session, fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("content-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Which way content flows through the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Content is delivered to the HTTP client
    Player,
    /// Content is uploaded by the HTTP client
    Recorder,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Player => write!(f, "player"),
            SessionKind::Recorder => write!(f, "recorder"),
        }
    }
}

/// Lifecycle state of a content session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Registered, not yet activated
    Created = 0,
    /// Media provisioned and the response is being delivered
    Active = 1,
    /// The termination funnel is running
    Terminating = 2,
    /// Resources released, callback fired, transport completed
    Terminated = 3,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Created,
            1 => SessionState::Active,
            2 => SessionState::Terminating,
            _ => SessionState::Terminated,
        }
    }

    /// True once the termination funnel has been entered
    pub fn is_terminal(&self) -> bool {
        *self >= SessionState::Terminating
    }
}

/// Why a session ended
#[derive(Debug, Clone)]
pub enum TerminationCause {
    /// User logic or end of stream completed the session
    Normal { code: i32, description: String },
    /// The media server tore the session down
    RemoteSignaled,
    /// Activation, transport or handler failure
    Error(ContentError),
}

impl TerminationCause {
    pub fn normal(code: i32, description: impl Into<String>) -> Self {
        Self::Normal { code, description: description.into() }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Normal { code, .. } => *code,
            Self::RemoteSignaled => codes::REMOTE_TERMINATED,
            Self::Error(err) => err.code(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Normal { description, .. } => description,
            Self::RemoteSignaled => REMOTE_TERMINATED_DESCRIPTION,
            Self::Error(err) => err.message(),
        }
    }
}

pub(crate) const REMOTE_TERMINATED_DESCRIPTION: &str = "remote terminated";

/// Out-of-band command sent by the client while a session is live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCommand {
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub data: String,
}

impl ContentCommand {
    pub fn new(command_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self { command_type: command_type.into(), data: data.into() }
    }
}

/// Handler answer to a [`ContentCommand`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCommandResult {
    pub result: String,
}

impl ContentCommandResult {
    pub fn new(result: impl Into<String>) -> Self {
        Self { result: result.into() }
    }
}

/// How the inbound request is answered once media is provisioned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum ActivationResponse {
    /// Redirect the client to the media server endpoint
    Redirect { url: String },
    /// Answer through the control protocol with the session id and endpoint URL
    #[serde(rename_all = "camelCase")]
    Control { session_id: SessionId, url: String },
    /// Proxy the endpoint through the inbound request
    Tunnel { url: String },
}

impl ActivationResponse {
    pub fn url(&self) -> &str {
        match self {
            Self::Redirect { url } | Self::Control { url, .. } | Self::Tunnel { url } => url,
        }
    }

    /// JSON body sent over the control protocol
    pub fn to_json(&self) -> crate::errors::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            ContentError::internal(codes::UNEXPECTED_FAILURE, format!("Failed to encode activation response: {}", e))
        })
    }
}
