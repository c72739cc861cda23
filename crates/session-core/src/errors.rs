//! Error handling for content sessions
//!
//! Every failure reported by this crate is a [`ContentError`] carrying a
//! stable numeric code. Callers branch on [`ContentError::code`], never on the
//! message text.
//!
//! ## Code ranges
//!
//! - `0`, `1`: termination codes (normal completion, remote teardown)
//! - `1xxxx`: validation, fixable by the caller
//! - `2xxxx`: provisioning, transport and internal failures

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for content session operations
pub type Result<T> = std::result::Result<T, ContentError>;

/// Boxed cause preserved by wrapped errors
pub type ErrorSource = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Stable, caller-facing error and termination codes
pub mod codes {
    /// Session ended normally (user request or end of stream)
    pub const NORMAL_TERMINATION: i32 = 0;
    /// The media server tore the session down on its own
    pub const REMOTE_TERMINATED: i32 = 1;

    /// Null or blank content locator, or null repository item
    pub const NULL_CONTENT_LOCATOR: i32 = 10027;
    /// Null source element
    pub const NULL_SOURCE_ELEMENT: i32 = 10028;
    /// Operation not allowed in the current session state
    pub const INVALID_SESSION_STATE: i32 = 10029;
    /// No live session with the given id
    pub const SESSION_NOT_FOUND: i32 = 10030;
    /// A session with the same id is already registered
    pub const DUPLICATE_SESSION_ID: i32 = 10031;
    /// Configuration could not be parsed or loaded
    pub const INVALID_CONFIGURATION: i32 = 10032;

    /// Generic code for failures nobody declared
    pub const UNEXPECTED_FAILURE: i32 = 20029;
    /// Conventional code for media engine allocation/connection failures
    pub const PROVISIONING_FAILED: i32 = 20030;
    /// The transport layer cancelled or timed out the request
    pub const TRANSPORT_CANCELLED: i32 = 20031;
    /// The activation response could not be written to the transport
    pub const TRANSPORT_RESPONSE_FAILED: i32 = 20032;
    /// The session was terminated while it was being activated
    pub const TERMINATED_DURING_ACTIVATION: i32 = 20033;
    /// A content command handler failed without declaring an error
    pub const COMMAND_FAILED: i32 = 20034;
    /// The session manager is shutting down
    pub const MANAGER_SHUTDOWN: i32 = 20035;
}

/// Failure classes, used to pick the callback that reports an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad or missing input
    Validation,
    /// The media engine failed to allocate or connect resources
    Provisioning,
    /// The inbound request failed or was abandoned
    Transport,
    /// A mid-session command failed
    Command,
    /// Unexpected, unclassified failure
    Internal,
}

/// Error type for all content session operations
#[derive(Error, Debug, Clone)]
pub enum ContentError {
    #[error("{message} (code {code})")]
    Validation { code: i32, message: String },

    #[error("{message} (code {code})")]
    Provisioning { code: i32, message: String },

    #[error("{message} (code {code})")]
    Transport { code: i32, message: String },

    #[error("{message} (code {code})")]
    Command {
        code: i32,
        message: String,
        #[source]
        source: Option<ErrorSource>,
    },

    #[error("{message} (code {code})")]
    Internal {
        code: i32,
        message: String,
        #[source]
        source: Option<ErrorSource>,
    },
}

impl ContentError {
    pub fn validation(code: i32, message: impl Into<String>) -> Self {
        Self::Validation { code, message: message.into() }
    }

    pub fn provisioning(code: i32, message: impl Into<String>) -> Self {
        Self::Provisioning { code, message: message.into() }
    }

    pub fn transport(code: i32, message: impl Into<String>) -> Self {
        Self::Transport { code, message: message.into() }
    }

    pub fn command(code: i32, message: impl Into<String>) -> Self {
        Self::Command { code, message: message.into(), source: None }
    }

    pub fn internal(code: i32, message: impl Into<String>) -> Self {
        Self::Internal { code, message: message.into(), source: None }
    }

    pub fn session_not_found(session_id: &str) -> Self {
        Self::validation(codes::SESSION_NOT_FOUND, format!("Session not found: {}", session_id))
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::validation(codes::INVALID_SESSION_STATE, message)
    }

    /// Normalize a collaborator failure.
    ///
    /// A `ContentError` travelling inside the `anyhow::Error` was declared by
    /// the collaborator and is returned unchanged. Anything else is wrapped
    /// as `Internal` with [`codes::UNEXPECTED_FAILURE`], keeping the original
    /// as the source.
    pub fn from_unexpected(err: anyhow::Error) -> Self {
        match err.downcast::<ContentError>() {
            Ok(declared) => declared,
            Err(other) => Self::Internal {
                code: codes::UNEXPECTED_FAILURE,
                message: other.to_string(),
                source: Some(into_source(other)),
            },
        }
    }

    /// Like [`ContentError::from_unexpected`], but undeclared failures become
    /// `Command` errors with [`codes::COMMAND_FAILED`].
    pub fn from_command_failure(err: anyhow::Error) -> Self {
        match err.downcast::<ContentError>() {
            Ok(declared) => declared,
            Err(other) => Self::Command {
                code: codes::COMMAND_FAILED,
                message: other.to_string(),
                source: Some(into_source(other)),
            },
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Validation { code, .. }
            | Self::Provisioning { code, .. }
            | Self::Transport { code, .. }
            | Self::Command { code, .. }
            | Self::Internal { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Provisioning { message, .. }
            | Self::Transport { message, .. }
            | Self::Command { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Provisioning { .. } => ErrorKind::Provisioning,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Command { .. } => ErrorKind::Command,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// True for failures that were wrapped because nobody declared them
    pub fn is_unexpected(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

fn into_source(err: anyhow::Error) -> ErrorSource {
    let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
    Arc::from(boxed)
}
