//! Public API for content applications

pub mod handler;
pub mod types;

pub use handler::ContentHandler;
pub use types::{
    ActivationResponse, ContentCommand, ContentCommandResult, SessionId, SessionKind,
    SessionState, TerminationCause,
};
