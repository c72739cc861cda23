//! # rcontent-session-core
//!
//! Lifecycle controller for HTTP content sessions backed by a remote media
//! server.
//!
//! A content request (play or record) becomes a [`ContentSession`]. The
//! session provisions a media pipeline and endpoints, answers the request,
//! and guarantees that media resources, the user's terminal callback and the
//! request itself are finished together, exactly once, whichever side fails
//! first.
//!
//! ```text
//! SessionManager ── creates ──> ContentSession ── provisions ──> PipelineFactory / MediaPipeline
//!       │                            │                                  │
//!   SessionTable               ContentHandler                    ReleaseRegistry
//! ```
//!
//! Termination always runs the same funnel: release media (newest first),
//! fire one terminal callback, complete the transport, deregister.

pub mod api;
pub mod config;
pub mod errors;
pub mod logging;
pub mod manager;
pub mod media;
pub mod session;
pub mod transport;

pub use api::{
    ActivationResponse, ContentCommand, ContentCommandResult, ContentHandler, SessionId,
    SessionKind, SessionState, TerminationCause,
};
pub use config::{ContentServiceConfig, SessionConfig};
pub use errors::{codes, ContentError, ErrorKind, Result};
pub use logging::{setup_logging, LogFormat, LoggingConfig};
pub use manager::{SessionManager, SessionStats, SessionTable};
pub use media::{
    ContentSource, HttpEndpointOptions, HttpMethod, MediaElement, MediaPipeline, PipelineFactory,
    RepositoryItem, UriEndpointKind,
};
pub use session::ContentSession;
pub use transport::TransportContext;
