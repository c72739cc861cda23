//! Content session state machine
//!
//! `CREATED -> ACTIVE -> TERMINATING -> TERMINATED`, forward only. The
//! implementation is split by concern:
//! - `session`: state, accessors and activation (`start_*`)
//! - `termination`: the termination funnel, explicit termination and commands
//! - `events`: media server events observed while the session is live

mod events;
mod session;
mod termination;

pub use session::ContentSession;
pub(crate) use session::SessionSetup;
