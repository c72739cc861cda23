//! Session Manager Module
//!
//! Process-wide bookkeeping of live content sessions.

pub mod registry;
pub mod session_manager;

pub use registry::{SessionStats, SessionTable};
pub use session_manager::SessionManager;
