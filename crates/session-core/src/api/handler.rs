//! User callbacks for content sessions
//!
//! Applications implement [`ContentHandler`] to decide what each request
//! plays or records and to observe how sessions end. Callback errors never
//! escape into the session lifecycle: they are logged, or reported back
//! through [`ContentHandler::on_uncaught_exception`] where noted.

use async_trait::async_trait;

use super::types::{ContentCommand, ContentCommandResult};
use crate::errors::{codes, ContentError};
use crate::session::ContentSession;

#[async_trait]
pub trait ContentHandler: Send + Sync {
    /// A new request arrived. Typically calls one of the `start_*` methods.
    ///
    /// An error here terminates the session as an unexpected failure.
    async fn on_content_request(&self, session: &ContentSession) -> anyhow::Result<()>;

    /// Media is provisioned and the client has been answered
    async fn on_content_started(&self, _session: &ContentSession) -> anyhow::Result<()> {
        Ok(())
    }

    /// Out-of-band command. Failures are returned to the sender and reported
    /// through `on_uncaught_exception`; they never end the session.
    async fn on_content_command(
        &self,
        _session: &ContentSession,
        command: ContentCommand,
    ) -> anyhow::Result<ContentCommandResult> {
        Err(ContentError::command(
            codes::COMMAND_FAILED,
            format!("Unsupported content command: {}", command.command_type),
        )
        .into())
    }

    /// Terminal callback for normal and remote-signaled termination
    async fn on_session_terminated(
        &self,
        _session: &ContentSession,
        code: i32,
        description: &str,
    ) -> anyhow::Result<()> {
        tracing::debug!("Session terminated with code {}: {}", code, description);
        Ok(())
    }

    /// Terminal callback for declared failures
    async fn on_session_error(
        &self,
        _session: &ContentSession,
        code: i32,
        description: &str,
    ) -> anyhow::Result<()> {
        tracing::warn!("Session error {}: {}", code, description);
        Ok(())
    }

    /// Unexpected failures; terminal when the session ended because of one
    async fn on_uncaught_exception(
        &self,
        _session: &ContentSession,
        error: &ContentError,
    ) -> anyhow::Result<()> {
        tracing::error!("Uncaught failure in content session: {}", error);
        Ok(())
    }
}
