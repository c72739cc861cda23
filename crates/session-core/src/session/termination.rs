//! Termination funnel and mid-session operations

use std::sync::atomic::Ordering;

use super::ContentSession;
use crate::api::types::{
    ContentCommand, ContentCommandResult, SessionState, TerminationCause,
    REMOTE_TERMINATED_DESCRIPTION,
};
use crate::errors::{codes, ContentError, Result};

impl ContentSession {
    /// End the session normally with a caller-chosen code.
    ///
    /// Returns `false` if the session was already terminating.
    pub async fn terminate(&self, code: i32, description: &str) -> bool {
        self.terminate_with(TerminationCause::normal(code, description)).await
    }

    /// End the session with an error, reported through `on_session_error`
    /// (or `on_uncaught_exception` for unexpected failures).
    pub async fn terminate_with_error(&self, error: ContentError) -> bool {
        self.terminate_with(TerminationCause::Error(error)).await
    }

    /// The transport layer abandoned or timed out the request
    pub async fn cancel(&self) -> bool {
        tracing::info!("Transport cancelled content request of session {}", self.id);
        self.terminate_with(TerminationCause::Error(ContentError::transport(
            codes::TRANSPORT_CANCELLED,
            "Content request cancelled by the transport",
        )))
        .await
    }

    /// Forward a client command to the handler.
    ///
    /// A failing handler gets `on_uncaught_exception`, the failure goes back
    /// to the caller and the session stays as it was.
    pub async fn handle_command(&self, command: ContentCommand) -> Result<ContentCommandResult> {
        let state = self.state();
        if state.is_terminal() {
            return Err(ContentError::invalid_state(format!(
                "Session {} cannot handle commands in state {:?}",
                self.id, state
            )));
        }

        tracing::debug!("Session {} received command {}", self.id, command.command_type);
        match self.handler.on_content_command(self, command).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let err = ContentError::from_command_failure(e);
                tracing::warn!("Command handler of session {} failed: {}", self.id, err);
                if let Err(cb) = self.handler.on_uncaught_exception(self, &err).await {
                    tracing::error!("on_uncaught_exception failed for session {}: {}", self.id, cb);
                }
                Err(err)
            }
        }
    }

    /// Single path to TERMINATED for every trigger.
    ///
    /// Only the first caller wins the CAS into TERMINATING; it then releases
    /// media, fires exactly one terminal callback, completes the transport
    /// and deregisters the session, in that order.
    pub(crate) async fn terminate_with(&self, cause: TerminationCause) -> bool {
        let previous = match self.state.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            (current < SessionState::Terminating as u8).then_some(SessionState::Terminating as u8)
        }) {
            Ok(previous) => SessionState::from_u8(previous),
            Err(current) => {
                tracing::debug!(
                    "Session {} already {:?}, ignoring termination ({})",
                    self.id,
                    SessionState::from_u8(current),
                    cause.description()
                );
                return false;
            }
        };

        tracing::info!(
            "Terminating session {} from {:?} with code {}: {}",
            self.id,
            previous,
            cause.code(),
            cause.description()
        );
        *self.cause.lock() = Some(cause.clone());
        self.shutdown.cancel();

        self.releaser.release_all().await;
        self.media.lock().take();

        self.notify_terminated(&cause).await;

        {
            let mut done = self.transport_done.lock().await;
            *done = true;
            if let Err(e) = self.transport.complete().await {
                tracing::error!("Failed to complete transport of session {}: {}", self.id, e);
            }
        }

        self.state.store(SessionState::Terminated as u8, Ordering::SeqCst);

        if let Some(table) = self.table.upgrade() {
            table.remove(&self.id).await;
        }

        tracing::info!("Session {} terminated", self.id);
        true
    }

    async fn notify_terminated(&self, cause: &TerminationCause) {
        let result = match cause {
            TerminationCause::Normal { code, description } => {
                self.handler.on_session_terminated(self, *code, description).await
            }
            TerminationCause::RemoteSignaled => {
                self.handler
                    .on_session_terminated(self, codes::REMOTE_TERMINATED, REMOTE_TERMINATED_DESCRIPTION)
                    .await
            }
            TerminationCause::Error(err) if err.is_unexpected() => {
                self.handler.on_uncaught_exception(self, err).await
            }
            TerminationCause::Error(err) => {
                self.handler.on_session_error(self, err.code(), err.message()).await
            }
        };

        if let Err(e) = result {
            tracing::error!("Terminal callback of session {} failed: {}", self.id, e);
        }
    }
}
