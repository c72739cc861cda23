//! Session creation and out-of-band dispatch

use std::sync::Arc;

use super::registry::{SessionStats, SessionTable};
use crate::api::handler::ContentHandler;
use crate::api::types::{ContentCommand, ContentCommandResult, SessionId, SessionKind, TerminationCause};
use crate::config::ContentServiceConfig;
use crate::errors::{ContentError, Result};
use crate::media::PipelineFactory;
use crate::session::{ContentSession, SessionSetup};
use crate::transport::TransportContext;

/// Entry point of a content service.
///
/// Creates one [`ContentSession`] per inbound request, keeps it in the
/// [`SessionTable`] until it terminates and routes commands, cancellations
/// and explicit terminations to it by id.
pub struct SessionManager {
    table: Arc<SessionTable>,
    factory: Arc<dyn PipelineFactory>,
    handler: Arc<dyn ContentHandler>,
    config: ContentServiceConfig,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn PipelineFactory>,
        handler: Arc<dyn ContentHandler>,
        config: ContentServiceConfig,
    ) -> Self {
        Self::with_table(Arc::new(SessionTable::new()), factory, handler, config)
    }

    /// Build a manager on an existing table
    pub fn with_table(
        table: Arc<SessionTable>,
        factory: Arc<dyn PipelineFactory>,
        handler: Arc<dyn ContentHandler>,
        config: ContentServiceConfig,
    ) -> Self {
        Self { table, factory, handler, config }
    }

    pub fn table(&self) -> &Arc<SessionTable> {
        &self.table
    }

    pub fn config(&self) -> &ContentServiceConfig {
        &self.config
    }

    /// Create and register a session for an inbound request
    pub async fn create_session(
        &self,
        kind: SessionKind,
        transport: Arc<dyn TransportContext>,
        content_id: Option<String>,
    ) -> Result<Arc<ContentSession>> {
        let config = match kind {
            SessionKind::Player => self.config.player,
            SessionKind::Recorder => self.config.recorder,
        };

        let session = ContentSession::new(SessionSetup {
            kind,
            content_id,
            config,
            handler: self.handler.clone(),
            transport,
            factory: self.factory.clone(),
            table: Arc::downgrade(&self.table),
        });
        self.table.insert(session.clone()).await?;

        tracing::info!("Created {} session {}", kind, session.id());
        Ok(session)
    }

    /// Create a session and hand it to `on_content_request`.
    ///
    /// A handler failure terminates the session and is returned here.
    pub async fn handle_request(
        &self,
        kind: SessionKind,
        transport: Arc<dyn TransportContext>,
        content_id: Option<String>,
    ) -> Result<Arc<ContentSession>> {
        let session = self.create_session(kind, transport, content_id).await?;

        if let Err(e) = self.handler.on_content_request(&session).await {
            let err = ContentError::from_unexpected(e);
            tracing::warn!("Content request handler of session {} failed: {}", session.id(), err);
            session.terminate_with(TerminationCause::Error(err.clone())).await;
            return Err(err);
        }

        Ok(session)
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Option<Arc<ContentSession>> {
        self.table.get(session_id).await
    }

    pub async fn handle_command(
        &self,
        session_id: &SessionId,
        command: ContentCommand,
    ) -> Result<ContentCommandResult> {
        self.require(session_id).await?.handle_command(command).await
    }

    /// Terminate a live session normally
    pub async fn terminate_session(&self, session_id: &SessionId, code: i32, description: &str) -> Result<bool> {
        Ok(self.require(session_id).await?.terminate(code, description).await)
    }

    /// The transport cancelled or timed out the session's request
    pub async fn cancel_session(&self, session_id: &SessionId) -> Result<bool> {
        Ok(self.require(session_id).await?.cancel().await)
    }

    pub async fn list_active_sessions(&self) -> Vec<SessionId> {
        self.table.ids().await
    }

    pub async fn get_stats(&self) -> SessionStats {
        self.table.stats().await
    }

    /// Terminate every live session; returns how many this call terminated
    pub async fn shutdown(&self) -> usize {
        let sessions = self.table.snapshot().await;
        tracing::info!("Shutting down content sessions: {} live", sessions.len());

        let code = self.config.shutdown_code;
        let description = self.config.shutdown_description.as_str();
        let results = futures::future::join_all(
            sessions.iter().map(|session| session.terminate(code, description)),
        )
        .await;

        results.into_iter().filter(|terminated| *terminated).count()
    }

    async fn require(&self, session_id: &SessionId) -> Result<Arc<ContentSession>> {
        self.table
            .get(session_id)
            .await
            .ok_or_else(|| ContentError::session_not_found(session_id.as_str()))
    }
}
