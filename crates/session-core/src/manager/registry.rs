//! Live session table
//!
//! Process-wide map of live sessions keyed by id. Every insert and removal
//! goes through one lock, so concurrent sessions cannot lose each other's
//! updates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::types::SessionId;
use crate::errors::{codes, ContentError, Result};
use crate::session::ContentSession;

/// Counters exposed by the session table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub live_sessions: usize,
    pub total_created: usize,
    pub total_terminated: usize,
}

#[derive(Debug, Default)]
struct TableState {
    sessions: HashMap<SessionId, Arc<ContentSession>>,
    total_created: usize,
    total_terminated: usize,
}

#[derive(Debug, Default)]
pub struct SessionTable {
    state: RwLock<TableState>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session; ids are never shared
    pub async fn insert(&self, session: Arc<ContentSession>) -> Result<()> {
        let mut state = self.state.write().await;
        let session_id = session.id().clone();
        if state.sessions.contains_key(&session_id) {
            return Err(ContentError::validation(
                codes::DUPLICATE_SESSION_ID,
                format!("Session {} is already registered", session_id),
            ));
        }

        state.sessions.insert(session_id.clone(), session);
        state.total_created += 1;
        tracing::debug!("Registered content session: {}", session_id);
        Ok(())
    }

    pub async fn remove(&self, session_id: &SessionId) -> Option<Arc<ContentSession>> {
        let mut state = self.state.write().await;
        let removed = state.sessions.remove(session_id);
        if removed.is_some() {
            state.total_terminated += 1;
            tracing::debug!("Unregistered content session: {}", session_id);
        }
        removed
    }

    pub async fn get(&self, session_id: &SessionId) -> Option<Arc<ContentSession>> {
        self.state.read().await.sessions.get(session_id).cloned()
    }

    pub async fn contains(&self, session_id: &SessionId) -> bool {
        self.state.read().await.sessions.contains_key(session_id)
    }

    pub async fn ids(&self) -> Vec<SessionId> {
        self.state.read().await.sessions.keys().cloned().collect()
    }

    /// Live sessions at this instant
    pub async fn snapshot(&self) -> Vec<Arc<ContentSession>> {
        self.state.read().await.sessions.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> SessionStats {
        let state = self.state.read().await;
        SessionStats {
            live_sessions: state.sessions.len(),
            total_created: state.total_created,
            total_terminated: state.total_terminated,
        }
    }
}
