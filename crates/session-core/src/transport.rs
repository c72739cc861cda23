//! Inbound request context
//!
//! The web server hands every content request to a session as a
//! [`TransportContext`]. The session owns it exclusively, answers it once
//! media is provisioned and completes it exactly once, at termination.

use async_trait::async_trait;

use crate::api::types::ActivationResponse;

#[async_trait]
pub trait TransportContext: Send + Sync {
    /// Answer the request once media is ready
    async fn respond(&self, response: ActivationResponse) -> anyhow::Result<()>;

    /// Mark the request finished. Must be idempotent.
    async fn complete(&self) -> anyhow::Result<()>;
}
