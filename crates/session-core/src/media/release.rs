//! Resource Release Registry
//!
//! Tracks media server resources acquired by a session and releases them
//! exactly once, newest first, so endpoints go before the pipeline that
//! hosts them.

use std::sync::Arc;
use tokio::sync::Mutex;

use super::{MediaElement, MediaPipeline};

/// A media server resource owned by a session
#[derive(Clone)]
pub enum ReleasableResource {
    Pipeline(Arc<dyn MediaPipeline>),
    Element(Arc<dyn MediaElement>),
}

impl ReleasableResource {
    pub fn id(&self) -> &str {
        match self {
            Self::Pipeline(pipeline) => pipeline.id(),
            Self::Element(element) => element.id(),
        }
    }

    async fn release(&self) -> anyhow::Result<()> {
        match self {
            Self::Pipeline(pipeline) => pipeline.release().await,
            Self::Element(element) => element.release().await,
        }
    }
}

impl std::fmt::Debug for ReleasableResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pipeline(p) => write!(f, "Pipeline({})", p.id()),
            Self::Element(e) => write!(f, "Element({})", e.id()),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    resources: Vec<ReleasableResource>,
    released: bool,
}

/// Session-scoped registry of resources to release on termination.
///
/// `register` and `release_all` are serialized by the same lock. Once
/// `release_all` has started, late registrations are released on the spot.
#[derive(Debug)]
pub struct ReleaseRegistry {
    owner: String,
    state: Mutex<RegistryState>,
}

impl ReleaseRegistry {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Record a resource in acquisition order.
    ///
    /// Returns `false` when the registry is already released; the resource
    /// has then been released immediately instead of being tracked.
    pub async fn register(&self, resource: ReleasableResource) -> bool {
        let mut state = self.state.lock().await;
        if state.released {
            tracing::warn!(
                "Session {} already released its resources, releasing late {:?} now",
                self.owner,
                resource
            );
            release_one(&self.owner, &resource).await;
            return false;
        }

        tracing::debug!("Session {} will release {:?} on termination", self.owner, resource);
        state.resources.push(resource);
        true
    }

    /// Release every registered resource in reverse acquisition order.
    ///
    /// Individual failures are logged and skipped. A second call is a no-op
    /// and returns 0.
    pub async fn release_all(&self) -> usize {
        let mut state = self.state.lock().await;
        if state.released {
            return 0;
        }
        state.released = true;

        let resources = std::mem::take(&mut state.resources);
        let count = resources.len();
        for resource in resources.iter().rev() {
            release_one(&self.owner, resource).await;
        }

        tracing::info!("Session {} released {} media resources", self.owner, count);
        count
    }

    pub async fn is_released(&self) -> bool {
        self.state.lock().await.released
    }

    /// Number of resources waiting to be released
    pub async fn len(&self) -> usize {
        self.state.lock().await.resources.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn release_one(owner: &str, resource: &ReleasableResource) {
    match resource.release().await {
        Ok(()) => tracing::debug!("Session {} released {:?}", owner, resource),
        Err(e) => tracing::error!("Session {} failed to release {:?}: {}", owner, resource, e),
    }
}
