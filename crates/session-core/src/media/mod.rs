//! Media engine integration
//!
//! The media server is consumed only through the narrow traits in this
//! module. Sessions never talk to the engine directly: provisioning builds
//! the pipeline and endpoints, and the release registry tears them down.
//!
//! Architecture:
//! - `PipelineFactory` / `MediaPipeline` / `MediaElement`: engine capabilities
//! - `RepositoryItem`: repository-backed content that exposes its own endpoint
//! - `release`: ordered, exactly-once teardown of acquired resources
//! - `provisioning`: player and recorder wiring strategies

pub mod provisioning;
pub mod release;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;

pub use provisioning::{ContentSource, ProvisionedMedia, Provisioner};
pub use release::{ReleasableResource, ReleaseRegistry};

/// Creates the per-session media pipeline
#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn create(&self) -> anyhow::Result<Arc<dyn MediaPipeline>>;
}

/// Remote processing graph allocated by the media server
#[async_trait]
pub trait MediaPipeline: Send + Sync {
    fn id(&self) -> &str;

    /// Build an endpoint bound to a content locator (player or recorder endpoint)
    async fn new_uri_endpoint(
        &self,
        kind: UriEndpointKind,
        locator: &str,
    ) -> anyhow::Result<Arc<dyn MediaElement>>;

    /// Build the transport-facing HTTP endpoint
    async fn new_http_endpoint(
        &self,
        options: HttpEndpointOptions,
    ) -> anyhow::Result<Arc<dyn MediaElement>>;

    async fn release(&self) -> anyhow::Result<()>;
}

/// A node in a pipeline: content source, content sink or transport endpoint.
///
/// Event subscriptions hand out one-shot receivers; each fires at most once.
/// Elements that never emit an event keep the default, which returns an
/// already-closed receiver.
#[async_trait]
pub trait MediaElement: Send + Sync {
    fn id(&self) -> &str;

    /// Pipeline owning this element, `None` for repository endpoints
    fn pipeline(&self) -> Option<Arc<dyn MediaPipeline>>;

    /// Route this element's output into `sink`
    async fn connect(&self, sink: &dyn MediaElement) -> anyhow::Result<()>;

    async fn release(&self) -> anyhow::Result<()>;

    /// Address clients use to reach this element, for transport endpoints
    fn url(&self) -> Option<String> {
        None
    }

    /// Start playing or recording, for locator-bound endpoints
    async fn start_media(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_media_session_started(&self) -> oneshot::Receiver<()> {
        closed_receiver()
    }

    fn on_media_session_terminated(&self) -> oneshot::Receiver<()> {
        closed_receiver()
    }

    fn on_end_of_stream(&self) -> oneshot::Receiver<()> {
        closed_receiver()
    }
}

/// Content stored in a repository, reachable through its own HTTP endpoint
#[async_trait]
pub trait RepositoryItem: Send + Sync {
    fn id(&self) -> &str;

    async fn create_http_endpoint(&self, kind: UriEndpointKind) -> anyhow::Result<Arc<dyn MediaElement>>;
}

/// Role of a locator-bound endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UriEndpointKind {
    /// Reads content from the locator
    Player,
    /// Writes content to the locator
    Recorder,
}

/// Direction of the transport-facing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Media flows to the client
    Get,
    /// Media flows from the client
    Post,
}

/// Builder options for the transport-facing endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpEndpointOptions {
    pub method: HttpMethod,
    pub terminate_on_eos: bool,
}

impl HttpEndpointOptions {
    pub fn get() -> Self {
        Self { method: HttpMethod::Get, terminate_on_eos: false }
    }

    pub fn post() -> Self {
        Self { method: HttpMethod::Post, terminate_on_eos: false }
    }

    pub fn with_terminate_on_eos(mut self, enabled: bool) -> Self {
        self.terminate_on_eos = enabled;
        self
    }
}

fn closed_receiver() -> oneshot::Receiver<()> {
    let (_tx, rx) = oneshot::channel();
    rx
}
