//! Pipeline and endpoint provisioning
//!
//! Player sessions wire `source -> HTTP GET endpoint`, recorder sessions
//! wire `HTTP POST endpoint -> sink`. Every pipeline and endpoint is handed
//! to the [`ReleaseRegistry`] as soon as it exists, before the next step
//! that can fail.

use async_trait::async_trait;
use std::sync::Arc;

use super::{
    HttpEndpointOptions, MediaElement, MediaPipeline, PipelineFactory, ReleasableResource,
    ReleaseRegistry, RepositoryItem, UriEndpointKind,
};
use crate::api::types::SessionKind;
use crate::config::SessionConfig;
use crate::errors::{codes, ContentError, Result};

/// What a session was asked to deliver or record
#[derive(Clone)]
pub enum ContentSource {
    /// URL or path resolved by the media server
    Locator(String),
    /// An element the caller already built; its pipeline is not ours
    Element(Arc<dyn MediaElement>),
    /// Repository-backed content
    Repository(Arc<dyn RepositoryItem>),
}

impl std::fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locator(locator) => write!(f, "Locator({})", locator),
            Self::Element(element) => write!(f, "Element({})", element.id()),
            Self::Repository(item) => write!(f, "Repository({})", item.id()),
        }
    }
}

/// Media wired up for a session
#[derive(Clone)]
pub struct ProvisionedMedia {
    /// Pipeline created for this session, `None` when borrowed from the caller
    pub pipeline: Option<Arc<dyn MediaPipeline>>,
    /// Endpoint facing the HTTP client
    pub transport_endpoint: Arc<dyn MediaElement>,
    /// Locator-bound player or recorder endpoint, when one was built
    pub content_endpoint: Option<Arc<dyn MediaElement>>,
    /// Where the client reaches the transport endpoint
    pub url: String,
}

/// Session-kind specific wiring strategy
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(
        &self,
        source: ContentSource,
        factory: &dyn PipelineFactory,
        registry: &ReleaseRegistry,
    ) -> Result<ProvisionedMedia>;
}

/// Pick the strategy for a session kind
pub fn provisioner_for(kind: SessionKind, config: &SessionConfig) -> Box<dyn Provisioner> {
    match kind {
        SessionKind::Player => Box::new(PlayerProvisioning {
            terminate_on_eos: config.terminate_on_eos,
        }),
        SessionKind::Recorder => Box::new(RecorderProvisioning),
    }
}

/// `source -> HTTP GET endpoint`
#[derive(Debug, Clone, Copy)]
pub struct PlayerProvisioning {
    pub terminate_on_eos: bool,
}

#[async_trait]
impl Provisioner for PlayerProvisioning {
    async fn provision(
        &self,
        source: ContentSource,
        factory: &dyn PipelineFactory,
        registry: &ReleaseRegistry,
    ) -> Result<ProvisionedMedia> {
        let options = HttpEndpointOptions::get().with_terminate_on_eos(self.terminate_on_eos);

        match source {
            ContentSource::Locator(locator) => {
                let pipeline = create_pipeline(factory, registry).await?;

                tracing::info!("Creating PlayerEndpoint for {} ...", locator);
                let player = engine(pipeline.new_uri_endpoint(UriEndpointKind::Player, &locator).await)?;
                track(registry, ReleasableResource::Element(player.clone())).await?;

                tracing::info!("Creating HttpEndpoint ...");
                let http = engine(pipeline.new_http_endpoint(options).await)?;
                track(registry, ReleasableResource::Element(http.clone())).await?;

                engine(player.connect(http.as_ref()).await)?;
                finish(Some(pipeline), http, Some(player))
            }
            ContentSource::Element(element) => {
                let pipeline = borrowed_pipeline(element.as_ref())?;

                tracing::info!("Creating HttpEndpoint on pipeline {} ...", pipeline.id());
                let http = engine(pipeline.new_http_endpoint(options).await)?;
                track(registry, ReleasableResource::Element(http.clone())).await?;

                engine(element.connect(http.as_ref()).await)?;
                finish(None, http, None)
            }
            ContentSource::Repository(item) => {
                tracing::info!("Creating repository HttpEndpoint for item {} ...", item.id());
                let http = engine(item.create_http_endpoint(UriEndpointKind::Player).await)?;
                track(registry, ReleasableResource::Element(http.clone())).await?;
                finish(None, http, None)
            }
        }
    }
}

/// `HTTP POST endpoint -> sink`
#[derive(Debug, Clone, Copy)]
pub struct RecorderProvisioning;

#[async_trait]
impl Provisioner for RecorderProvisioning {
    async fn provision(
        &self,
        source: ContentSource,
        factory: &dyn PipelineFactory,
        registry: &ReleaseRegistry,
    ) -> Result<ProvisionedMedia> {
        match source {
            ContentSource::Locator(locator) => {
                let pipeline = create_pipeline(factory, registry).await?;

                tracing::info!("Creating RecorderEndpoint for {} ...", locator);
                let recorder = engine(pipeline.new_uri_endpoint(UriEndpointKind::Recorder, &locator).await)?;
                track(registry, ReleasableResource::Element(recorder.clone())).await?;

                tracing::info!("Creating HttpEndpoint ...");
                let http = engine(pipeline.new_http_endpoint(HttpEndpointOptions::post()).await)?;
                track(registry, ReleasableResource::Element(http.clone())).await?;

                engine(http.connect(recorder.as_ref()).await)?;
                finish(Some(pipeline), http, Some(recorder))
            }
            ContentSource::Element(element) => {
                let pipeline = borrowed_pipeline(element.as_ref())?;

                tracing::info!("Creating HttpEndpoint on pipeline {} ...", pipeline.id());
                let http = engine(pipeline.new_http_endpoint(HttpEndpointOptions::post()).await)?;
                track(registry, ReleasableResource::Element(http.clone())).await?;

                engine(http.connect(element.as_ref()).await)?;
                finish(None, http, None)
            }
            ContentSource::Repository(item) => {
                tracing::info!("Creating repository HttpEndpoint for item {} ...", item.id());
                let http = engine(item.create_http_endpoint(UriEndpointKind::Recorder).await)?;
                track(registry, ReleasableResource::Element(http.clone())).await?;
                finish(None, http, None)
            }
        }
    }
}

async fn create_pipeline(
    factory: &dyn PipelineFactory,
    registry: &ReleaseRegistry,
) -> Result<Arc<dyn MediaPipeline>> {
    tracing::info!("Creating media pipeline ...");
    let pipeline = engine(factory.create().await)?;
    track(registry, ReleasableResource::Pipeline(pipeline.clone())).await?;
    Ok(pipeline)
}

fn borrowed_pipeline(element: &dyn MediaElement) -> Result<Arc<dyn MediaPipeline>> {
    tracing::info!("Recovering media pipeline from element {}", element.id());
    element.pipeline().ok_or_else(|| {
        ContentError::provisioning(
            codes::PROVISIONING_FAILED,
            format!("Element {} does not belong to a media pipeline", element.id()),
        )
    })
}

/// Register a freshly built resource; stop provisioning if the session is
/// already tearing down.
async fn track(registry: &ReleaseRegistry, resource: ReleasableResource) -> Result<()> {
    if registry.register(resource).await {
        Ok(())
    } else {
        Err(ContentError::transport(
            codes::TERMINATED_DURING_ACTIVATION,
            "Session terminated while media was being provisioned",
        ))
    }
}

fn engine<T>(result: anyhow::Result<T>) -> Result<T> {
    result.map_err(ContentError::from_unexpected)
}

fn finish(
    pipeline: Option<Arc<dyn MediaPipeline>>,
    transport_endpoint: Arc<dyn MediaElement>,
    content_endpoint: Option<Arc<dyn MediaElement>>,
) -> Result<ProvisionedMedia> {
    let url = transport_endpoint.url().ok_or_else(|| {
        ContentError::provisioning(
            codes::PROVISIONING_FAILED,
            format!("Endpoint {} did not publish a URL", transport_endpoint.id()),
        )
    })?;

    Ok(ProvisionedMedia {
        pipeline,
        transport_endpoint,
        content_endpoint,
        url,
    })
}
