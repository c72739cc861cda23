//! Content session state and activation

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::events::MediaEventSubscriptions;
use crate::api::handler::ContentHandler;
use crate::api::types::{ActivationResponse, SessionId, SessionKind, SessionState, TerminationCause};
use crate::config::SessionConfig;
use crate::errors::{codes, ContentError, Result};
use crate::manager::SessionTable;
use crate::media::provisioning::{provisioner_for, Provisioner};
use crate::media::{
    ContentSource, MediaElement, PipelineFactory, ProvisionedMedia, ReleaseRegistry, RepositoryItem,
};
use crate::transport::TransportContext;

/// Collaborators a session is built from
pub(crate) struct SessionSetup {
    pub kind: SessionKind,
    pub content_id: Option<String>,
    pub config: SessionConfig,
    pub handler: Arc<dyn ContentHandler>,
    pub transport: Arc<dyn TransportContext>,
    pub factory: Arc<dyn PipelineFactory>,
    pub table: Weak<SessionTable>,
}

/// One client content request, from activation to termination.
///
/// Player and recorder sessions share this state machine; only the
/// provisioning strategy differs. All termination triggers (user, remote
/// media server, transport cancellation, errors) race onto a single
/// compare-and-set, and only the winner runs the termination funnel.
pub struct ContentSession {
    pub(super) id: SessionId,
    pub(super) kind: SessionKind,
    pub(super) content_id: Option<String>,
    pub(super) config: SessionConfig,
    pub(super) state: AtomicU8,
    activation_claimed: AtomicBool,
    pub(super) handler: Arc<dyn ContentHandler>,
    pub(super) transport: Arc<dyn TransportContext>,
    factory: Arc<dyn PipelineFactory>,
    provisioner: Box<dyn Provisioner>,
    pub(super) releaser: ReleaseRegistry,
    pub(super) table: Weak<SessionTable>,
    pub(super) media: Mutex<Option<ProvisionedMedia>>,
    pub(super) cause: Mutex<Option<TerminationCause>>,
    pub(super) shutdown: CancellationToken,
    /// Serializes the activation response against completion; `true` once completed
    pub(super) transport_done: tokio::sync::Mutex<bool>,
    me: Weak<ContentSession>,
    created_at: Instant,
}

impl ContentSession {
    pub(crate) fn new(setup: SessionSetup) -> Arc<Self> {
        let id = SessionId::new();
        let provisioner = provisioner_for(setup.kind, &setup.config);

        Arc::new_cyclic(|me| Self {
            releaser: ReleaseRegistry::new(id.as_str()),
            id,
            kind: setup.kind,
            content_id: setup.content_id,
            config: setup.config,
            state: AtomicU8::new(SessionState::Created as u8),
            activation_claimed: AtomicBool::new(false),
            handler: setup.handler,
            transport: setup.transport,
            factory: setup.factory,
            provisioner,
            table: setup.table,
            media: Mutex::new(None),
            cause: Mutex::new(None),
            shutdown: CancellationToken::new(),
            transport_done: tokio::sync::Mutex::new(false),
            me: me.clone(),
            created_at: Instant::now(),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Content identifier taken from the request path, if any
    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// URL of the transport-facing endpoint while media is provisioned
    pub fn media_url(&self) -> Option<String> {
        self.media.lock().as_ref().map(|media| media.url.clone())
    }

    /// The cause that won the termination race, once there is one
    pub fn termination_cause(&self) -> Option<TerminationCause> {
        self.cause.lock().clone()
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Number of media resources the session still has to release
    pub async fn pending_releases(&self) -> usize {
        self.releaser.len().await
    }

    /// Deliver content from a URL or path.
    ///
    /// A missing or blank locator fails with a validation error before any
    /// resource is acquired. Provisioning failures terminate the session and
    /// are also returned here.
    pub async fn start_locator(&self, locator: Option<&str>) -> Result<()> {
        let locator = locator.filter(|l| !l.trim().is_empty()).ok_or_else(|| {
            ContentError::validation(codes::NULL_CONTENT_LOCATOR, "Illegal null content locator provided")
        })?;
        self.activate(ContentSource::Locator(locator.to_string())).await
    }

    /// Connect to an element the caller already built
    pub async fn start_element(&self, element: Option<Arc<dyn MediaElement>>) -> Result<()> {
        let element = element.ok_or_else(|| {
            ContentError::validation(codes::NULL_SOURCE_ELEMENT, "Illegal null source element provided")
        })?;
        self.activate(ContentSource::Element(element)).await
    }

    /// Deliver or record repository-backed content
    pub async fn start_repository_item(&self, item: Option<Arc<dyn RepositoryItem>>) -> Result<()> {
        let item = item.ok_or_else(|| {
            ContentError::validation(codes::NULL_CONTENT_LOCATOR, "Illegal null repository item provided")
        })?;
        self.activate(ContentSource::Repository(item)).await
    }

    async fn activate(&self, source: ContentSource) -> Result<()> {
        if self.state() != SessionState::Created || self.activation_claimed.swap(true, Ordering::SeqCst) {
            return Err(ContentError::invalid_state(format!(
                "Session {} cannot be started in state {:?}",
                self.id,
                self.state()
            )));
        }

        tracing::info!("Activating {} session {} with {:?}", self.kind, self.id, source);

        let media = match self
            .provisioner
            .provision(source, self.factory.as_ref(), &self.releaser)
            .await
        {
            Ok(media) => media,
            Err(err) => return Err(self.fail_activation(err).await),
        };

        // Subscribe before anything else can fail so a remote teardown is never missed
        let subscriptions = MediaEventSubscriptions::subscribe(self.kind, &media);
        let url = media.url.clone();
        {
            // The funnel wins the CAS before it takes the media, so checking
            // under the same lock never leaves media behind a terminated session
            let mut slot = self.media.lock();
            if self.state().is_terminal() {
                return Err(terminated_during_activation(&self.id));
            }
            *slot = Some(media);
        }
        self.spawn_event_watcher(subscriptions);

        {
            let done = self.transport_done.lock().await;
            if *done || self.state().is_terminal() {
                return Err(terminated_during_activation(&self.id));
            }

            let response = self.activation_response(&url);
            if let Err(e) = self.transport.respond(response).await {
                drop(done);
                let err = ContentError::transport(
                    codes::TRANSPORT_RESPONSE_FAILED,
                    format!("Failed to answer content request: {}", e),
                );
                return Err(self.fail_activation(err).await);
            }
        }

        if self
            .state
            .compare_exchange(
                SessionState::Created as u8,
                SessionState::Active as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(terminated_during_activation(&self.id));
        }

        tracing::info!("Session {} is active at {}", self.id, url);

        if self.state().is_terminal() {
            tracing::debug!("Session {} ended before on_content_started", self.id);
            return Ok(());
        }

        if let Err(e) = self.handler.on_content_started(self).await {
            return Err(self.fail_activation(ContentError::from_unexpected(e)).await);
        }

        Ok(())
    }

    fn activation_response(&self, url: &str) -> ActivationResponse {
        let url = url.to_string();
        if self.config.use_control_protocol {
            ActivationResponse::Control { session_id: self.id.clone(), url }
        } else if self.config.redirect {
            ActivationResponse::Redirect { url }
        } else {
            ActivationResponse::Tunnel { url }
        }
    }

    /// Funnel an activation failure into termination and hand it back to the caller
    async fn fail_activation(&self, err: ContentError) -> ContentError {
        tracing::warn!("Activation of session {} failed: {}", self.id, err);
        self.terminate_with(TerminationCause::Error(err.clone())).await;
        err
    }

    fn spawn_event_watcher(&self, subscriptions: MediaEventSubscriptions) {
        let session = self.me.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(super::events::watch_media_events(session, subscriptions, shutdown));
    }
}

fn terminated_during_activation(id: &SessionId) -> ContentError {
    tracing::warn!("Session {} was terminated while it was being activated", id);
    ContentError::transport(
        codes::TERMINATED_DURING_ACTIVATION,
        "Session terminated while it was being activated",
    )
}

impl std::fmt::Debug for ContentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSession")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("content_id", &self.content_id)
            .field("state", &self.state())
            .finish()
    }
}
