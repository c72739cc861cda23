//! Media server event handling for active sessions
//!
//! Each endpoint event is a one-shot channel subscribed during activation.
//! A background task turns them into session actions until the session
//! starts terminating.

use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::ContentSession;
use crate::api::types::{SessionKind, TerminationCause};
use crate::errors::{codes, ContentError};
use crate::media::{MediaElement, ProvisionedMedia};

pub(crate) struct MediaEventSubscriptions {
    started: oneshot::Receiver<()>,
    terminated: oneshot::Receiver<()>,
    end_of_stream: oneshot::Receiver<()>,
    content_endpoint: Option<Arc<dyn MediaElement>>,
}

impl MediaEventSubscriptions {
    pub(crate) fn subscribe(kind: SessionKind, media: &ProvisionedMedia) -> Self {
        let transport = &media.transport_endpoint;
        let end_of_stream = match (&media.content_endpoint, kind) {
            (Some(source), SessionKind::Player) => source.on_end_of_stream(),
            _ => {
                let (_tx, rx) = oneshot::channel();
                rx
            }
        };

        Self {
            started: transport.on_media_session_started(),
            terminated: transport.on_media_session_terminated(),
            end_of_stream,
            content_endpoint: media.content_endpoint.clone(),
        }
    }
}

pub(crate) async fn watch_media_events(
    session: Weak<ContentSession>,
    subscriptions: MediaEventSubscriptions,
    shutdown: CancellationToken,
) {
    let MediaEventSubscriptions {
        mut started,
        mut terminated,
        mut end_of_stream,
        content_endpoint,
    } = subscriptions;

    // A closed channel means the endpoint will never emit that event
    let mut started_open = true;
    let mut terminated_open = true;
    let mut eos_open = true;

    while started_open || terminated_open || eos_open {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            result = &mut started, if started_open => {
                started_open = false;
                if result.is_ok() {
                    // Starting media is a remote call; keep watching for teardown meanwhile
                    let Some(session) = session.upgrade() else { break };
                    tokio::spawn(start_media(session, content_endpoint.clone(), shutdown.clone()));
                }
            }

            result = &mut terminated, if terminated_open => {
                terminated_open = false;
                if result.is_ok() {
                    if let Some(session) = session.upgrade() {
                        tracing::info!("Media server terminated the media session of {}", session.id);
                        session.terminate_with(TerminationCause::RemoteSignaled).await;
                    }
                    break;
                }
            }

            result = &mut end_of_stream, if eos_open => {
                eos_open = false;
                if result.is_ok() {
                    let Some(session) = session.upgrade() else { break };
                    session.on_end_of_stream().await;
                }
            }
        }
    }
}

/// The client connected to the transport endpoint: start playing or recording
async fn start_media(
    session: Arc<ContentSession>,
    content_endpoint: Option<Arc<dyn MediaElement>>,
    shutdown: CancellationToken,
) {
    let Some(endpoint) = content_endpoint else {
        tracing::debug!("Session {} media started, no locator endpoint to drive", session.id);
        return;
    };

    tracing::info!("Session {} media started, starting {}", session.id, endpoint.id());
    let result = tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::debug!("Session {} terminated while starting {}", session.id, endpoint.id());
            return;
        }
        result = endpoint.start_media() => result,
    };

    if let Err(e) = result {
        let err = ContentError::from_unexpected(e);
        tracing::warn!("Session {} could not start media on {}: {}", session.id, endpoint.id(), err);
        session.terminate_with(TerminationCause::Error(err)).await;
    }
}

impl ContentSession {

    async fn on_end_of_stream(&self) {
        if self.kind == SessionKind::Player && self.config.terminate_on_eos {
            tracing::info!("Session {} reached end of stream", self.id);
            self.terminate_with(TerminationCause::normal(codes::NORMAL_TERMINATION, "end of stream"))
                .await;
        } else {
            tracing::debug!("Session {} reached end of stream, keeping session open", self.id);
        }
    }
}
