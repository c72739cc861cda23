// Shared test doubles for content session tests
//
// Every collaborator writes to one `CallLog`, so tests can assert the exact
// order in which media was released, callbacks fired and the transport was
// completed.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

use rcontent_session_core::{
    ActivationResponse, ContentCommand, ContentCommandResult, ContentError, ContentHandler,
    ContentServiceConfig, ContentSession, HttpEndpointOptions, HttpMethod, MediaElement,
    MediaPipeline, PipelineFactory, RepositoryItem, SessionKind, SessionManager, TransportContext,
    UriEndpointKind,
};

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    /// Entries starting with `prefix`, in order
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.0.lock().iter().filter(|e| e.starts_with(prefix)).cloned().collect()
    }
}

/// How a mocked engine call fails
#[derive(Clone)]
pub enum Failure {
    Declared(ContentError),
    Unexpected(String),
}

impl Failure {
    fn into_error(self) -> anyhow::Error {
        match self {
            Failure::Declared(err) => err.into(),
            Failure::Unexpected(message) => anyhow::anyhow!(message),
        }
    }
}

#[derive(Clone, Default)]
pub struct EngineBehavior {
    pub create: Option<Failure>,
    pub uri_endpoint: Option<Failure>,
    pub http_endpoint: Option<Failure>,
    pub connect: Option<Failure>,
    pub start_media: Option<Failure>,
    /// Ids whose release call fails
    pub failing_releases: Vec<String>,
    /// Pipeline creation waits for this notification
    pub create_gate: Option<Arc<Notify>>,
    /// Every `connect` waits for this notification
    pub connect_gate: Option<Arc<Notify>>,
    /// `start_media` waits for this notification
    pub start_media_gate: Option<Arc<Notify>>,
}

struct EngineState {
    log: CallLog,
    behavior: Mutex<EngineBehavior>,
    counters: Mutex<HashMap<&'static str, usize>>,
    elements: Mutex<HashMap<String, Arc<MockElement>>>,
    create_calls: AtomicUsize,
    connect_calls: AtomicUsize,
    start_media_calls: AtomicUsize,
}

impl EngineState {
    fn next_id(&self, prefix: &'static str) -> String {
        let mut counters = self.counters.lock();
        let n = counters.entry(prefix).or_insert(0);
        *n += 1;
        format!("{}{}", prefix, n)
    }

    fn behavior(&self) -> EngineBehavior {
        self.behavior.lock().clone()
    }

    fn new_element(
        self: &Arc<Self>,
        id: String,
        pipeline: Option<Arc<dyn MediaPipeline>>,
        url: Option<String>,
    ) -> Arc<MockElement> {
        let element = Arc::new(MockElement {
            id: id.clone(),
            pipeline,
            url,
            engine: self.clone(),
            started_tx: Mutex::new(None),
            terminated_tx: Mutex::new(None),
            eos_tx: Mutex::new(None),
        });
        self.elements.lock().insert(id, element.clone());
        element
    }

    async fn release(&self, id: &str) -> anyhow::Result<()> {
        self.log.push(format!("release:{}", id));
        if self.behavior().failing_releases.iter().any(|f| f == id) {
            anyhow::bail!("{} could not be released", id);
        }
        Ok(())
    }
}

/// Media engine double acting as the pipeline factory
#[derive(Clone)]
pub struct MockEngine(Arc<EngineState>);

impl MockEngine {
    pub fn new(log: CallLog) -> Self {
        Self(Arc::new(EngineState {
            log,
            behavior: Mutex::new(EngineBehavior::default()),
            counters: Mutex::new(HashMap::new()),
            elements: Mutex::new(HashMap::new()),
            create_calls: AtomicUsize::new(0),
            connect_calls: AtomicUsize::new(0),
            start_media_calls: AtomicUsize::new(0),
        }))
    }

    pub fn with_behavior(self, behavior: EngineBehavior) -> Self {
        *self.0.behavior.lock() = behavior;
        self
    }

    pub fn element(&self, id: &str) -> Arc<MockElement> {
        self.0
            .elements
            .lock()
            .get(id)
            .cloned()
            .unwrap_or_else(|| panic!("no element {}", id))
    }

    pub fn create_calls(&self) -> usize {
        self.0.create_calls.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.0.connect_calls.load(Ordering::SeqCst)
    }

    pub fn start_media_calls(&self) -> usize {
        self.0.start_media_calls.load(Ordering::SeqCst)
    }

    /// An element built by the application on its own pipeline
    pub fn external_element(&self) -> Arc<MockElement> {
        let pipeline: Arc<dyn MediaPipeline> = Arc::new(MockPipeline {
            id: self.0.next_id("X"),
            engine: self.0.clone(),
        });
        let id = self.0.next_id("E");
        self.0.new_element(id, Some(pipeline), None)
    }

    pub fn repository_item(&self, id: &str) -> Arc<MockRepositoryItem> {
        Arc::new(MockRepositoryItem {
            id: id.to_string(),
            engine: self.0.clone(),
        })
    }
}

#[async_trait]
impl PipelineFactory for MockEngine {
    async fn create(&self) -> anyhow::Result<Arc<dyn MediaPipeline>> {
        self.0.create_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.0.behavior();
        if let Some(gate) = behavior.create_gate {
            gate.notified().await;
        }
        if let Some(failure) = behavior.create {
            return Err(failure.into_error());
        }

        let id = self.0.next_id("P");
        self.0.log.push(format!("create:{}", id));
        Ok(Arc::new(MockPipeline { id, engine: self.0.clone() }))
    }
}

pub struct MockPipeline {
    id: String,
    engine: Arc<EngineState>,
}

#[async_trait]
impl MediaPipeline for MockPipeline {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_uri_endpoint(
        &self,
        kind: UriEndpointKind,
        locator: &str,
    ) -> anyhow::Result<Arc<dyn MediaElement>> {
        if let Some(failure) = self.engine.behavior().uri_endpoint {
            return Err(failure.into_error());
        }

        let id = match kind {
            UriEndpointKind::Player => self.engine.next_id("S"),
            UriEndpointKind::Recorder => self.engine.next_id("K"),
        };
        self.engine.log.push(format!("uri:{}:{}", id, locator));
        let pipeline: Arc<dyn MediaPipeline> = Arc::new(MockPipeline {
            id: self.id.clone(),
            engine: self.engine.clone(),
        });
        Ok(self.engine.new_element(id, Some(pipeline), None))
    }

    async fn new_http_endpoint(
        &self,
        options: HttpEndpointOptions,
    ) -> anyhow::Result<Arc<dyn MediaElement>> {
        if let Some(failure) = self.engine.behavior().http_endpoint {
            return Err(failure.into_error());
        }

        let id = match options.method {
            HttpMethod::Get => self.engine.next_id("K"),
            HttpMethod::Post => self.engine.next_id("S"),
        };
        self.engine
            .log
            .push(format!("http:{}:eos={}", id, options.terminate_on_eos));
        let url = format!("http://media.test/{}", id);
        let pipeline: Arc<dyn MediaPipeline> = Arc::new(MockPipeline {
            id: self.id.clone(),
            engine: self.engine.clone(),
        });
        Ok(self.engine.new_element(id, Some(pipeline), Some(url)))
    }

    async fn release(&self) -> anyhow::Result<()> {
        self.engine.release(&self.id).await
    }
}

pub struct MockElement {
    id: String,
    pipeline: Option<Arc<dyn MediaPipeline>>,
    url: Option<String>,
    engine: Arc<EngineState>,
    started_tx: Mutex<Option<oneshot::Sender<()>>>,
    terminated_tx: Mutex<Option<oneshot::Sender<()>>>,
    eos_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl MockElement {
    /// The media server reports the client connected
    pub fn fire_media_session_started(&self) -> bool {
        fire(&self.started_tx)
    }

    /// The media server tore the media session down
    pub fn fire_media_session_terminated(&self) -> bool {
        fire(&self.terminated_tx)
    }

    pub fn fire_end_of_stream(&self) -> bool {
        fire(&self.eos_tx)
    }
}

fn fire(slot: &Mutex<Option<oneshot::Sender<()>>>) -> bool {
    match slot.lock().take() {
        Some(tx) => tx.send(()).is_ok(),
        None => false,
    }
}

fn subscribe(slot: &Mutex<Option<oneshot::Sender<()>>>) -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    *slot.lock() = Some(tx);
    rx
}

#[async_trait]
impl MediaElement for MockElement {
    fn id(&self) -> &str {
        &self.id
    }

    fn pipeline(&self) -> Option<Arc<dyn MediaPipeline>> {
        self.pipeline.clone()
    }

    async fn connect(&self, sink: &dyn MediaElement) -> anyhow::Result<()> {
        self.engine.connect_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.engine.behavior();
        if let Some(gate) = behavior.connect_gate {
            gate.notified().await;
        }
        if let Some(failure) = behavior.connect {
            return Err(failure.into_error());
        }
        self.engine.log.push(format!("connect:{}->{}", self.id, sink.id()));
        Ok(())
    }

    async fn release(&self) -> anyhow::Result<()> {
        self.engine.release(&self.id).await
    }

    fn url(&self) -> Option<String> {
        self.url.clone()
    }

    async fn start_media(&self) -> anyhow::Result<()> {
        self.engine.start_media_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.engine.behavior();
        if let Some(gate) = behavior.start_media_gate {
            gate.notified().await;
        }
        if let Some(failure) = behavior.start_media {
            return Err(failure.into_error());
        }
        self.engine.log.push(format!("start_media:{}", self.id));
        Ok(())
    }

    fn on_media_session_started(&self) -> oneshot::Receiver<()> {
        subscribe(&self.started_tx)
    }

    fn on_media_session_terminated(&self) -> oneshot::Receiver<()> {
        subscribe(&self.terminated_tx)
    }

    fn on_end_of_stream(&self) -> oneshot::Receiver<()> {
        subscribe(&self.eos_tx)
    }
}

pub struct MockRepositoryItem {
    id: String,
    engine: Arc<EngineState>,
}

#[async_trait]
impl RepositoryItem for MockRepositoryItem {
    fn id(&self) -> &str {
        &self.id
    }

    async fn create_http_endpoint(&self, kind: UriEndpointKind) -> anyhow::Result<Arc<dyn MediaElement>> {
        let id = self.engine.next_id("R");
        self.engine.log.push(format!("repository:{}:{}:{:?}", id, self.id, kind));
        let url = format!("http://repository.test/{}", self.id);
        Ok(self.engine.new_element(id, None, Some(url)))
    }
}

/// Inbound request double
pub struct MockTransport {
    log: CallLog,
    fail_respond: bool,
    respond_gate: Option<Arc<Notify>>,
    respond_calls: AtomicUsize,
    completions: AtomicUsize,
    responses: Mutex<Vec<ActivationResponse>>,
}

impl MockTransport {
    pub fn new(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            fail_respond: false,
            respond_gate: None,
            respond_calls: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
            responses: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(log: CallLog) -> Arc<Self> {
        Arc::new(Self {
            log,
            fail_respond: true,
            respond_gate: None,
            respond_calls: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
            responses: Mutex::new(Vec::new()),
        })
    }

    /// `respond` waits for `gate` before answering
    pub fn gated(log: CallLog, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            log,
            fail_respond: false,
            respond_gate: Some(gate),
            respond_calls: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
            responses: Mutex::new(Vec::new()),
        })
    }

    pub fn respond_calls(&self) -> usize {
        self.respond_calls.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn responses(&self) -> Vec<ActivationResponse> {
        self.responses.lock().clone()
    }
}

#[async_trait]
impl TransportContext for MockTransport {
    async fn respond(&self, response: ActivationResponse) -> anyhow::Result<()> {
        self.respond_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.respond_gate {
            gate.notified().await;
        }
        if self.completions() > 0 {
            self.log.push("respond-after-complete");
        }
        if self.fail_respond {
            anyhow::bail!("client went away");
        }
        self.log.push(format!("respond:{}", response.url()));
        self.responses.lock().push(response);
        Ok(())
    }

    async fn complete(&self) -> anyhow::Result<()> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.log.push("complete");
        Ok(())
    }
}

/// What the handler does when a request arrives
#[derive(Clone, Default)]
pub enum RequestAction {
    #[default]
    Nothing,
    StartLocator(String),
    Fail(String),
}

#[derive(Default)]
pub struct HandlerBehavior {
    pub on_request: RequestAction,
    pub fail_started: bool,
    pub fail_terminal_callbacks: bool,
}

/// User handler double recording every callback
pub struct RecordingHandler {
    log: CallLog,
    behavior: HandlerBehavior,
    terminal: AtomicUsize,
}

impl RecordingHandler {
    pub fn new(log: CallLog) -> Arc<Self> {
        Self::with_behavior(log, HandlerBehavior::default())
    }

    pub fn with_behavior(log: CallLog, behavior: HandlerBehavior) -> Arc<Self> {
        Arc::new(Self {
            log,
            behavior,
            terminal: AtomicUsize::new(0),
        })
    }

    /// on_session_terminated + on_session_error + on_uncaught_exception
    pub fn callback_count(&self) -> usize {
        self.terminal.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) -> anyhow::Result<()> {
        self.terminal.fetch_add(1, Ordering::SeqCst);
        self.log.push(entry);
        if self.behavior.fail_terminal_callbacks {
            anyhow::bail!("handler blew up");
        }
        Ok(())
    }
}

#[async_trait]
impl ContentHandler for RecordingHandler {
    async fn on_content_request(&self, session: &ContentSession) -> anyhow::Result<()> {
        self.log.push(format!("on_content_request:{}", session.kind()));
        match &self.behavior.on_request {
            RequestAction::Nothing => Ok(()),
            RequestAction::StartLocator(locator) => {
                session.start_locator(Some(locator.as_str())).await?;
                Ok(())
            }
            RequestAction::Fail(message) => anyhow::bail!("{}", message),
        }
    }

    async fn on_content_started(&self, _session: &ContentSession) -> anyhow::Result<()> {
        self.log.push("on_content_started");
        if self.behavior.fail_started {
            anyhow::bail!("started callback failed");
        }
        Ok(())
    }

    async fn on_content_command(
        &self,
        _session: &ContentSession,
        command: ContentCommand,
    ) -> anyhow::Result<ContentCommandResult> {
        self.log.push(format!("on_content_command:{}", command.command_type));
        match command.command_type.as_str() {
            "explode" => anyhow::bail!("command exploded"),
            "reject" => Err(ContentError::command(40001, "command rejected").into()),
            _ => Ok(ContentCommandResult::new(format!("ok:{}", command.data))),
        }
    }

    async fn on_session_terminated(
        &self,
        _session: &ContentSession,
        code: i32,
        description: &str,
    ) -> anyhow::Result<()> {
        self.record(format!("on_session_terminated:{}:{}", code, description))
    }

    async fn on_session_error(
        &self,
        _session: &ContentSession,
        code: i32,
        description: &str,
    ) -> anyhow::Result<()> {
        self.record(format!("on_session_error:{}:{}", code, description))
    }

    async fn on_uncaught_exception(
        &self,
        session: &ContentSession,
        error: &ContentError,
    ) -> anyhow::Result<()> {
        // Command failures are reported here without ending the session
        if session.state().is_terminal() {
            self.record(format!("on_uncaught_exception:{}", error.code()))
        } else {
            self.log.push(format!("on_uncaught_exception:{}", error.code()));
            Ok(())
        }
    }
}

/// Everything a test needs around one manager
pub struct Harness {
    pub log: CallLog,
    pub engine: MockEngine,
    pub handler: Arc<RecordingHandler>,
    pub manager: SessionManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(EngineBehavior::default(), HandlerBehavior::default(), ContentServiceConfig::default())
    }

    pub fn build(
        engine: EngineBehavior,
        handler: HandlerBehavior,
        config: ContentServiceConfig,
    ) -> Self {
        let log = CallLog::new();
        let engine = MockEngine::new(log.clone()).with_behavior(engine);
        let handler = RecordingHandler::with_behavior(log.clone(), handler);
        let manager = SessionManager::new(Arc::new(engine.clone()), handler.clone(), config);
        Self { log, engine, handler, manager }
    }

    pub async fn session(&self, kind: SessionKind) -> (Arc<ContentSession>, Arc<MockTransport>) {
        let transport = MockTransport::new(self.log.clone());
        let session = self
            .manager
            .create_session(kind, transport.clone(), Some("clip".to_string()))
            .await
            .expect("session created");
        (session, transport)
    }
}

/// Poll until the manager no longer lists `session`
pub async fn wait_for_removal(manager: &SessionManager, session: &ContentSession) -> bool {
    for _ in 0..100 {
        if !manager.table().contains(session.id()).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Poll until `condition` holds or a second passes
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
