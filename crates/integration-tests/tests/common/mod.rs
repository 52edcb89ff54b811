//! Hand-written fakes shared by the scenario tests.

#![allow(dead_code)]

use async_trait::async_trait;
use domains::{
    ApiRequest, ApiResponse, PushChannel, PushError, PushEvent, PushStream, Transport,
    TransportError,
};
use parking_lot::Mutex;
use serde_json::Value;
use services::{DisasterGateway, FallbackInterceptor, FallbackTable, MiddlewareChain};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

type Responder = dyn Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync;

/// Transport answering from a closure and recording every request.
pub struct ScriptedTransport {
    respond: Box<Responder>,
    seen: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(
        respond: impl Fn(&ApiRequest) -> Result<ApiResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails as if the server were unreachable.
    pub fn offline() -> Arc<Self> {
        Self::new(|_| Err(TransportError::Network("connection refused".into())))
    }

    /// Every GET answers with the given body.
    pub fn answering(body: Value) -> Arc<Self> {
        Self::new(move |_| Ok(ApiResponse::remote(200, body.clone())))
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.seen.lock().clone()
    }

    pub fn count(&self, path_prefix: &str) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|r| r.path.starts_with(path_prefix))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.seen.lock().push(request.clone());
        (self.respond)(request)
    }
}

/// Delays every answer of the wrapped transport.
pub struct SlowTransport {
    inner: Arc<dyn Transport>,
    delay: Duration,
}

impl SlowTransport {
    pub fn wrap(inner: Arc<dyn Transport>, delay: Duration) -> Arc<Self> {
        Arc::new(Self { inner, delay })
    }
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        tokio::time::sleep(self.delay).await;
        self.inner.send(request).await
    }
}

pub fn gateway_with(
    transport: Arc<dyn Transport>,
    table: FallbackTable,
) -> Arc<DisasterGateway> {
    let chain = MiddlewareChain::new()
        .with(FallbackInterceptor::new(table).with_latency(Duration::ZERO));
    Arc::new(DisasterGateway::new(
        transport,
        chain,
        Arc::new(auth_adapters::RoleLabelCredentials::default()),
    ))
}

/// Push channel whose sessions are queued up front by the test.
#[derive(Default)]
pub struct ScriptedPush {
    sessions: Mutex<VecDeque<mpsc::UnboundedReceiver<PushEvent>>>,
    connects: AtomicUsize,
}

impl ScriptedPush {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues one session. Events sent through the returned sender reach
    /// the subscriber; dropping it ends the session.
    pub fn open_session(&self) -> mpsc::UnboundedSender<PushEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().push_back(rx);
        tx
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushChannel for ScriptedPush {
    async fn connect(&self) -> Result<Box<dyn PushStream>, PushError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.sessions.lock().pop_front() {
            Some(events) => Ok(Box::new(ScriptedStream { events })),
            None => Err(PushError::Connect("connection refused".into())),
        }
    }
}

struct ScriptedStream {
    events: mpsc::UnboundedReceiver<PushEvent>,
}

#[async_trait]
impl PushStream for ScriptedStream {
    async fn next_event(&mut self) -> Option<Result<PushEvent, PushError>> {
        self.events.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.events.close();
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
