//! Live-update subscriber.
//!
//! Owns one push-channel connection, exposes `{connected, last_error}` and
//! forwards named events to registered handlers. Events only signal that
//! something changed; the data is always re-fetched through the gateway.

use domains::{PushChannel, PushEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const RECONNECT_EXHAUSTED: &str = "Failed to reconnect after multiple attempts";

/// Connection timing. Retries use a fixed backoff and a hard cap so an
/// unavailable server never causes a retry storm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay between `start` and the first connect
    pub connect_delay: Duration,
    /// Reconnect attempts after a failure before giving up
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(100),
            max_attempts: 3,
            backoff: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub last_error: Option<String>,
    /// Retries are exhausted; nothing will reconnect this subscriber
    pub gave_up: bool,
}

pub type EventHandler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    handler: EventHandler,
}

struct LiveInner {
    channel: Arc<dyn PushChannel>,
    policy: ReconnectPolicy,
    status: watch::Sender<ConnectionStatus>,
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
    started: AtomicBool,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Closes the subscriber when the last handle is dropped. The background
/// task only holds `LiveInner`, so it never keeps this alive.
struct HandleGuard(Arc<LiveInner>);

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Handle to a push subscription. Cheap to clone; all clones share one
/// connection, which is closed once every clone is gone.
///
/// Handlers run on the subscriber task and should stay short. They may call
/// `on`, `off` or `close`; a handler removed while an event is being
/// dispatched can still see that one event.
#[derive(Clone)]
pub struct LiveUpdates {
    inner: Arc<LiveInner>,
    _guard: Arc<HandleGuard>,
}

impl LiveUpdates {
    /// Creates a disconnected subscriber. Nothing happens until [`start`](Self::start).
    pub fn new(channel: Arc<dyn PushChannel>, policy: ReconnectPolicy) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::default());
        let (shutdown, _) = watch::channel(false);
        let inner = Arc::new(LiveInner {
            channel,
            policy,
            status,
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            shutdown,
            task: Mutex::new(None),
        });
        Self {
            _guard: Arc::new(HandleGuard(inner.clone())),
            inner,
        }
    }

    /// Schedules the deferred connect. Idempotent; a no-op once closed.
    pub fn start(&self) {
        if self.inner.closed.load(Ordering::SeqCst)
            || self.inner.started.swap(true, Ordering::SeqCst)
        {
            return;
        }
        let inner = self.inner.clone();
        let shutdown = self.inner.shutdown.subscribe();
        let handle = tokio::spawn(run(inner, shutdown));
        *self.inner.task.lock() = Some(handle);
    }

    pub fn on(
        &self,
        event: impl Into<String>,
        handler: impl Fn(&PushEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        if self.inner.closed.load(Ordering::SeqCst) {
            return id;
        }
        self.inner
            .handlers
            .write()
            .entry(event.into())
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Deregisters one handler. Returns whether it was still registered.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.write();
        let mut removed = false;
        for registrations in handlers.values_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        handlers.retain(|_, registrations| !registrations.is_empty());
        removed
    }

    pub fn handler_count(&self) -> usize {
        self.inner.handlers.read().values().map(Vec::len).sum()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Drops every handler and shuts the connection down for good.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl LiveInner {
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.handlers.write().clear();
        self.shutdown.send_replace(true);
        // the task notices the shutdown signal and closes its stream itself
        drop(self.task.lock().take());
        self.status.send_modify(|s| s.connected = false);
        debug!("live updates closed");
    }

    fn dispatch(&self, event: &PushEvent) {
        // snapshot so handlers can touch the registry without deadlocking
        let handlers: Vec<EventHandler> = match self.handlers.read().get(&event.name) {
            Some(registrations) => registrations.iter().map(|r| r.handler.clone()).collect(),
            None => {
                debug!(event = %event.name, "no handler registered");
                return;
            }
        };
        for handler in handlers {
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            handler(event);
        }
    }

    fn set_status(&self, connected: bool, last_error: Option<String>, gave_up: bool) {
        self.status.send_replace(ConnectionStatus {
            connected,
            last_error,
            gave_up,
        });
    }
}

enum SessionEnd {
    Disconnected,
    Shutdown,
}

async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => true,
    }
}

async fn run(inner: Arc<LiveInner>, mut shutdown: watch::Receiver<bool>) {
    if sleep_or_shutdown(inner.policy.connect_delay, &mut shutdown).await {
        return;
    }

    let mut first_attempt = true;
    let mut retries = 0u32;
    loop {
        if !first_attempt {
            if retries >= inner.policy.max_attempts {
                warn!(attempts = retries, "push channel reconnection failed after all attempts");
                let last = inner.status.borrow().last_error.clone();
                debug!(last_error = ?last, "giving up on push channel");
                inner.set_status(false, Some(RECONNECT_EXHAUSTED.to_owned()), true);
                return;
            }
            retries += 1;
            if sleep_or_shutdown(inner.policy.backoff, &mut shutdown).await {
                return;
            }
            debug!(attempt = retries, "reconnecting to push channel");
        }
        first_attempt = false;

        let attempt = tokio::select! {
            result = inner.channel.connect() => result,
            _ = shutdown.changed() => return,
        };

        match attempt {
            Ok(mut stream) => {
                if retries > 0 {
                    info!(attempts = retries, "push channel reconnected");
                } else {
                    info!("connected to push channel");
                }
                retries = 0;
                inner.set_status(true, None, false);

                let end = loop {
                    tokio::select! {
                        next = stream.next_event() => match next {
                            Some(Ok(event)) => inner.dispatch(&event),
                            Some(Err(error)) => warn!(%error, "malformed push frame skipped"),
                            None => break SessionEnd::Disconnected,
                        },
                        _ = shutdown.changed() => break SessionEnd::Shutdown,
                    }
                };
                stream.close().await;
                match end {
                    SessionEnd::Shutdown => return,
                    SessionEnd::Disconnected => {
                        info!("disconnected from push channel");
                        inner.set_status(false, None, false);
                    }
                }
            }
            Err(error) => {
                warn!(%error, "push channel connection failed");
                inner.set_status(false, Some(error.to_string()), false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{MockPushChannel, PushError};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn refusing_channel(connects: Arc<AtomicUsize>) -> Arc<dyn PushChannel> {
        let mut channel = MockPushChannel::new();
        channel.expect_connect().returning(move || {
            connects.fetch_add(1, Ordering::SeqCst);
            Err(PushError::Connect("connection refused".into()))
        });
        Arc::new(channel)
    }

    #[tokio::test(start_paused = true)]
    async fn starts_disconnected_and_defers_connect() {
        let connects = Arc::new(AtomicUsize::new(0));
        let live = LiveUpdates::new(refusing_channel(connects.clone()), ReconnectPolicy::default());
        assert_eq!(live.status(), ConnectionStatus::default());

        live.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(connects.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        live.close();
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_bounded_retries() {
        let connects = Arc::new(AtomicUsize::new(0));
        let live = LiveUpdates::new(refusing_channel(connects.clone()), ReconnectPolicy::default());
        live.start();

        tokio::time::sleep(Duration::from_secs(30)).await;
        // one initial attempt plus three retries
        assert_eq!(connects.load(Ordering::SeqCst), 4);
        let status = live.status();
        assert!(!status.connected);
        assert!(status.gave_up);
        assert_eq!(status.last_error.as_deref(), Some(RECONNECT_EXHAUSTED));
    }

    #[tokio::test]
    async fn off_and_close_remove_handlers() {
        let live = LiveUpdates::new(
            refusing_channel(Arc::new(AtomicUsize::new(0))),
            ReconnectPolicy::default(),
        );
        let a = live.on("disaster_updated", |_| {});
        let _b = live.on("disaster_updated", |_| {});
        assert_eq!(live.handler_count(), 2);
        assert!(live.off(a));
        assert!(!live.off(a));
        assert_eq!(live.handler_count(), 1);

        live.close();
        assert_eq!(live.handler_count(), 0);
        live.on("resources_updated", |_| {});
        assert_eq!(live.handler_count(), 0);
        // starting a closed subscriber is a no-op
        live.start();
        assert!(live.is_closed());
    }

    #[test]
    fn dispatch_routes_by_event_name() {
        let live = LiveUpdates::new(
            refusing_channel(Arc::new(AtomicUsize::new(0))),
            ReconnectPolicy::default(),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        live.on("social_media_updated", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        live.inner
            .dispatch(&PushEvent::new("social_media_updated", json!({ "disasterId": "1" })));
        live.inner
            .dispatch(&PushEvent::new("resources_updated", json!({ "disasterId": "1" })));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_may_deregister_during_dispatch() {
        let live = LiveUpdates::new(
            refusing_channel(Arc::new(AtomicUsize::new(0))),
            ReconnectPolicy::default(),
        );
        let own_id = Arc::new(Mutex::new(None::<SubscriptionId>));
        let (handle, slot) = (live.clone(), own_id.clone());
        let id = live.on("disaster_updated", move |_| {
            if let Some(id) = *slot.lock() {
                handle.off(id);
            }
            handle.on("resources_updated", |_| {});
        });
        *own_id.lock() = Some(id);

        live.inner
            .dispatch(&PushEvent::new("disaster_updated", json!({ "id": "1" })));
        assert_eq!(live.handler_count(), 1);
        live.inner
            .dispatch(&PushEvent::new("disaster_updated", json!({ "id": "1" })));
        assert_eq!(live.handler_count(), 1);
        live.close();
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_last_handle_stops_the_task() {
        let connects = Arc::new(AtomicUsize::new(0));
        let live = LiveUpdates::new(refusing_channel(connects.clone()), ReconnectPolicy::default());
        let weak = Arc::downgrade(&live.inner);
        let copy = live.clone();
        live.start();
        drop(live);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!copy.is_closed());

        drop(copy);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert!(weak.upgrade().is_none());
    }
}
