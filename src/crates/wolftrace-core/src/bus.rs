//! Process-wide event bus for non-graph domain events.
//!
//! Topics are opaque strings (`ReportReceived`, `edge:created`). Emitting
//! is fire-and-forget: the payload is handed to a dispatcher task and the
//! emitter returns immediately. Handlers run as spawned tasks, so one slow
//! or failing handler never blocks the emitter, the other handlers, or
//! future events. Graph mutations do not travel here; they flow through
//! the graph store's sink chain.

use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;

/// A named subscriber to bus topics.
///
/// The name is the identity used for idempotent registration: the same
/// `(topic, name)` registered twice runs once.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// Registration identity of this handler.
    fn name(&self) -> &str;

    /// Handle one event. Errors are logged and otherwise ignored.
    async fn handle(&self, topic: &str, payload: Value) -> Result<()>;
}

/// Adapter turning an async closure into an [`EventHandler`].
pub struct FnHandler {
    name: String,
    #[allow(clippy::type_complexity)]
    f: Box<dyn Fn(String, Value) -> BoxFuture<'static, Result<()>> + Send + Sync>,
}

impl FnHandler {
    /// Wrap `f` under the registration identity `name`.
    pub fn new<F>(name: impl Into<String>, f: F) -> Arc<Self>
    where
        F: Fn(String, Value) -> BoxFuture<'static, Result<()>> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            f: Box::new(f),
        })
    }
}

#[async_trait::async_trait]
impl EventHandler for FnHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, topic: &str, payload: Value) -> Result<()> {
        (self.f)(topic.to_string(), payload).await
    }
}

struct BusEvent {
    topic: String,
    payload: Value,
}

/// Topic-to-handler registry with an asynchronous dispatch loop.
#[derive(Default)]
pub struct EventBus {
    handlers: Arc<DashMap<String, Vec<Arc<dyn EventHandler>>>>,
    tx: Mutex<Option<mpsc::UnboundedSender<BusEvent>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Create a stopped bus. Call [`EventBus::start`] before emitting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`. Registration is idempotent per
    /// `(topic, handler.name())`.
    pub fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) {
        let mut entry = self.handlers.entry(topic.to_string()).or_default();
        if entry.iter().any(|h| h.name() == handler.name()) {
            tracing::debug!(topic, handler = handler.name(), "handler already registered");
            return;
        }
        entry.push(handler);
    }

    /// Launch the dispatch loop. Idempotent.
    pub fn start(&self) {
        let mut tx_slot = self.tx.lock();
        if tx_slot.is_some() {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel::<BusEvent>();
        *tx_slot = Some(tx);

        let handlers = self.handlers.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let registered = handlers
                    .get(&event.topic)
                    .map(|entry| entry.value().clone())
                    .unwrap_or_default();
                for handler in registered {
                    let topic = event.topic.clone();
                    let payload = event.payload.clone();
                    tokio::spawn(async move {
                        if let Err(error) = handler.handle(&topic, payload).await {
                            tracing::warn!(
                                topic,
                                handler = handler.name(),
                                %error,
                                "event handler failed"
                            );
                        }
                    });
                }
            }
        });
        *self.dispatcher.lock() = Some(handle);
    }

    /// Emit `payload` on `topic`, returning as soon as the event is
    /// enqueued. A no-op when the bus is stopped.
    pub fn emit(&self, topic: &str, payload: Value) {
        let tx = self.tx.lock();
        match tx.as_ref() {
            Some(tx) => {
                if tx.send(BusEvent {
                    topic: topic.to_string(),
                    payload,
                })
                .is_err()
                {
                    tracing::debug!(topic, "event bus dispatcher gone, event dropped");
                }
            }
            None => tracing::debug!(topic, "event bus stopped, event dropped"),
        }
    }

    /// Stop the dispatch loop after draining already-enqueued events.
    /// Subsequent emits are no-ops until [`EventBus::start`] is called
    /// again.
    pub async fn stop(&self) {
        let tx = self.tx.lock().take();
        drop(tx);
        let handle = self.dispatcher.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingHandler {
        name: String,
        count: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, _topic: &str, _payload: Value) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_emit_reaches_handler() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "ReportReceived",
            Arc::new(CountingHandler {
                name: "counter".into(),
                count: count.clone(),
            }),
        );
        bus.start();
        bus.emit("ReportReceived", json!({"case_id": "C1"}));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_duplicate_registration_runs_once() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            bus.subscribe(
                "edge:created",
                Arc::new(CountingHandler {
                    name: "dup".into(),
                    count: count.clone(),
                }),
            );
        }
        bus.start();
        bus.emit("edge:created", json!({}));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "t",
            FnHandler::new("bad", |_, _| {
                Box::pin(async { Err(crate::error::CoreError::Service("boom".into())) })
            }),
        );
        bus.subscribe(
            "t",
            Arc::new(CountingHandler {
                name: "good".into(),
                count: count.clone(),
            }),
        );
        bus.start();
        bus.emit("t", json!({}));
        bus.emit("t", json!({}));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        bus.stop().await;
    }

    #[tokio::test]
    async fn test_emit_after_stop_is_noop() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(
            "t",
            Arc::new(CountingHandler {
                name: "counter".into(),
                count: count.clone(),
            }),
        );
        bus.start();
        bus.stop().await;
        bus.emit("t", json!({}));
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
