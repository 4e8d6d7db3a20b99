//! Subscriber fan-out for the caseboard and alert streams.
//!
//! Each subscriber is an independent sink with its own pending queue and
//! pump task. Broadcasting never blocks the producer: a message is pushed
//! onto every live subscriber's queue and the pump delivers it with a
//! bounded send timeout. A subscriber that overflows its queue, errors, or
//! exceeds the send timeout is dropped; the others are unaffected.
//!
//! Delivery is best-effort and in-order per subscriber. A caseboard
//! subscriber's first message is always the full-graph snapshot.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::graph::{CaseSnapshot, Mutation, MutationSink};

const DEFAULT_MAX_PENDING: usize = 1024;

/// A message on the caseboard or alert stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Initial full-graph state, sent once on caseboard subscribe.
    Snapshot {
        /// Per-case snapshots of all cases.
        payload: Vec<CaseSnapshot>,
        /// RFC 3339 send time.
        timestamp: String,
    },
    /// One graph mutation.
    GraphUpdate {
        /// Mutation action (`add_node`, `add_edge`, `update_node`).
        action: String,
        /// Full post-mutation representation.
        payload: Value,
        /// RFC 3339 send time.
        timestamp: String,
    },
    /// A published alert.
    NewAlert {
        /// The alert body.
        alert: Value,
        /// RFC 3339 send time.
        timestamp: String,
    },
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Where a subscriber's messages go. Implemented by the WebSocket layer
/// and by [`ChannelSink`] for in-process consumers.
#[async_trait]
pub trait StreamSink: Send + Sync {
    /// Deliver one message. May suspend; the fan-out applies its send
    /// timeout around every call.
    async fn send(&self, message: StreamMessage) -> Result<()>;
}

/// A [`StreamSink`] backed by a bounded channel.
pub struct ChannelSink {
    tx: mpsc::Sender<StreamMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver draining it.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<StreamMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl StreamSink for ChannelSink {
    async fn send(&self, message: StreamMessage) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| CoreError::Closed("stream receiver dropped".into()))
    }
}

struct Subscriber {
    id: String,
    queue: Mutex<VecDeque<StreamMessage>>,
    wakeup: Notify,
    closed: AtomicBool,
}

impl Subscriber {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            queue: Mutex::new(VecDeque::new()),
            wakeup: Notify::new(),
            closed: AtomicBool::new(false),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.wakeup.notify_one();
    }
}

type Registry = Arc<DashMap<String, Arc<Subscriber>>>;

/// Fan-out over the two observer streams.
pub struct StreamFanout {
    caseboard: Registry,
    alerts: Registry,
    send_timeout: Duration,
    max_pending: usize,
}

impl StreamFanout {
    /// Create a fan-out applying `send_timeout` to every delivery.
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            caseboard: Arc::new(DashMap::new()),
            alerts: Arc::new(DashMap::new()),
            send_timeout,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }

    /// Override the pending-queue bound used to drop stalled subscribers.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending;
        self
    }

    /// Attach a caseboard observer. It immediately receives a snapshot of
    /// all of `snapshots`, then every graph mutation in order. Returns the
    /// subscriber id.
    pub fn subscribe_caseboard(
        &self,
        sink: Arc<dyn StreamSink>,
        snapshots: Vec<CaseSnapshot>,
    ) -> String {
        let subscriber = Subscriber::new();
        subscriber.queue.lock().push_back(StreamMessage::Snapshot {
            payload: snapshots,
            timestamp: now_rfc3339(),
        });
        subscriber.wakeup.notify_one();
        self.attach(&self.caseboard, subscriber, sink)
    }

    /// Attach an alert observer. Returns the subscriber id.
    pub fn subscribe_alerts(&self, sink: Arc<dyn StreamSink>) -> String {
        self.attach(&self.alerts, Subscriber::new(), sink)
    }

    fn attach(
        &self,
        registry: &Registry,
        subscriber: Arc<Subscriber>,
        sink: Arc<dyn StreamSink>,
    ) -> String {
        let id = subscriber.id.clone();
        registry.insert(id.clone(), subscriber.clone());
        tracing::debug!(subscriber = %id, "stream subscriber attached");

        let registry = registry.clone();
        let send_timeout = self.send_timeout;
        tokio::spawn(async move {
            Self::pump(registry, subscriber, sink, send_timeout).await;
        });
        id
    }

    async fn pump(
        registry: Registry,
        subscriber: Arc<Subscriber>,
        sink: Arc<dyn StreamSink>,
        send_timeout: Duration,
    ) {
        loop {
            let message = subscriber.queue.lock().pop_front();
            let Some(message) = message else {
                if subscriber.closed.load(Ordering::SeqCst) {
                    break;
                }
                subscriber.wakeup.notified().await;
                continue;
            };

            match tokio::time::timeout(send_timeout, sink.send(message)).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::warn!(subscriber = %subscriber.id, %error, "subscriber send failed, dropping");
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        subscriber = %subscriber.id,
                        timeout_ms = send_timeout.as_millis() as u64,
                        "subscriber send timed out, dropping slow subscriber"
                    );
                    break;
                }
            }
        }
        subscriber.closed.store(true, Ordering::SeqCst);
        registry.remove(&subscriber.id);
        tracing::debug!(subscriber = %subscriber.id, "stream subscriber detached");
    }

    fn broadcast(&self, registry: &Registry, message: &StreamMessage) {
        let mut stalled: Vec<String> = Vec::new();
        for entry in registry.iter() {
            let subscriber = entry.value();
            if subscriber.closed.load(Ordering::SeqCst) {
                continue;
            }
            let mut queue = subscriber.queue.lock();
            if queue.len() >= self.max_pending {
                queue.clear();
                drop(queue);
                subscriber.close();
                stalled.push(subscriber.id.clone());
                continue;
            }
            queue.push_back(message.clone());
            drop(queue);
            subscriber.wakeup.notify_one();
        }
        for id in stalled {
            registry.remove(&id);
            tracing::warn!(subscriber = %id, "subscriber queue overflowed, dropped");
        }
    }

    /// Publish one alert to every alert subscriber.
    pub fn publish_alert(&self, alert: Value) {
        let message = StreamMessage::NewAlert {
            alert,
            timestamp: now_rfc3339(),
        };
        self.broadcast(&self.alerts, &message);
    }

    /// Detach a subscriber from either stream.
    pub fn unsubscribe(&self, id: &str) {
        for registry in [&self.caseboard, &self.alerts] {
            if let Some((_, subscriber)) = registry.remove(id) {
                subscriber.close();
            }
        }
    }

    /// Live caseboard subscriber count.
    pub fn caseboard_count(&self) -> usize {
        self.caseboard.len()
    }

    /// Live alert subscriber count.
    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }
}

impl MutationSink for StreamFanout {
    fn deliver(&self, mutation: &Mutation) {
        let message = StreamMessage::GraphUpdate {
            action: mutation.action().to_string(),
            payload: mutation.payload(),
            timestamp: now_rfc3339(),
        };
        self.broadcast(&self.caseboard, &message);
    }
}
