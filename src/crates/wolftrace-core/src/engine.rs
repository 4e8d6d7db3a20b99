//! Engine assembly: wires the store, controller, fan-out and event bus
//! into one lifecycle-managed unit.

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bus::EventBus;
use crate::config::EngineConfig;
use crate::controller::BlackboardController;
use crate::error::Result;
use crate::fanout::{StreamFanout, StreamSink};
use crate::graph::{Edge, EdgeKind, GraphStore, Node, NodeData, NodeKind};
use crate::services::ServiceBundle;
use crate::sources::default_sources;

/// Event-bus topic emitted after a report is accepted.
pub const TOPIC_REPORT_RECEIVED: &str = "ReportReceived";
/// Event-bus topic emitted after a manual link is created.
pub const TOPIC_EDGE_CREATED: &str = "edge:created";

/// The blackboard orchestration engine.
///
/// Construction wires the mutation sinks in the contractual order
/// (fan-out first, controller second) and registers the seven standard
/// knowledge sources. Nothing reacts until [`Engine::start`].
pub struct Engine {
    config: EngineConfig,
    store: Arc<GraphStore>,
    bus: Arc<EventBus>,
    controller: Arc<BlackboardController>,
    fanout: Arc<StreamFanout>,
}

impl Engine {
    /// Build an engine from a validated config and the external services.
    pub fn new(config: EngineConfig, services: ServiceBundle) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(GraphStore::new());
        let fanout = Arc::new(StreamFanout::new(config.fanout_send_timeout()));
        let controller = Arc::new(BlackboardController::new(config.clone()));
        for source in default_sources(store.clone(), &services) {
            controller.register(source);
        }
        store.register_sink(fanout.clone());
        store.register_sink(controller.clone());

        Ok(Self {
            config,
            store,
            bus: Arc::new(EventBus::new()),
            controller,
            fanout,
        })
    }

    /// Launch the controller workers and the event-bus dispatcher.
    pub fn start(&self) {
        self.bus.start();
        self.controller.start();
        tracing::info!(
            workers = self.config.worker_concurrency,
            cap = self.config.max_triggers_per_case,
            sources = ?self.controller.registered_sources(),
            "engine started"
        );
    }

    /// Stop the controller (draining in-flight work) and the bus.
    pub async fn stop(&self) {
        self.controller.stop().await;
        self.bus.stop().await;
        tracing::info!("engine stopped");
    }

    /// The shared graph store.
    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    /// The blackboard controller.
    pub fn controller(&self) -> &Arc<BlackboardController> {
        &self.controller
    }

    /// The stream fan-out.
    pub fn fanout(&self) -> &Arc<StreamFanout> {
        &self.fanout
    }

    /// The event bus for non-graph domain events.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Accept a report: creates its node, appends the report index and
    /// announces `ReportReceived` on the bus. The node creation is what
    /// triggers analysis.
    pub fn ingest_report(&self, case_id: &str, payload: Value) -> Result<Node> {
        let data = NodeData::from_value(payload.clone())?;
        let node = self.store.add_node(NodeKind::Report, case_id, data, None)?;
        self.store.add_report(case_id, &node.id, payload, &node.id);
        self.bus.emit(
            TOPIC_REPORT_RECEIVED,
            json!({"case_id": case_id, "report_id": node.id}),
        );
        Ok(node)
    }

    /// Create a manual link between two nodes and announce it on the bus.
    pub fn link_nodes(
        &self,
        kind: EdgeKind,
        source_id: &str,
        target_id: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<Edge> {
        let edge = self.store.add_edge(kind, source_id, target_id, data)?;
        self.bus.emit(
            TOPIC_EDGE_CREATED,
            json!({
                "edge_id": edge.id,
                "kind": edge.kind,
                "case_id": edge.case_id,
            }),
        );
        Ok(edge)
    }

    /// Publish an alert to the alert stream, returning as soon as it is
    /// queued for every subscriber.
    pub fn publish_alert(&self, alert: Value) {
        self.fanout.publish_alert(alert);
    }

    /// Attach a caseboard observer; it immediately receives a snapshot of
    /// every known case.
    pub fn subscribe_caseboard(&self, sink: Arc<dyn StreamSink>) -> String {
        self.fanout
            .subscribe_caseboard(sink, self.store.all_case_snapshots())
    }

    /// Attach an alert observer.
    pub fn subscribe_alerts(&self, sink: Arc<dyn StreamSink>) -> String {
        self.fanout.subscribe_alerts(sink)
    }

    /// Wait until the controller has been idle for a short settle window,
    /// or `max_wait` elapses. Returns whether quiescence was reached.
    pub async fn quiesced(&self, max_wait: Duration) -> bool {
        let settle = Duration::from_millis(40);
        let deadline = Instant::now() + max_wait;
        let mut idle_since: Option<Instant> = None;
        loop {
            if self.controller.is_idle() {
                let since = idle_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= settle {
                    return true;
                }
            } else {
                idle_since = None;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_refuses_to_build() {
        let config = EngineConfig::default().with_worker_concurrency(0);
        assert!(Engine::new(config, ServiceBundle::noop()).is_err());
    }

    #[test]
    fn test_engine_registers_all_sources() {
        let engine = Engine::new(EngineConfig::default(), ServiceBundle::noop()).unwrap();
        assert_eq!(engine.controller().registered_sources().len(), 7);
    }

    #[tokio::test]
    async fn test_ingest_report_creates_node_and_index() {
        let engine = Engine::new(EngineConfig::default(), ServiceBundle::noop()).unwrap();
        let node = engine
            .ingest_report("C1", json!({"text": "alarm", "platform": "kiosk"}))
            .unwrap();
        assert_eq!(node.kind, NodeKind::Report);
        assert_eq!(engine.store().case_report_ids("C1"), vec![node.id.clone()]);
        assert_eq!(
            engine.store().report_payload(&node.id),
            Some(json!({"text": "alarm", "platform": "kiosk"}))
        );
    }

    #[tokio::test]
    async fn test_link_nodes_rejects_cross_case() {
        let engine = Engine::new(EngineConfig::default(), ServiceBundle::noop()).unwrap();
        let a = engine.ingest_report("C1", json!({"text": "a"})).unwrap();
        let b = engine.ingest_report("C2", json!({"text": "b"})).unwrap();
        let err = engine
            .link_nodes(EdgeKind::SimilarTo, &a.id, &b.id, None)
            .unwrap_err();
        assert!(err.is_invalid_mutation());
    }
}
