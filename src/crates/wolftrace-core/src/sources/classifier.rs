//! Semantic role assignment, deterministic given the graph.
//!
//! Role ladder per report:
//! 1. any outgoing `mutation_of` edge -> `mutator`;
//! 2. else any outgoing `repost_of` edge -> `amplifier`;
//! 3. else the earliest-timestamped report of the case -> `originator`;
//! 4. else no outgoing edge to an `external_source` or `fact_check`
//!    -> `unwitting_sharer`;
//! 5. else the current role stands.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map};
use std::sync::Arc;

use crate::controller::{KnowledgeSource, Priority};
use crate::error::Result;
use crate::graph::{Edge, EdgeKind, GraphStore, Mutation, Node, NodeKind};

/// Report role within a case.
pub const ROLE_MUTATOR: &str = "mutator";
/// Report role within a case.
pub const ROLE_AMPLIFIER: &str = "amplifier";
/// Report role within a case.
pub const ROLE_ORIGINATOR: &str = "originator";
/// Report role within a case.
pub const ROLE_UNWITTING_SHARER: &str = "unwitting_sharer";

fn effective_timestamp(node: &Node) -> DateTime<Utc> {
    node.data.timestamp.unwrap_or(node.created_at)
}

fn classify(report: &Node, outgoing: &[Edge], earliest_id: &str, store: &GraphStore) -> Option<&'static str> {
    if outgoing.iter().any(|e| e.kind == EdgeKind::MutationOf) {
        return Some(ROLE_MUTATOR);
    }
    if outgoing.iter().any(|e| e.kind == EdgeKind::RepostOf) {
        return Some(ROLE_AMPLIFIER);
    }
    if report.id == earliest_id {
        return Some(ROLE_ORIGINATOR);
    }
    let cites_evidence = outgoing.iter().any(|e| {
        store
            .get_node(&e.target_node_id)
            .map_or(false, |target| {
                matches!(target.kind, NodeKind::ExternalSource | NodeKind::FactCheck)
            })
    });
    if !cites_evidence {
        return Some(ROLE_UNWITTING_SHARER);
    }
    None
}

/// Assigns each report its role in the case narrative.
pub struct SemanticRoleSource {
    store: Arc<GraphStore>,
}

impl SemanticRoleSource {
    /// Create a classifier over `store`.
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KnowledgeSource for SemanticRoleSource {
    fn name(&self) -> &str {
        "classifier"
    }

    fn priority(&self) -> Priority {
        Priority::Low
    }

    fn trigger_event_types(&self) -> Vec<String> {
        vec![
            "edge:similar_to".into(),
            "edge:repost_of".into(),
            "edge:mutation_of".into(),
            "edge:debunked_by".into(),
            "node:fact_check".into(),
            "node:external_source".into(),
        ]
    }

    async fn run(&self, mutation: Mutation) -> Result<()> {
        let case_id = mutation.case_id().to_string();
        let reports = self.store.case_nodes(&case_id, Some(NodeKind::Report));
        let Some(earliest) = reports
            .iter()
            .min_by_key(|r| (effective_timestamp(r), r.created_at, r.id.clone()))
        else {
            return Ok(());
        };
        let earliest_id = earliest.id.clone();

        for report in &reports {
            let outgoing = self.store.edges_from(&report.id);
            let Some(role) = classify(report, &outgoing, &earliest_id, &self.store) else {
                continue;
            };
            if report.data.semantic_role.as_deref() == Some(role) {
                continue;
            }
            let mut patch = Map::new();
            patch.insert("semantic_role".into(), json!(role));
            self.store.update_node(&report.id, patch)?;
            tracing::debug!(report = %report.id, role, "semantic role assigned");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeData;
    use chrono::TimeZone;

    fn report_at(store: &GraphStore, case: &str, minute: u32) -> Node {
        store
            .add_node(
                NodeKind::Report,
                case,
                NodeData {
                    timestamp: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, minute, 0).unwrap()),
                    ..Default::default()
                },
                None,
            )
            .unwrap()
    }

    fn classify_case(store: &Arc<GraphStore>, case: &str) {
        let source = SemanticRoleSource::new(store.clone());
        let node = store
            .add_node(NodeKind::ExternalSource, case, NodeData::default(), None)
            .unwrap();
        futures::executor::block_on(source.run(Mutation::AddNode { node })).unwrap();
    }

    fn role_of(store: &GraphStore, id: &str) -> Option<String> {
        store.get_node(id).unwrap().data.semantic_role
    }

    #[test]
    fn test_earliest_report_is_originator() {
        let store = Arc::new(GraphStore::new());
        let first = report_at(&store, "C1", 0);
        let second = report_at(&store, "C1", 10);
        classify_case(&store, "C1");
        assert_eq!(role_of(&store, &first.id).as_deref(), Some(ROLE_ORIGINATOR));
        assert_eq!(
            role_of(&store, &second.id).as_deref(),
            Some(ROLE_UNWITTING_SHARER)
        );
    }

    #[test]
    fn test_mutation_edge_beats_repost_edge() {
        let store = Arc::new(GraphStore::new());
        let report = report_at(&store, "C1", 0);
        let variant = store
            .add_node(NodeKind::MediaVariant, "C1", NodeData::default(), None)
            .unwrap();
        store
            .add_edge(EdgeKind::RepostOf, &report.id, &variant.id, None)
            .unwrap();
        store
            .add_edge(EdgeKind::MutationOf, &report.id, &variant.id, None)
            .unwrap();
        classify_case(&store, "C1");
        assert_eq!(role_of(&store, &report.id).as_deref(), Some(ROLE_MUTATOR));
    }

    #[test]
    fn test_repost_makes_amplifier() {
        let store = Arc::new(GraphStore::new());
        let _first = report_at(&store, "C1", 0);
        let reposter = report_at(&store, "C1", 5);
        let variant = store
            .add_node(NodeKind::MediaVariant, "C1", NodeData::default(), None)
            .unwrap();
        store
            .add_edge(EdgeKind::RepostOf, &reposter.id, &variant.id, None)
            .unwrap();
        classify_case(&store, "C1");
        assert_eq!(role_of(&store, &reposter.id).as_deref(), Some(ROLE_AMPLIFIER));
    }

    #[test]
    fn test_evidence_citing_report_keeps_role() {
        let store = Arc::new(GraphStore::new());
        let _first = report_at(&store, "C1", 0);
        let citing = report_at(&store, "C1", 5);
        let external = store
            .add_node(NodeKind::ExternalSource, "C1", NodeData::default(), None)
            .unwrap();
        store
            .add_edge(EdgeKind::SimilarTo, &citing.id, &external.id, None)
            .unwrap();
        classify_case(&store, "C1");
        // Not earliest, cites evidence: the ladder leaves it unchanged.
        assert_eq!(role_of(&store, &citing.id), None);
    }

    #[test]
    fn test_unchanged_role_is_not_rewritten() {
        let store = Arc::new(GraphStore::new());
        let report = report_at(&store, "C1", 0);
        classify_case(&store, "C1");
        assert_eq!(role_of(&store, &report.id).as_deref(), Some(ROLE_ORIGINATOR));

        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        struct Recorder(Arc<parking_lot::Mutex<Vec<String>>>);
        impl crate::graph::MutationSink for Recorder {
            fn deliver(&self, mutation: &Mutation) {
                self.0.lock().push(mutation.event_type());
            }
        }
        store.register_sink(Arc::new(Recorder(log.clone())));
        classify_case(&store, "C1");
        // Only the external_source node added by the helper, no update.
        assert_eq!(log.lock().clone(), vec!["node:external_source"]);
    }
}
