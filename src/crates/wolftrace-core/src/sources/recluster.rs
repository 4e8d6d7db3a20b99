//! Debunk propagation: keeps a report's `debunk_count` in step with its
//! `debunked_by` edges.

use async_trait::async_trait;
use serde_json::{json, Map};
use std::sync::Arc;

use crate::controller::{KnowledgeSource, Priority};
use crate::error::Result;
use crate::graph::{EdgeKind, GraphStore, Mutation, NodeKind};

/// Recounts debunks for the report on the new `debunked_by` edge.
pub struct DebunkReclusterSource {
    store: Arc<GraphStore>,
}

impl DebunkReclusterSource {
    /// Create a debunk source over `store`.
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl KnowledgeSource for DebunkReclusterSource {
    fn name(&self) -> &str {
        "recluster_debunk"
    }

    fn priority(&self) -> Priority {
        Priority::High
    }

    fn trigger_event_types(&self) -> Vec<String> {
        vec!["edge:debunked_by".into()]
    }

    async fn run(&self, mutation: Mutation) -> Result<()> {
        let Some(edge) = mutation.edge() else {
            return Ok(());
        };
        let Some(report) = self
            .store
            .get_node(&edge.source_node_id)
            .filter(|n| n.kind == NodeKind::Report)
        else {
            return Ok(());
        };

        let debunks = self
            .store
            .edges_from(&report.id)
            .iter()
            .filter(|e| e.kind == EdgeKind::DebunkedBy)
            .count();

        let mut patch = Map::new();
        patch.insert("debunk_count".into(), json!(debunks));
        self.store.update_node(&report.id, patch)?;
        tracing::info!(report = %report.id, debunks, "debunk count updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeData;

    #[tokio::test]
    async fn test_counts_debunked_by_edges() {
        let store = Arc::new(GraphStore::new());
        let report = store
            .add_node(NodeKind::Report, "C1", NodeData::default(), None)
            .unwrap();
        let check_a = store
            .add_node(NodeKind::FactCheck, "C1", NodeData::default(), None)
            .unwrap();
        let check_b = store
            .add_node(NodeKind::FactCheck, "C1", NodeData::default(), None)
            .unwrap();

        let edge = store
            .add_edge(EdgeKind::DebunkedBy, &report.id, &check_a.id, None)
            .unwrap();
        let source = DebunkReclusterSource::new(store.clone());
        source.run(Mutation::AddEdge { edge }).await.unwrap();
        assert_eq!(
            store.get_node(&report.id).unwrap().data.debunk_count,
            Some(1)
        );

        let edge = store
            .add_edge(EdgeKind::DebunkedBy, &report.id, &check_b.id, None)
            .unwrap();
        source.run(Mutation::AddEdge { edge }).await.unwrap();
        assert_eq!(
            store.get_node(&report.id).unwrap().data.debunk_count,
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_non_report_source_is_ignored() {
        let store = Arc::new(GraphStore::new());
        let ext = store
            .add_node(NodeKind::ExternalSource, "C1", NodeData::default(), None)
            .unwrap();
        let check = store
            .add_node(NodeKind::FactCheck, "C1", NodeData::default(), None)
            .unwrap();
        let edge = store
            .add_edge(EdgeKind::DebunkedBy, &ext.id, &check.id, None)
            .unwrap();
        DebunkReclusterSource::new(store.clone())
            .run(Mutation::AddEdge { edge })
            .await
            .unwrap();
        assert_eq!(store.get_node(&ext.id).unwrap().data.debunk_count, None);
    }
}
