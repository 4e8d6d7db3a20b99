//! Per-case views assembled from the graph store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::types::{Edge, Node};

/// Everything known about one case: its nodes and edges, in insertion
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSnapshot {
    /// Case id.
    pub case_id: String,
    /// Nodes of the case, oldest first.
    pub nodes: Vec<Node>,
    /// Edges of the case, oldest first.
    pub edges: Vec<Edge>,
}

impl CaseSnapshot {
    /// An empty snapshot for a case with no graph yet.
    pub fn empty(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }
}

/// A one-line summary of a case for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    /// Case id.
    pub case_id: String,
    /// Total nodes in the case.
    pub node_count: usize,
    /// Total edges in the case.
    pub edge_count: usize,
    /// Reports registered through the report index.
    pub report_count: usize,
    /// Case metadata (label, status, summary, freeform fields).
    pub metadata: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snap = CaseSnapshot::empty("C1");
        assert_eq!(snap.case_id, "C1");
        assert!(snap.nodes.is_empty());
        assert!(snap.edges.is_empty());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = CaseSummary {
            case_id: "C1".into(),
            node_count: 3,
            edge_count: 1,
            report_count: 2,
            metadata: Map::new(),
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"report_count\":2"));
    }
}
