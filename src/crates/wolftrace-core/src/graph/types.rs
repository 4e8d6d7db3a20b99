//! Node, edge and mutation-record types for the incident graph.
//!
//! Node `data` is intrinsically schemaless: different node kinds carry
//! different fields. [`NodeData`] models the fields the engine actually
//! reads as typed options and keeps everything else in a flattened
//! free-form map, so merges preserve keys the engine has never heard of.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use crate::error::Result;

/// Kinds of graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// An anonymous tip as submitted.
    Report,
    /// An off-campus page, post or video related to a case.
    ExternalSource,
    /// A published fact-check review.
    FactCheck,
    /// A perceptually-hashed media variant attached to a report.
    MediaVariant,
}

impl NodeKind {
    /// Stable wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Report => "report",
            NodeKind::ExternalSource => "external_source",
            NodeKind::FactCheck => "fact_check",
            NodeKind::MediaVariant => "media_variant",
        }
    }

    /// Id prefix used for generated node ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            NodeKind::Report => "R",
            NodeKind::ExternalSource => "E",
            NodeKind::FactCheck => "F",
            NodeKind::MediaVariant => "M",
        }
    }

    /// Generate a fresh node id with the kind's prefix.
    pub fn new_id(&self) -> String {
        format!("{}-{}", self.id_prefix(), Uuid::new_v4())
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Two reports describe the same underlying incident.
    SimilarTo,
    /// A report reposts existing media unchanged.
    RepostOf,
    /// A report carries an altered variant of existing media.
    MutationOf,
    /// A report is contradicted by a fact-check.
    DebunkedBy,
    /// A report was amplified by an external source.
    AmplifiedBy,
}

impl EdgeKind {
    /// Stable wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::SimilarTo => "similar_to",
            EdgeKind::RepostOf => "repost_of",
            EdgeKind::MutationOf => "mutation_of",
            EdgeKind::DebunkedBy => "debunked_by",
            EdgeKind::AmplifiedBy => "amplified_by",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// The free-form payload of a node.
///
/// Typed fields are the ones knowledge sources read; everything else rides
/// in `extra` untouched. All fields are optional because different node
/// kinds populate different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Report text as submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// When the reported event happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Where the reported event happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Attached media, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    /// Claims extracted from the report text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Vec<String>>,
    /// Urgency assessment from network analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    /// Number of fact-checks contradicting this report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debunk_count: Option<u32>,
    /// Role of this report in the case (originator, amplifier, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_role: Option<String>,
    /// Synthesised case narrative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Confidence of the synthesised narrative, 0.0..=1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Perceptual hash of attached media, 16 hex digits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phash: Option<String>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeData {
    /// Build from an arbitrary JSON object; unknown keys land in `extra`.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Serialise to a JSON object map. Only present fields appear.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Merge `patch` over this data: keys in `patch` overwrite, all other
    /// keys are preserved.
    pub fn merged(&self, patch: &Map<String, Value>) -> Result<NodeData> {
        let mut map = self.to_map();
        for (key, value) in patch {
            map.insert(key.clone(), value.clone());
        }
        Ok(serde_json::from_value(Value::Object(map))?)
    }
}

/// A graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Opaque id, prefixed by kind.
    pub id: String,
    /// Node kind.
    pub kind: NodeKind,
    /// Case this node belongs to.
    pub case_id: String,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Free-form payload.
    pub data: NodeData,
}

/// A graph edge. Created once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Opaque id.
    pub id: String,
    /// Edge kind.
    pub kind: EdgeKind,
    /// Source node id.
    pub source_node_id: String,
    /// Target node id.
    pub target_node_id: String,
    /// Case both endpoints belong to.
    pub case_id: String,
    /// Free-form payload (scores and the like).
    pub data: Map<String, Value>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl Edge {
    /// Generate a fresh edge id.
    pub fn new_id() -> String {
        format!("L-{}", Uuid::new_v4())
    }

    /// Numeric `score` field of the edge data, if present.
    pub fn score(&self) -> Option<f64> {
        self.data.get("score").and_then(Value::as_f64)
    }
}

/// A tagged record of a single graph change, produced atomically with the
/// change and delivered first to caseboard subscribers, then to the
/// controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Mutation {
    /// A node was inserted.
    AddNode {
        /// The new node.
        node: Node,
    },
    /// An edge was inserted.
    AddEdge {
        /// The new edge.
        edge: Edge,
    },
    /// A node's data was merged with a patch.
    UpdateNode {
        /// Id of the updated node.
        node_id: String,
        /// The patch that was merged in.
        patch: Map<String, Value>,
        /// The full node after the merge.
        node: Node,
    },
}

impl Mutation {
    /// Trigger event type derived from this record, e.g. `node:report`,
    /// `edge:similar_to`, `update:report`.
    pub fn event_type(&self) -> String {
        match self {
            Mutation::AddNode { node } => format!("node:{}", node.kind),
            Mutation::AddEdge { edge } => format!("edge:{}", edge.kind),
            Mutation::UpdateNode { node, .. } => format!("update:{}", node.kind),
        }
    }

    /// Case the mutated object belongs to.
    pub fn case_id(&self) -> &str {
        match self {
            Mutation::AddNode { node } => &node.case_id,
            Mutation::AddEdge { edge } => &edge.case_id,
            Mutation::UpdateNode { node, .. } => &node.case_id,
        }
    }

    /// Wire name of the action.
    pub fn action(&self) -> &'static str {
        match self {
            Mutation::AddNode { .. } => "add_node",
            Mutation::AddEdge { .. } => "add_edge",
            Mutation::UpdateNode { .. } => "update_node",
        }
    }

    /// Full post-mutation representation for stream delivery.
    pub fn payload(&self) -> Value {
        let result = match self {
            Mutation::AddNode { node } => serde_json::to_value(node),
            Mutation::AddEdge { edge } => serde_json::to_value(edge),
            Mutation::UpdateNode { node, .. } => serde_json::to_value(node),
        };
        result.unwrap_or(Value::Null)
    }

    /// The node touched by this mutation, if it touched a node.
    pub fn node(&self) -> Option<&Node> {
        match self {
            Mutation::AddNode { node } | Mutation::UpdateNode { node, .. } => Some(node),
            Mutation::AddEdge { .. } => None,
        }
    }

    /// The edge added by this mutation, if it added an edge.
    pub fn edge(&self) -> Option<&Edge> {
        match self {
            Mutation::AddEdge { edge } => Some(edge),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report_node() -> Node {
        Node {
            id: NodeKind::Report.new_id(),
            kind: NodeKind::Report,
            case_id: "C1".into(),
            created_at: Utc::now(),
            data: NodeData {
                text: Some("alarm at library".into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_node_id_prefixes() {
        assert!(NodeKind::Report.new_id().starts_with("R-"));
        assert!(NodeKind::ExternalSource.new_id().starts_with("E-"));
        assert!(NodeKind::FactCheck.new_id().starts_with("F-"));
        assert!(NodeKind::MediaVariant.new_id().starts_with("M-"));
    }

    #[test]
    fn test_event_type_derivation() {
        let node = report_node();
        let add = Mutation::AddNode { node: node.clone() };
        assert_eq!(add.event_type(), "node:report");
        assert_eq!(add.action(), "add_node");

        let edge = Edge {
            id: Edge::new_id(),
            kind: EdgeKind::SimilarTo,
            source_node_id: "R-1".into(),
            target_node_id: "R-2".into(),
            case_id: "C1".into(),
            data: Map::new(),
            created_at: Utc::now(),
        };
        let add_edge = Mutation::AddEdge { edge };
        assert_eq!(add_edge.event_type(), "edge:similar_to");
        assert_eq!(add_edge.case_id(), "C1");

        let update = Mutation::UpdateNode {
            node_id: node.id.clone(),
            patch: Map::new(),
            node,
        };
        assert_eq!(update.event_type(), "update:report");
    }

    #[test]
    fn test_data_merge_overwrites_and_preserves() {
        let data = NodeData::from_value(json!({
            "text": "original",
            "custom_field": "kept",
            "claims": ["a"]
        }))
        .unwrap();

        let patch = match json!({"claims": ["a", "b"], "urgency": "high"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let merged = data.merged(&patch).unwrap();

        assert_eq!(merged.text.as_deref(), Some("original"));
        assert_eq!(merged.claims.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(merged.urgency.as_deref(), Some("high"));
        assert_eq!(merged.extra.get("custom_field"), Some(&json!("kept")));
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let data = NodeData::from_value(json!({
            "text": "t",
            "timestamp": "2025-03-01T12:00:00Z",
            "location": {"lat": 35.78, "lng": -78.68}
        }))
        .unwrap();
        let merged = data.merged(&Map::new()).unwrap();
        assert_eq!(merged, data);
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let data = NodeData::from_value(json!({"platform": "yikyak", "votes": 7})).unwrap();
        let map = data.to_map();
        assert_eq!(map.get("platform"), Some(&json!("yikyak")));
        assert_eq!(map.get("votes"), Some(&json!(7)));
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(
            serde_json::to_value(NodeKind::MediaVariant).unwrap(),
            json!("media_variant")
        );
        assert_eq!(
            serde_json::to_value(EdgeKind::DebunkedBy).unwrap(),
            json!("debunked_by")
        );
    }
}
