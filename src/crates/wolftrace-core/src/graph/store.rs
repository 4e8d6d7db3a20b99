//! The authoritative in-process graph store.
//!
//! One mutex covers the whole aggregate: node map, edge map, per-case
//! report index, per-case adjacency index, case metadata and raw report
//! payloads. Every mutation produces exactly one [`Mutation`] record which
//! is delivered to the registered sinks, in registration order, while the
//! aggregate lock is still held. Delivery therefore happens in mutation
//! order with no suspension between record production and sink
//! classification; sinks must be synchronous and non-blocking and must not
//! call back into the store.

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::graph::snapshot::{CaseSnapshot, CaseSummary};
use crate::graph::types::{Edge, EdgeKind, Mutation, Node, NodeData, NodeKind};

/// A synchronous receiver of mutation records.
///
/// The store delivers each record to every registered sink in registration
/// order: the subscriber fan-out first, the controller second.
pub trait MutationSink: Send + Sync {
    /// Receive one mutation record. Must not block and must not re-enter
    /// the graph store.
    fn deliver(&self, mutation: &Mutation);
}

#[derive(Default)]
struct GraphInner {
    nodes: HashMap<String, Node>,
    edges: HashMap<String, Edge>,
    /// case_id -> report ids, insertion order.
    report_index: HashMap<String, Vec<String>>,
    /// case_id -> node_id -> incident edge ids.
    adjacency: HashMap<String, HashMap<String, HashSet<String>>>,
    /// case_id -> metadata fields.
    case_metadata: HashMap<String, Map<String, Value>>,
    /// report_id -> raw submitted payload.
    report_payloads: HashMap<String, Value>,
    /// report_id -> graph node carrying it.
    report_nodes: HashMap<String, String>,
    /// case ids in first-seen order.
    case_order: Vec<String>,
}

impl GraphInner {
    fn touch_case(&mut self, case_id: &str) {
        if !self.case_order.iter().any(|c| c == case_id) {
            self.case_order.push(case_id.to_string());
        }
    }

    fn snapshot(&self, case_id: &str) -> CaseSnapshot {
        let mut nodes: Vec<Node> = self
            .nodes
            .values()
            .filter(|n| n.case_id == case_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let mut edges: Vec<Edge> = self
            .edges
            .values()
            .filter(|e| e.case_id == case_id)
            .cloned()
            .collect();
        edges.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        CaseSnapshot {
            case_id: case_id.to_string(),
            nodes,
            edges,
        }
    }
}

/// The shared mutable graph behind a small atomic API.
///
/// All reads hand out clones; no references into the aggregate ever cross
/// the mutation boundary.
#[derive(Default)]
pub struct GraphStore {
    inner: Mutex<GraphInner>,
    sinks: RwLock<Vec<Arc<dyn MutationSink>>>,
}

impl GraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mutation sink. Sinks receive records in registration
    /// order; register the fan-out before the controller.
    pub fn register_sink(&self, sink: Arc<dyn MutationSink>) {
        self.sinks.write().push(sink);
    }

    fn deliver(&self, mutation: &Mutation) {
        for sink in self.sinks.read().iter() {
            sink.deliver(mutation);
        }
    }

    /// Insert a node. Generates an id when `id` is `None`; rejects a
    /// duplicate id. Produces an `AddNode` record.
    pub fn add_node(
        &self,
        kind: NodeKind,
        case_id: &str,
        data: NodeData,
        id: Option<String>,
    ) -> Result<Node> {
        let mut inner = self.inner.lock();
        let node_id = id.unwrap_or_else(|| kind.new_id());
        if inner.nodes.contains_key(&node_id) {
            return Err(CoreError::DuplicateNode(node_id));
        }

        let node = Node {
            id: node_id.clone(),
            kind,
            case_id: case_id.to_string(),
            created_at: chrono::Utc::now(),
            data,
        };
        inner.nodes.insert(node_id, node.clone());
        inner.touch_case(case_id);

        tracing::debug!(node_id = %node.id, kind = %kind, case_id, "node added");
        self.deliver(&Mutation::AddNode { node: node.clone() });
        Ok(node)
    }

    /// Insert an edge. Rejects missing endpoints and endpoints with
    /// differing case ids. Produces an `AddEdge` record.
    pub fn add_edge(
        &self,
        kind: EdgeKind,
        source_id: &str,
        target_id: &str,
        data: Option<Map<String, Value>>,
    ) -> Result<Edge> {
        let mut inner = self.inner.lock();
        let source_case = inner
            .nodes
            .get(source_id)
            .map(|n| n.case_id.clone())
            .ok_or_else(|| CoreError::EdgeEndpointMissing(source_id.to_string()))?;
        let target_case = inner
            .nodes
            .get(target_id)
            .map(|n| n.case_id.clone())
            .ok_or_else(|| CoreError::EdgeEndpointMissing(target_id.to_string()))?;
        if source_case != target_case {
            return Err(CoreError::CrossCaseEdge {
                source_id: source_id.to_string(),
                source_case,
                target: target_id.to_string(),
                target_case,
            });
        }

        let edge = Edge {
            id: Edge::new_id(),
            kind,
            source_node_id: source_id.to_string(),
            target_node_id: target_id.to_string(),
            case_id: source_case.clone(),
            data: data.unwrap_or_default(),
            created_at: chrono::Utc::now(),
        };
        inner.edges.insert(edge.id.clone(), edge.clone());
        let adjacency = inner.adjacency.entry(source_case).or_default();
        adjacency
            .entry(source_id.to_string())
            .or_default()
            .insert(edge.id.clone());
        adjacency
            .entry(target_id.to_string())
            .or_default()
            .insert(edge.id.clone());

        tracing::debug!(
            edge_id = %edge.id,
            kind = %kind,
            source = source_id,
            target = target_id,
            "edge added"
        );
        self.deliver(&Mutation::AddEdge { edge: edge.clone() });
        Ok(edge)
    }

    /// Merge `patch` into a node's data. Keys in the patch overwrite, all
    /// other keys are preserved. Produces an `UpdateNode` record carrying
    /// the full post-merge node; an empty patch still produces one.
    pub fn update_node(&self, node_id: &str, patch: Map<String, Value>) -> Result<Node> {
        let mut inner = self.inner.lock();
        let node = inner
            .nodes
            .get(node_id)
            .ok_or_else(|| CoreError::NodeNotFound(node_id.to_string()))?;
        let merged = node.data.merged(&patch)?;

        let node = inner
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| CoreError::NodeNotFound(node_id.to_string()))?;
        node.data = merged;
        let updated = node.clone();

        tracing::debug!(node_id, keys = patch.len(), "node updated");
        self.deliver(&Mutation::UpdateNode {
            node_id: node_id.to_string(),
            patch,
            node: updated.clone(),
        });
        Ok(updated)
    }

    /// Append a report to the per-case index and keep its raw payload.
    /// Does not create a node; callers use [`GraphStore::add_node`] first
    /// and pass the resulting node id.
    pub fn add_report(
        &self,
        case_id: &str,
        report_id: &str,
        report_data: Value,
        report_node_id: &str,
    ) {
        let mut inner = self.inner.lock();
        inner
            .report_index
            .entry(case_id.to_string())
            .or_default()
            .push(report_id.to_string());
        inner
            .report_payloads
            .insert(report_id.to_string(), report_data);
        inner
            .report_nodes
            .insert(report_id.to_string(), report_node_id.to_string());
        inner.touch_case(case_id);
    }

    /// Graph node carrying a report, if the report is known.
    pub fn report_node_id(&self, report_id: &str) -> Option<String> {
        self.inner.lock().report_nodes.get(report_id).cloned()
    }

    /// Fetch a node by id.
    pub fn get_node(&self, id: &str) -> Option<Node> {
        self.inner.lock().nodes.get(id).cloned()
    }

    /// Fetch an edge by id.
    pub fn get_edge(&self, id: &str) -> Option<Edge> {
        self.inner.lock().edges.get(id).cloned()
    }

    /// All nodes of a case, oldest first, optionally filtered by kind.
    pub fn case_nodes(&self, case_id: &str, kind: Option<NodeKind>) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .inner
            .lock()
            .nodes
            .values()
            .filter(|n| n.case_id == case_id && kind.map_or(true, |k| n.kind == k))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        nodes
    }

    /// All edges incident to a node where the node is the source.
    pub fn edges_from(&self, node_id: &str) -> Vec<Edge> {
        let inner = self.inner.lock();
        let Some(node) = inner.nodes.get(node_id) else {
            return Vec::new();
        };
        let Some(edge_ids) = inner
            .adjacency
            .get(&node.case_id)
            .and_then(|adj| adj.get(node_id))
        else {
            return Vec::new();
        };
        edge_ids
            .iter()
            .filter_map(|id| inner.edges.get(id))
            .filter(|e| e.source_node_id == node_id)
            .cloned()
            .collect()
    }

    /// Whether an edge of `kind` already exists between the two nodes, in
    /// either direction.
    pub fn has_edge_between(&self, a: &str, b: &str, kind: EdgeKind) -> bool {
        let inner = self.inner.lock();
        inner.edges.values().any(|e| {
            e.kind == kind
                && ((e.source_node_id == a && e.target_node_id == b)
                    || (e.source_node_id == b && e.target_node_id == a))
        })
    }

    /// Consistent snapshot of one case.
    pub fn case_snapshot(&self, case_id: &str) -> CaseSnapshot {
        self.inner.lock().snapshot(case_id)
    }

    /// Snapshots of all known cases, in first-seen order.
    pub fn all_case_snapshots(&self) -> Vec<CaseSnapshot> {
        let inner = self.inner.lock();
        inner
            .case_order
            .iter()
            .map(|case_id| inner.snapshot(case_id))
            .collect()
    }

    /// Summaries of all known cases, in first-seen order.
    pub fn all_cases(&self) -> Vec<CaseSummary> {
        let inner = self.inner.lock();
        inner
            .case_order
            .iter()
            .map(|case_id| CaseSummary {
                case_id: case_id.clone(),
                node_count: inner.nodes.values().filter(|n| &n.case_id == case_id).count(),
                edge_count: inner.edges.values().filter(|e| &e.case_id == case_id).count(),
                report_count: inner
                    .report_index
                    .get(case_id)
                    .map_or(0, |reports| reports.len()),
                metadata: inner.case_metadata.get(case_id).cloned().unwrap_or_default(),
            })
            .collect()
    }

    /// Report ids of a case in insertion order.
    pub fn case_report_ids(&self, case_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .report_index
            .get(case_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Raw submitted payload of a report.
    pub fn report_payload(&self, report_id: &str) -> Option<Value> {
        self.inner.lock().report_payloads.get(report_id).cloned()
    }

    /// Merge fields into a case's metadata.
    pub fn set_case_metadata(&self, case_id: &str, fields: Map<String, Value>) {
        let mut inner = self.inner.lock();
        inner.touch_case(case_id);
        let metadata = inner.case_metadata.entry(case_id.to_string()).or_default();
        for (key, value) in fields {
            metadata.insert(key, value);
        }
    }

    /// A case's metadata fields.
    pub fn get_case_metadata(&self, case_id: &str) -> Map<String, Value> {
        self.inner
            .lock()
            .case_metadata
            .get(case_id)
            .cloned()
            .unwrap_or_default()
    }
}
