//! Report clustering: temporal + geographic + semantic similarity.
//!
//! For a triggering report R, every other report in the same case is
//! scored on three components:
//!
//! - temporal: 1.0 within 30 minutes, linearly decaying to 0 over the
//!   next 30 minutes;
//! - geographic: 1.0 within 200 m great-circle distance, linearly
//!   decaying to 0 over the next 200 m;
//! - semantic: Jaccard similarity of the token bags (lowercased words
//!   longer than 3 characters).
//!
//! combined = 0.3·temporal + 0.3·geographic + 0.4·semantic; a pair at or
//! above 0.4 gets a `similar_to` edge carrying all four values. A missing
//! timestamp or location on either side zeroes that component.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{json, Map};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::controller::{KnowledgeSource, Priority};
use crate::error::Result;
use crate::graph::{EdgeKind, GeoPoint, GraphStore, Mutation, Node, NodeKind};

const TEMPORAL_WINDOW_SECS: f64 = 30.0 * 60.0;
const GEO_WINDOW_M: f64 = 200.0;
const WEIGHT_TEMPORAL: f64 = 0.3;
const WEIGHT_GEOGRAPHIC: f64 = 0.3;
const WEIGHT_SEMANTIC: f64 = 0.4;
const EDGE_THRESHOLD: f64 = 0.4;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const MIN_TOKEN_LEN: usize = 3;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9]+").expect("token pattern is valid"))
}

/// Great-circle distance between two points in metres.
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Lowercased words longer than [`MIN_TOKEN_LEN`] characters.
pub fn token_bag(text: &str) -> HashSet<String> {
    token_re()
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() > MIN_TOKEN_LEN)
        .collect()
}

/// |A∩B| / |A∪B| over two token bags; 0 when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn temporal_score(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let dt = (a - b).num_seconds().unsigned_abs() as f64;
    if dt <= TEMPORAL_WINDOW_SECS {
        1.0
    } else if dt >= 2.0 * TEMPORAL_WINDOW_SECS {
        0.0
    } else {
        1.0 - (dt - TEMPORAL_WINDOW_SECS) / TEMPORAL_WINDOW_SECS
    }
}

fn geographic_score(a: Option<GeoPoint>, b: Option<GeoPoint>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let d = haversine_m(a, b);
    if d <= GEO_WINDOW_M {
        1.0
    } else if d >= 2.0 * GEO_WINDOW_M {
        0.0
    } else {
        1.0 - (d - GEO_WINDOW_M) / GEO_WINDOW_M
    }
}

/// The three components and their weighted combination for one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterScore {
    /// Temporal component.
    pub t: f64,
    /// Geographic component.
    pub g: f64,
    /// Semantic component.
    pub s: f64,
    /// Weighted combination.
    pub combined: f64,
}

/// Score a pair of reports.
pub fn score_pair(a: &Node, b: &Node) -> ClusterScore {
    let t = temporal_score(a.data.timestamp, b.data.timestamp);
    let g = geographic_score(a.data.location, b.data.location);
    let s = jaccard(
        &token_bag(a.data.text.as_deref().unwrap_or_default()),
        &token_bag(b.data.text.as_deref().unwrap_or_default()),
    );
    ClusterScore {
        t,
        g,
        s,
        combined: WEIGHT_TEMPORAL * t + WEIGHT_GEOGRAPHIC * g + WEIGHT_SEMANTIC * s,
    }
}

/// Clusters reports into incidents as they arrive.
pub struct ClusteringSource {
    store: Arc<GraphStore>,
}

impl ClusteringSource {
    /// Create a clustering source over `store`.
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }

    fn triggering_report(&self, mutation: &Mutation) -> Option<Node> {
        match mutation {
            Mutation::AddNode { node } if node.kind == NodeKind::Report => Some(node.clone()),
            Mutation::AddEdge { edge } => self
                .store
                .get_node(&edge.source_node_id)
                .filter(|n| n.kind == NodeKind::Report),
            _ => None,
        }
    }
}

#[async_trait]
impl KnowledgeSource for ClusteringSource {
    fn name(&self) -> &str {
        "clustering"
    }

    fn priority(&self) -> Priority {
        Priority::Critical
    }

    fn trigger_event_types(&self) -> Vec<String> {
        vec![
            "node:report".into(),
            "edge:repost_of".into(),
            "edge:mutation_of".into(),
        ]
    }

    async fn run(&self, mutation: Mutation) -> Result<()> {
        let Some(report) = self.triggering_report(&mutation) else {
            return Ok(());
        };

        let peers = self.store.case_nodes(&report.case_id, Some(NodeKind::Report));
        let mut linked = 0usize;
        for peer in peers.iter().filter(|p| p.id != report.id) {
            let score = score_pair(&report, peer);
            if score.combined < EDGE_THRESHOLD {
                continue;
            }
            if self
                .store
                .has_edge_between(&report.id, &peer.id, EdgeKind::SimilarTo)
            {
                continue;
            }
            let mut data = Map::new();
            data.insert("score".into(), json!(score.combined));
            data.insert("t".into(), json!(score.t));
            data.insert("g".into(), json!(score.g));
            data.insert("s".into(), json!(score.s));
            self.store
                .add_edge(EdgeKind::SimilarTo, &report.id, &peer.id, Some(data))?;
            linked += 1;
        }
        if linked > 0 {
            tracing::info!(
                report = %report.id,
                case_id = %report.case_id,
                linked,
                "clustered report against case peers"
            );
        }
        Ok(())
    }
}
