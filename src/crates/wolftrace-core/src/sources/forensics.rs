//! Media forensics: perceptual hashing of report media.
//!
//! On a report with media, computes a 64-bit perceptual hash and compares
//! it to every existing `media_variant` node in the case by Hamming
//! distance: 0..=5 is a repost, 6..=15 is a mutation, anything further is
//! unrelated.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map};
use std::sync::{Arc, OnceLock};

use crate::controller::{KnowledgeSource, Priority};
use crate::error::Result;
use crate::graph::{EdgeKind, GraphStore, Mutation, Node, NodeData, NodeKind};
use crate::services::MediaAnalysis;

const REPOST_MAX_DISTANCE: u32 = 5;
const MUTATION_MAX_DISTANCE: u32 = 15;

fn media_ext_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\.(mp4|mov|webm|avi|mkv)(\?.*)?$").expect("media extension pattern is valid")
    })
}

/// Number of differing bits between two 64-bit hashes.
pub fn hamming(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

fn encode_phash(hash: u64) -> String {
    format!("{hash:016x}")
}

fn decode_phash(hash: &str) -> Option<u64> {
    u64::from_str_radix(hash, 16).ok()
}

/// Hashes report media and links reposts and mutations.
pub struct MediaForensicsSource {
    store: Arc<GraphStore>,
    media: Arc<dyn MediaAnalysis>,
}

impl MediaForensicsSource {
    /// Create a forensics source over `store` using `media` for hashing.
    pub fn new(store: Arc<GraphStore>, media: Arc<dyn MediaAnalysis>) -> Self {
        Self { store, media }
    }

    fn classify_kind(url: &str) -> &'static str {
        if media_ext_re().is_match(url) {
            "video"
        } else {
            "image"
        }
    }
}

#[async_trait]
impl KnowledgeSource for MediaForensicsSource {
    fn name(&self) -> &str {
        "forensics"
    }

    fn priority(&self) -> Priority {
        Priority::High
    }

    fn trigger_event_types(&self) -> Vec<String> {
        vec!["node:report".into()]
    }

    fn condition(&self, mutation: &Mutation) -> bool {
        mutation
            .node()
            .map_or(false, |n| n.data.media_url.is_some())
    }

    async fn run(&self, mutation: Mutation) -> Result<()> {
        let Some(report) = mutation.node().cloned() else {
            return Ok(());
        };
        let Some(url) = report.data.media_url.clone() else {
            return Ok(());
        };

        let hash = match self.media.phash(&url).await {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                tracing::debug!(report = %report.id, url, "media not hashable");
                return Ok(());
            }
            Err(error) => {
                tracing::warn!(report = %report.id, url, %error, "media hashing failed");
                return Ok(());
            }
        };

        let existing: Vec<Node> = self
            .store
            .case_nodes(&report.case_id, Some(NodeKind::MediaVariant));

        let mut data = NodeData {
            media_url: Some(url.clone()),
            phash: Some(encode_phash(hash)),
            ..Default::default()
        };
        data.extra
            .insert("media_kind".into(), json!(Self::classify_kind(&url)));
        data.extra.insert("source_report".into(), json!(report.id));
        self.store
            .add_node(NodeKind::MediaVariant, &report.case_id, data, None)?;

        for variant in existing {
            let Some(other) = variant.data.phash.as_deref().and_then(decode_phash) else {
                continue;
            };
            let distance = hamming(hash, other);
            let kind = match distance {
                0..=REPOST_MAX_DISTANCE => EdgeKind::RepostOf,
                d if d <= MUTATION_MAX_DISTANCE => EdgeKind::MutationOf,
                _ => continue,
            };
            if self.store.has_edge_between(&report.id, &variant.id, kind) {
                continue;
            }
            let mut edge_data = Map::new();
            edge_data.insert("hamming_distance".into(), json!(distance));
            self.store
                .add_edge(kind, &report.id, &variant.id, Some(edge_data))?;
            tracing::info!(
                report = %report.id,
                variant = %variant.id,
                distance,
                kind = %kind,
                "media lineage edge added"
            );
        }
        Ok(())
    }
}
