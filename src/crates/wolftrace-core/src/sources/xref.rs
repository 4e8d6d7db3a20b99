//! Forensics cross-reference: reverse-searches a report's claims against
//! external video/image sources once claims exist.

use async_trait::async_trait;
use serde_json::{json, Map};
use std::sync::Arc;

use crate::controller::{KnowledgeSource, Priority};
use crate::error::Result;
use crate::graph::{EdgeKind, GraphStore, Mutation, NodeData, NodeKind};
use crate::services::MediaAnalysis;

/// Matches below this confidence are discarded.
const MATCH_THRESHOLD: f64 = 0.5;
/// At most this many matches are linked per run.
const MAX_LINKED_MATCHES: usize = 3;

/// Links externally-found media matching a report's claims.
pub struct ForensicsXrefSource {
    store: Arc<GraphStore>,
    media: Arc<dyn MediaAnalysis>,
}

impl ForensicsXrefSource {
    /// Create a cross-reference source.
    pub fn new(store: Arc<GraphStore>, media: Arc<dyn MediaAnalysis>) -> Self {
        Self { store, media }
    }
}

#[async_trait]
impl KnowledgeSource for ForensicsXrefSource {
    fn name(&self) -> &str {
        "forensics_xref"
    }

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    fn trigger_event_types(&self) -> Vec<String> {
        vec!["update:report".into()]
    }

    fn condition(&self, mutation: &Mutation) -> bool {
        mutation
            .node()
            .and_then(|n| n.data.claims.as_ref())
            .map_or(false, |claims| !claims.is_empty())
    }

    async fn run(&self, mutation: Mutation) -> Result<()> {
        let Some(report) = mutation.node().cloned() else {
            return Ok(());
        };
        let Some(claims) = report.data.claims.clone().filter(|c| !c.is_empty()) else {
            return Ok(());
        };

        let query = claims.join(" ");
        let matches = match self.media.video_search(&query).await {
            Ok(matches) => matches,
            Err(error) => {
                tracing::warn!(report = %report.id, %error, "video search failed");
                return Ok(());
            }
        };

        let known: Vec<String> = self
            .store
            .case_nodes(&report.case_id, Some(NodeKind::ExternalSource))
            .iter()
            .filter_map(|n| n.data.media_url.clone())
            .collect();

        for found in matches
            .iter()
            .filter(|m| m.score >= MATCH_THRESHOLD)
            .take(MAX_LINKED_MATCHES)
        {
            if known.iter().any(|url| url == &found.source) {
                continue;
            }
            let mut data = NodeData {
                media_url: Some(found.source.clone()),
                ..Default::default()
            };
            data.extra.insert("match_score".into(), json!(found.score));
            let external = self
                .store
                .add_node(NodeKind::ExternalSource, &report.case_id, data, None)?;

            let mut edge_data = Map::new();
            edge_data.insert("score".into(), json!(found.score));
            edge_data.insert("origin".into(), json!("video_search"));
            self.store.add_edge(
                EdgeKind::SimilarTo,
                &report.id,
                &external.id,
                Some(edge_data),
            )?;
            tracing::info!(
                report = %report.id,
                source = %found.source,
                score = found.score,
                "external media match linked"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use crate::services::VideoMatch;

    struct ScriptedMedia {
        matches: Vec<VideoMatch>,
    }

    #[async_trait]
    impl MediaAnalysis for ScriptedMedia {
        async fn phash(&self, _url: &str) -> Result<Option<u64>> {
            Ok(None)
        }

        async fn video_search(&self, _query: &str) -> Result<Vec<VideoMatch>> {
            Ok(self.matches.clone())
        }
    }

    fn report_with_claims(store: &GraphStore, claims: &[&str]) -> Node {
        store
            .add_node(
                NodeKind::Report,
                "C1",
                NodeData {
                    claims: Some(claims.iter().map(|c| c.to_string()).collect()),
                    ..Default::default()
                },
                None,
            )
            .unwrap()
    }

    fn update_mutation(node: Node) -> Mutation {
        Mutation::UpdateNode {
            node_id: node.id.clone(),
            patch: Map::new(),
            node,
        }
    }

    #[tokio::test]
    async fn test_condition_requires_nonempty_claims() {
        let store = Arc::new(GraphStore::new());
        let source = ForensicsXrefSource::new(store.clone(), Arc::new(ScriptedMedia { matches: vec![] }));

        let empty = report_with_claims(&store, &[]);
        assert!(!source.condition(&update_mutation(empty)));
        let with = report_with_claims(&store, &["claim"]);
        assert!(source.condition(&update_mutation(with)));
    }

    #[tokio::test]
    async fn test_strong_matches_become_external_sources() {
        let store = Arc::new(GraphStore::new());
        let report = report_with_claims(&store, &["fire at library"]);
        let source = ForensicsXrefSource::new(
            store.clone(),
            Arc::new(ScriptedMedia {
                matches: vec![
                    VideoMatch { source: "https://video.example/a".into(), score: 0.9 },
                    VideoMatch { source: "https://video.example/b".into(), score: 0.2 },
                ],
            }),
        );
        source.run(update_mutation(report.clone())).await.unwrap();

        let externals = store.case_nodes("C1", Some(NodeKind::ExternalSource));
        assert_eq!(externals.len(), 1, "weak match filtered out");
        let edges = store.edges_from(&report.id);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, EdgeKind::SimilarTo);
        assert_eq!(edges[0].score(), Some(0.9));
    }

    #[tokio::test]
    async fn test_known_urls_not_duplicated() {
        let store = Arc::new(GraphStore::new());
        let report = report_with_claims(&store, &["claim"]);
        let source = ForensicsXrefSource::new(
            store.clone(),
            Arc::new(ScriptedMedia {
                matches: vec![VideoMatch { source: "https://video.example/a".into(), score: 0.8 }],
            }),
        );
        source.run(update_mutation(report.clone())).await.unwrap();
        source.run(update_mutation(report)).await.unwrap();
        assert_eq!(store.case_nodes("C1", Some(NodeKind::ExternalSource)).len(), 1);
    }
}
