//! Network analysis: claim extraction, fact-check lookup and external
//! source discovery for a new report.
//!
//! The AI completion and the fact-check lookup are both best-effort: on
//! failure the report still gets an (empty) claims list so downstream
//! sources see a consistent shape.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::controller::{KnowledgeSource, Priority};
use crate::error::Result;
use crate::graph::{EdgeKind, GraphStore, Mutation, Node, NodeData, NodeKind};
use crate::services::{FactCheckLookup, TextCompletion};

/// At most this many claims are checked per report.
const MAX_CHECKED_CLAIMS: usize = 3;

fn claim_prompt(text: &str) -> String {
    format!(
        "Extract the distinct factual claims from this campus safety tip and \
         assess its urgency. Respond with JSON: \
         {{\"claims\": [\"...\"], \"urgency\": \"low\"|\"medium\"|\"high\"}}.\n\
         Tip: {text}"
    )
}

fn parse_claims(value: &Value) -> (Vec<String>, Option<String>) {
    let claims = value
        .get("claims")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let urgency = value
        .get("urgency")
        .and_then(Value::as_str)
        .map(str::to_string);
    (claims, urgency)
}

/// Extracts claims, looks them up against published fact-checks and links
/// in external sources.
pub struct NetworkAnalysisSource {
    store: Arc<GraphStore>,
    completion: Arc<dyn TextCompletion>,
    fact_check: Arc<dyn FactCheckLookup>,
}

impl NetworkAnalysisSource {
    /// Create a network-analysis source.
    pub fn new(
        store: Arc<GraphStore>,
        completion: Arc<dyn TextCompletion>,
        fact_check: Arc<dyn FactCheckLookup>,
    ) -> Self {
        Self {
            store,
            completion,
            fact_check,
        }
    }

    fn existing_source_urls(&self, case_id: &str) -> Vec<String> {
        self.store
            .case_nodes(case_id, Some(NodeKind::ExternalSource))
            .iter()
            .filter_map(|n| n.data.media_url.clone())
            .collect()
    }

    async fn extract_claims(&self, report: &Node) -> (Vec<String>, Option<String>) {
        let text = report.data.text.as_deref().unwrap_or_default();
        match self
            .completion
            .complete(&claim_prompt(text), "claim_extraction")
            .await
        {
            Ok(value) => parse_claims(&value),
            Err(error) => {
                tracing::warn!(report = %report.id, %error, "claim extraction failed, using empty claims");
                (Vec::new(), None)
            }
        }
    }
}

#[async_trait]
impl KnowledgeSource for NetworkAnalysisSource {
    fn name(&self) -> &str {
        "network"
    }

    fn priority(&self) -> Priority {
        Priority::Medium
    }

    fn trigger_event_types(&self) -> Vec<String> {
        vec!["node:report".into()]
    }

    async fn run(&self, mutation: Mutation) -> Result<()> {
        let Some(report) = mutation.node().cloned() else {
            return Ok(());
        };

        let (claims, urgency) = self.extract_claims(&report).await;

        let mut patch = Map::new();
        patch.insert("claims".into(), json!(claims));
        if let Some(urgency) = &urgency {
            patch.insert("urgency".into(), json!(urgency));
        }
        self.store.update_node(&report.id, patch)?;

        let mut known_urls = self.existing_source_urls(&report.case_id);
        for claim in claims.iter().take(MAX_CHECKED_CLAIMS) {
            let reviews = match self.fact_check.lookup(claim).await {
                Ok(reviews) => reviews,
                Err(error) => {
                    tracing::warn!(report = %report.id, claim, %error, "fact-check lookup failed");
                    continue;
                }
            };
            let Some(review) = reviews.first() else {
                continue;
            };

            let mut data = NodeData {
                text: Some(claim.clone()),
                ..Default::default()
            };
            if let Some(rating) = &review.rating {
                data.extra.insert("rating".into(), json!(rating));
            }
            if let Some(reviewer) = &review.reviewer {
                data.extra.insert("reviewer".into(), json!(reviewer));
            }
            if let Some(claimant) = &review.claimant {
                data.extra.insert("claimant".into(), json!(claimant));
            }
            if let Some(url) = &review.url {
                data.extra.insert("review_url".into(), json!(url));
            }
            let check = self
                .store
                .add_node(NodeKind::FactCheck, &report.case_id, data, None)?;

            let mut edge_data = Map::new();
            if let Some(rating) = &review.rating {
                edge_data.insert("rating".into(), json!(rating));
            }
            self.store
                .add_edge(EdgeKind::DebunkedBy, &report.id, &check.id, Some(edge_data))?;
            tracing::info!(report = %report.id, claim, "claim matched a published fact-check");

            // Every distinct review publisher becomes an external source.
            for review in &reviews {
                let Some(url) = &review.url else { continue };
                if known_urls.iter().any(|known| known == url) {
                    continue;
                }
                known_urls.push(url.clone());
                let mut data = NodeData {
                    media_url: Some(url.clone()),
                    ..Default::default()
                };
                if let Some(reviewer) = &review.reviewer {
                    data.extra.insert("publisher".into(), json!(reviewer));
                }
                let external =
                    self.store
                        .add_node(NodeKind::ExternalSource, &report.case_id, data, None)?;
                let mut edge_data = Map::new();
                edge_data.insert("origin".into(), json!("fact_check"));
                self.store.add_edge(
                    EdgeKind::SimilarTo,
                    &report.id,
                    &external.id,
                    Some(edge_data),
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{FactCheckReview, NoopCompletion, NoopFactCheck};

    struct ScriptedCompletion {
        value: Value,
    }

    #[async_trait]
    impl TextCompletion for ScriptedCompletion {
        async fn complete(&self, _prompt: &str, _purpose: &str) -> Result<Value> {
            Ok(self.value.clone())
        }
    }

    struct ScriptedFactCheck {
        reviews: Vec<FactCheckReview>,
    }

    #[async_trait]
    impl FactCheckLookup for ScriptedFactCheck {
        async fn lookup(&self, _claim: &str) -> Result<Vec<FactCheckReview>> {
            Ok(self.reviews.clone())
        }
    }

    fn report(store: &GraphStore, text: &str) -> Node {
        store
            .add_node(
                NodeKind::Report,
                "C1",
                NodeData {
                    text: Some(text.into()),
                    ..Default::default()
                },
                None,
            )
            .unwrap()
    }

    #[test]
    fn test_parse_claims() {
        let value = json!({"claims": ["a", "b"], "urgency": "high"});
        let (claims, urgency) = parse_claims(&value);
        assert_eq!(claims, vec!["a", "b"]);
        assert_eq!(urgency.as_deref(), Some("high"));

        let (claims, urgency) = parse_claims(&Value::Null);
        assert!(claims.is_empty());
        assert!(urgency.is_none());
    }

    #[tokio::test]
    async fn test_noop_stub_yields_empty_claims_no_extra_nodes() {
        let store = Arc::new(GraphStore::new());
        let node = report(&store, "alarm at library");
        let source = NetworkAnalysisSource::new(
            store.clone(),
            Arc::new(NoopCompletion),
            Arc::new(NoopFactCheck),
        );
        source.run(Mutation::AddNode { node: node.clone() }).await.unwrap();

        let updated = store.get_node(&node.id).unwrap();
        assert_eq!(updated.data.claims.as_deref(), Some(&[][..]));
        let snap = store.case_snapshot("C1");
        assert_eq!(snap.nodes.len(), 1);
        assert!(snap.edges.is_empty());
    }

    #[tokio::test]
    async fn test_matched_claim_creates_fact_check_and_external_source() {
        let store = Arc::new(GraphStore::new());
        let node = report(&store, "active shooter in hunt library");
        let source = NetworkAnalysisSource::new(
            store.clone(),
            Arc::new(ScriptedCompletion {
                value: json!({"claims": ["active shooter in hunt library"], "urgency": "high"}),
            }),
            Arc::new(ScriptedFactCheck {
                reviews: vec![FactCheckReview {
                    claimant: Some("anonymous post".into()),
                    rating: Some("False".into()),
                    url: Some("https://factcheck.example/rev/1".into()),
                    reviewer: Some("Example Checker".into()),
                }],
            }),
        );
        source.run(Mutation::AddNode { node: node.clone() }).await.unwrap();

        let updated = store.get_node(&node.id).unwrap();
        assert_eq!(updated.data.urgency.as_deref(), Some("high"));
        assert_eq!(updated.data.claims.as_ref().map(Vec::len), Some(1));

        let checks = store.case_nodes("C1", Some(NodeKind::FactCheck));
        assert_eq!(checks.len(), 1);
        let externals = store.case_nodes("C1", Some(NodeKind::ExternalSource));
        assert_eq!(externals.len(), 1);

        let outgoing = store.edges_from(&node.id);
        assert!(outgoing.iter().any(|e| e.kind == EdgeKind::DebunkedBy));
        assert!(outgoing.iter().any(|e| e.kind == EdgeKind::SimilarTo));
    }

    #[tokio::test]
    async fn test_failing_completion_is_absorbed() {
        struct FailingCompletion;

        #[async_trait]
        impl TextCompletion for FailingCompletion {
            async fn complete(&self, _prompt: &str, _purpose: &str) -> Result<Value> {
                Err(crate::error::CoreError::Service("model offline".into()))
            }
        }

        let store = Arc::new(GraphStore::new());
        let node = report(&store, "alarm");
        let source = NetworkAnalysisSource::new(
            store.clone(),
            Arc::new(FailingCompletion),
            Arc::new(NoopFactCheck),
        );
        source.run(Mutation::AddNode { node: node.clone() }).await.unwrap();
        assert_eq!(
            store.get_node(&node.id).unwrap().data.claims.as_deref(),
            Some(&[][..])
        );
    }
}
