//! Case synthesis: a background narrative over everything the case knows.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::controller::{KnowledgeSource, Priority};
use crate::error::Result;
use crate::graph::{GraphStore, Mutation, NodeKind};
use crate::services::TextCompletion;

fn synthesis_prompt(case_id: &str, reports: usize, edges: usize, claims: &[String]) -> String {
    format!(
        "Case {case_id} has {reports} reports and {edges} relationships. \
         Claims under analysis: {claims:?}. Write a two-sentence incident \
         narrative and a confidence value. Respond with JSON: \
         {{\"narrative\": \"...\", \"confidence\": 0.0}}."
    )
}

/// Produces a case narrative when a report's claims change.
pub struct CaseSynthesizerSource {
    store: Arc<GraphStore>,
    completion: Arc<dyn TextCompletion>,
}

impl CaseSynthesizerSource {
    /// Create a synthesizer source.
    pub fn new(store: Arc<GraphStore>, completion: Arc<dyn TextCompletion>) -> Self {
        Self { store, completion }
    }
}

#[async_trait]
impl KnowledgeSource for CaseSynthesizerSource {
    fn name(&self) -> &str {
        "case_synthesizer"
    }

    fn priority(&self) -> Priority {
        Priority::Background
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
        let claims = report.data.claims.clone().unwrap_or_default();
        let snapshot = self.store.case_snapshot(&report.case_id);
        let reports = snapshot
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Report)
            .count();

        let prompt = synthesis_prompt(&report.case_id, reports, snapshot.edges.len(), &claims);
        let value = match self.completion.complete(&prompt, "case_synthesis").await {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(case_id = %report.case_id, %error, "case synthesis failed, skipped");
                return Ok(());
            }
        };
        let Some(narrative) = value.get("narrative").and_then(Value::as_str) else {
            tracing::debug!(case_id = %report.case_id, "synthesis returned no narrative, skipped");
            return Ok(());
        };
        let confidence = value
            .get("confidence")
            .and_then(Value::as_f64)
            .map(|c| c.clamp(0.0, 1.0));

        let mut patch = Map::new();
        patch.insert("narrative".into(), json!(narrative));
        if let Some(confidence) = confidence {
            patch.insert("confidence".into(), json!(confidence));
        }
        self.store.update_node(&report.id, patch)?;

        let mut metadata = Map::new();
        metadata.insert("summary".into(), json!(narrative));
        metadata.insert(
            "last_synthesized_at".into(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        self.store.set_case_metadata(&report.case_id, metadata);
        tracing::info!(case_id = %report.case_id, "case narrative refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeData};
    use crate::services::NoopCompletion;

    struct ScriptedCompletion {
        value: Value,
    }

    #[async_trait]
    impl TextCompletion for ScriptedCompletion {
        async fn complete(&self, _prompt: &str, _purpose: &str) -> Result<Value> {
            Ok(self.value.clone())
        }
    }

    fn claimed_report(store: &GraphStore) -> Node {
        store
            .add_node(
                NodeKind::Report,
                "C1",
                NodeData {
                    claims: Some(vec!["fire at library".into()]),
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
    async fn test_narrative_written_to_report_and_metadata() {
        let store = Arc::new(GraphStore::new());
        let report = claimed_report(&store);
        let source = CaseSynthesizerSource::new(
            store.clone(),
            Arc::new(ScriptedCompletion {
                value: json!({"narrative": "A fire alarm spread across campus.", "confidence": 0.8}),
            }),
        );
        source.run(update_mutation(report.clone())).await.unwrap();

        let updated = store.get_node(&report.id).unwrap();
        assert_eq!(
            updated.data.narrative.as_deref(),
            Some("A fire alarm spread across campus.")
        );
        assert_eq!(updated.data.confidence, Some(0.8));
        let metadata = store.get_case_metadata("C1");
        assert!(metadata.contains_key("summary"));
        assert!(metadata.contains_key("last_synthesized_at"));
    }

    #[tokio::test]
    async fn test_confidence_clamped() {
        let store = Arc::new(GraphStore::new());
        let report = claimed_report(&store);
        let source = CaseSynthesizerSource::new(
            store.clone(),
            Arc::new(ScriptedCompletion {
                value: json!({"narrative": "n", "confidence": 7.5}),
            }),
        );
        source.run(update_mutation(report.clone())).await.unwrap();
        assert_eq!(store.get_node(&report.id).unwrap().data.confidence, Some(1.0));
    }

    #[tokio::test]
    async fn test_null_completion_skips_mutation() {
        let store = Arc::new(GraphStore::new());
        let report = claimed_report(&store);
        let source = CaseSynthesizerSource::new(store.clone(), Arc::new(NoopCompletion));
        source.run(update_mutation(report.clone())).await.unwrap();
        assert!(store.get_node(&report.id).unwrap().data.narrative.is_none());
        assert!(store.get_case_metadata("C1").is_empty());
    }

    #[tokio::test]
    async fn test_condition_requires_claims() {
        let store = Arc::new(GraphStore::new());
        let source = CaseSynthesizerSource::new(store.clone(), Arc::new(NoopCompletion));
        let bare = store
            .add_node(NodeKind::Report, "C1", NodeData::default(), None)
            .unwrap();
        assert!(!source.condition(&update_mutation(bare)));
        let claimed = claimed_report(&store);
        assert!(source.condition(&update_mutation(claimed)));
    }
}
