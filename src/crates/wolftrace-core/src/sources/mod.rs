//! The fixed set of knowledge sources the engine registers at startup.
//!
//! | Source | Priority | Triggers on |
//! |---|---|---|
//! | clustering | critical | `node:report`, `edge:repost_of`, `edge:mutation_of` |
//! | forensics | high | `node:report` (with media) |
//! | recluster_debunk | high | `edge:debunked_by` |
//! | network | medium | `node:report` |
//! | forensics_xref | medium | `update:report` (with claims) |
//! | classifier | low | relationship and evidence events |
//! | case_synthesizer | background | `update:report` (with claims) |

mod classifier;
mod clustering;
mod forensics;
mod network;
mod recluster;
mod synthesizer;
mod xref;

pub use classifier::{
    SemanticRoleSource, ROLE_AMPLIFIER, ROLE_MUTATOR, ROLE_ORIGINATOR, ROLE_UNWITTING_SHARER,
};
pub use clustering::{haversine_m, jaccard, score_pair, token_bag, ClusterScore, ClusteringSource};
pub use forensics::{hamming, MediaForensicsSource};
pub use network::NetworkAnalysisSource;
pub use recluster::DebunkReclusterSource;
pub use synthesizer::CaseSynthesizerSource;
pub use xref::ForensicsXrefSource;

use crate::controller::KnowledgeSource;
use crate::graph::GraphStore;
use crate::services::ServiceBundle;
use std::sync::Arc;

/// Build the standard seven sources over `store` and `services`, in
/// registration order.
pub fn default_sources(
    store: Arc<GraphStore>,
    services: &ServiceBundle,
) -> Vec<Arc<dyn KnowledgeSource>> {
    vec![
        Arc::new(ClusteringSource::new(store.clone())),
        Arc::new(MediaForensicsSource::new(
            store.clone(),
            services.media.clone(),
        )),
        Arc::new(DebunkReclusterSource::new(store.clone())),
        Arc::new(NetworkAnalysisSource::new(
            store.clone(),
            services.completion.clone(),
            services.fact_check.clone(),
        )),
        Arc::new(ForensicsXrefSource::new(
            store.clone(),
            services.media.clone(),
        )),
        Arc::new(SemanticRoleSource::new(store.clone())),
        Arc::new(CaseSynthesizerSource::new(
            store,
            services.completion.clone(),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Priority;

    #[test]
    fn test_default_sources_cover_the_contract_table() {
        let store = Arc::new(GraphStore::new());
        let sources = default_sources(store, &ServiceBundle::noop());
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "clustering",
                "forensics",
                "recluster_debunk",
                "network",
                "forensics_xref",
                "classifier",
                "case_synthesizer",
            ]
        );
        let by_name = |n: &str| sources.iter().find(|s| s.name() == n).unwrap();
        assert_eq!(by_name("clustering").priority(), Priority::Critical);
        assert_eq!(by_name("forensics").priority(), Priority::High);
        assert_eq!(by_name("recluster_debunk").priority(), Priority::High);
        assert_eq!(by_name("network").priority(), Priority::Medium);
        assert_eq!(by_name("forensics_xref").priority(), Priority::Medium);
        assert_eq!(by_name("classifier").priority(), Priority::Low);
        assert_eq!(by_name("case_synthesizer").priority(), Priority::Background);
        assert!(by_name("classifier")
            .trigger_event_types()
            .contains(&"node:external_source".to_string()));
    }
}
