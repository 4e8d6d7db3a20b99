//! Error types for the wolftrace engine.
//!
//! Mutation-boundary violations (duplicate ids, dangling or cross-case
//! edges) are surfaced to the caller because they indicate a contract
//! violation upstream. Failures inside knowledge-source handlers are
//! recovered locally by the controller and never surface here.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur inside the wolftrace engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node with this id already exists.
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    /// The requested node does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// An edge endpoint refers to a missing node.
    #[error("edge endpoint missing: {0}")]
    EdgeEndpointMissing(String),

    /// Edge endpoints belong to different cases.
    #[error("cross-case edge: {source_id} ({source_case}) -> {target} ({target_case})")]
    CrossCaseEdge {
        /// Source node id.
        source_id: String,
        /// Case of the source node.
        source_case: String,
        /// Target node id.
        target: String,
        /// Case of the target node.
        target_case: String,
    },

    /// Configuration rejected at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failed to serialize/deserialize data.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An external service call failed.
    #[error("service error: {0}")]
    Service(String),

    /// An operation exceeded its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A channel or stream peer went away.
    #[error("closed: {0}")]
    Closed(String),
}

impl CoreError {
    /// True for errors in the `invalid-mutation` class: the mutation was
    /// rejected synchronously and no mutation record was emitted.
    pub fn is_invalid_mutation(&self) -> bool {
        matches!(
            self,
            CoreError::DuplicateNode(_)
                | CoreError::NodeNotFound(_)
                | CoreError::EdgeEndpointMissing(_)
                | CoreError::CrossCaseEdge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_mutation_classification() {
        assert!(CoreError::DuplicateNode("R-1".into()).is_invalid_mutation());
        assert!(CoreError::EdgeEndpointMissing("R-2".into()).is_invalid_mutation());
        assert!(!CoreError::Configuration("bad".into()).is_invalid_mutation());
        assert!(!CoreError::Service("down".into()).is_invalid_mutation());
    }

    #[test]
    fn test_error_display() {
        let err = CoreError::CrossCaseEdge {
            source_id: "R-1".into(),
            source_case: "C1".into(),
            target: "R-2".into(),
            target_case: "C2".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("R-1"));
        assert!(msg.contains("C2"));
    }
}
