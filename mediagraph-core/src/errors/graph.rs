//! Graph store error types

use thiserror::Error;

/// Errors raised by graph store mutations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node not found by identifier
    #[error("Node '{0}' not found")]
    NodeNotFound(String),

    /// Node already exists
    #[error("Node '{0}' already exists")]
    NodeAlreadyExists(String),

    /// Edge not found by identifier
    #[error("Edge '{0}' not found")]
    EdgeNotFound(String),

    /// Edge refers to missing nodes or an unsupported input
    #[error("Invalid edge {from} -> {to}: {reason}")]
    InvalidEdge {
        /// Source node identifier
        from: String,
        /// Target node identifier
        to: String,
        reason: String,
    },

    /// Patch or node content failed validation
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl GraphError {
    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::NodeNotFound(_) | GraphError::EdgeNotFound(_))
    }

    /// Check if the caller supplied bad input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GraphError::NodeAlreadyExists(_)
                | GraphError::InvalidEdge { .. }
                | GraphError::Validation(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GraphError::NodeNotFound(_) | GraphError::EdgeNotFound(_) => "NOT_FOUND",
            GraphError::NodeAlreadyExists(_) => "CONFLICT",
            GraphError::InvalidEdge { .. } | GraphError::Validation(_) => "VALIDATION_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_not_found() {
        let err = GraphError::NodeNotFound("video-1".to_string());
        assert_eq!(err.to_string(), "Node 'video-1' not found");
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn test_invalid_edge() {
        let err = GraphError::InvalidEdge {
            from: "a".to_string(),
            to: "b".to_string(),
            reason: "unsupported input".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid edge a -> b: unsupported input");
        assert!(err.is_client_error());
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn test_conflict() {
        let err = GraphError::NodeAlreadyExists("n".to_string());
        assert_eq!(err.error_code(), "CONFLICT");
        assert!(!err.is_not_found());
    }
}
