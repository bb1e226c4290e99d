//! Domain-specific error types for mediagraph-core
//!
//! Each component owns a structured error enum so callers can branch on the
//! category of a failure instead of parsing messages.
//!
//! # Error Categories
//!
//! - **GraphError**: node and edge mutations on the graph store
//! - **GenerationError**: provider submit/poll failures and parameter validation
//! - **PersistenceError**: snapshot storage and emergency backup failures
//! - **ReconcileError**: provider listing failures during URL reconciliation
//!
//! # Examples
//!
//! ```rust
//! use mediagraph::errors::{GenerationError, GraphError};
//!
//! let err = GraphError::NodeNotFound("img-1".to_string());
//! assert!(err.is_not_found());
//!
//! let err = GenerationError::RateLimited("too many concurrent jobs".to_string());
//! assert!(!err.is_retryable());
//! assert_eq!(err.error_code(), "RATE_LIMITED");
//! ```

pub mod generation;
pub mod graph;
pub mod persistence;
pub mod reconcile;

pub use generation::GenerationError;
pub use graph::GraphError;
pub use persistence::PersistenceError;
pub use reconcile::ReconcileError;

/// Result type alias for graph store operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for generation operations
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Result type alias for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Result type alias for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_result_alias() {
        let result: GraphResult<()> = Err(GraphError::NodeNotFound("n".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_generation_result_alias() {
        let result: GenerationResult<()> = Err(GenerationError::Validation("x".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_persistence_result_alias() {
        let result: PersistenceResult<()> = Err(PersistenceError::Storage("disk".to_string()));
        assert!(result.is_err());
    }
}
