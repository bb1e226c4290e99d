//! Reconciliation error types

use thiserror::Error;

use super::GenerationError;

/// Errors raised while refreshing stale media URLs
#[derive(Error, Debug, Clone)]
pub enum ReconcileError {
    /// Provider listing or lookup failed
    #[error("Provider listing failed: {0}")]
    Provider(#[from] GenerationError),

    /// No external project id is known for the active project
    #[error("No external project id configured")]
    MissingProject,
}
