//! Persistence error types

use thiserror::Error;

/// Errors raised by snapshot storage and the emergency backup
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Storage engine read or write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Snapshot document could not be encoded or decoded
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Synchronous emergency backup failed
    #[error("Emergency backup failed: {0}")]
    Backup(String),

    /// Save attempted before the project's first load completed
    #[error("Project '{0}' has not finished loading")]
    NotLoaded(String),

    /// Filesystem error from a file-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistenceError {
    pub fn error_code(&self) -> &'static str {
        match self {
            PersistenceError::Storage(_) | PersistenceError::Io(_) => "STORAGE_ERROR",
            PersistenceError::Serialization(_) => "SERIALIZATION_ERROR",
            PersistenceError::Backup(_) => "BACKUP_ERROR",
            PersistenceError::NotLoaded(_) => "NOT_LOADED",
        }
    }
}
