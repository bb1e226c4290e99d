use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::snapshot::Snapshot;
use crate::errors::{PersistenceError, PersistenceResult};

/// Asynchronous key/value storage for project snapshots.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    async fn read(&self, project_id: &str) -> PersistenceResult<Option<Snapshot>>;
    async fn write(&self, project_id: &str, snapshot: &Snapshot) -> PersistenceResult<()>;
}

/// One JSON document per project under a data directory.
#[derive(Clone, Debug)]
pub struct FileSnapshotStorage {
    root: PathBuf,
}

impl FileSnapshotStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, project_id: &str) -> PathBuf {
        self.root
            .join("projects")
            .join(format!("{}.json", sanitize_key(project_id)))
    }
}

/// Keep project keys usable as file names.
pub(crate) fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl SnapshotStorage for FileSnapshotStorage {
    async fn read(&self, project_id: &str) -> PersistenceResult<Option<Snapshot>> {
        let path = self.path_for(project_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(Snapshot::from_json(&contents)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, project_id: &str, snapshot: &Snapshot) -> PersistenceResult<()> {
        let path = self.path_for(project_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never see a partial document
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, snapshot.to_json()?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(project_id = %project_id, path = %path.display(), "Wrote snapshot");
        Ok(())
    }
}

/// In-process storage, used by tests and ephemeral sessions.
#[derive(Clone, Debug, Default)]
pub struct MemorySnapshotStorage {
    documents: Arc<RwLock<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemorySnapshotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise failure paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, project_id: &str) -> bool {
        self.documents.read().await.contains_key(project_id)
    }
}

#[async_trait]
impl SnapshotStorage for MemorySnapshotStorage {
    async fn read(&self, project_id: &str) -> PersistenceResult<Option<Snapshot>> {
        match self.documents.read().await.get(project_id) {
            Some(json) => Ok(Some(Snapshot::from_json(json)?)),
            None => Ok(None),
        }
    }

    async fn write(&self, project_id: &str, snapshot: &Snapshot) -> PersistenceResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Storage(
                "storage is unavailable".to_string(),
            ));
        }
        self.documents
            .write()
            .await
            .insert(project_id.to_string(), snapshot.to_json()?);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Position};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(dir.path());
        assert!(storage.read("proj/a").await.unwrap().is_none());

        let snapshot = Snapshot::new(
            "A",
            vec![Node::text("t", Position::new(1.5, 2.5), "hi")],
            Vec::new(),
        );
        storage.write("proj/a", &snapshot).await.unwrap();
        assert_eq!(storage.read("proj/a").await.unwrap(), Some(snapshot));
        assert!(dir.path().join("projects").join("proj_a.json").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(dir.path());
        std::fs::create_dir_all(dir.path().join("projects")).unwrap();
        std::fs::write(dir.path().join("projects").join("p.json"), "{not json").unwrap();

        let err = storage.read("p").await.unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[tokio::test]
    async fn test_memory_storage_failure_switch() {
        let storage = MemorySnapshotStorage::new();
        let snapshot = Snapshot::new("A", Vec::new(), Vec::new());
        storage.set_fail_writes(true);
        assert_err!(storage.write("p", &snapshot).await);
        storage.set_fail_writes(false);
        assert_ok!(storage.write("p", &snapshot).await);
        assert!(storage.contains("p").await);
        assert_eq!(storage.write_count(), 1);
    }
}
