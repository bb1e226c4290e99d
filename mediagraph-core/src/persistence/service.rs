use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::backup::{backup_key, BackupStore};
use super::snapshot::Snapshot;
use super::storage::SnapshotStorage;
use super::writer::{SnapshotWriter, WriterHandle};
use crate::config::PersistenceConfig;
use crate::errors::{PersistenceError, PersistenceResult};

/// How a teardown save ended.
#[derive(Debug)]
pub enum TeardownOutcome {
    Saved,
    /// Storage failed; the snapshot went to the emergency backup instead
    BackedUp(PersistenceError),
}

/// Loads and saves project snapshots.
///
/// Saves for a project are refused until its first load has finished, so an
/// empty graph that has not been restored yet can never overwrite a stored
/// snapshot.
pub struct PersistenceService {
    storage: Arc<dyn SnapshotStorage>,
    backup: Arc<dyn BackupStore>,
    writer: WriterHandle,
    loaded: RwLock<HashSet<String>>,
}

impl PersistenceService {
    /// Must be called from within a tokio runtime; the debounced writer runs
    /// as a background task.
    pub fn new(
        storage: Arc<dyn SnapshotStorage>,
        backup: Arc<dyn BackupStore>,
        config: &PersistenceConfig,
    ) -> Self {
        let writer = SnapshotWriter::spawn(storage.clone(), config.debounce);
        Self {
            storage,
            backup,
            writer,
            loaded: RwLock::new(HashSet::new()),
        }
    }

    /// Close the save gate for `project_id` until its load completes.
    pub async fn begin_project(&self, project_id: &str) {
        self.loaded.write().await.remove(project_id);
    }

    pub async fn mark_loaded(&self, project_id: &str) {
        self.loaded.write().await.insert(project_id.to_string());
    }

    pub async fn is_loaded(&self, project_id: &str) -> bool {
        self.loaded.read().await.contains(project_id)
    }

    /// Read the stored snapshot. A successful read, even one that finds
    /// nothing, opens the save gate.
    pub async fn load(&self, project_id: &str) -> PersistenceResult<Option<Snapshot>> {
        let snapshot = self.storage.read(project_id).await?;
        match &snapshot {
            Some(snapshot) => info!(
                project_id = %project_id,
                nodes = snapshot.elements.len(),
                edges = snapshot.edges.len(),
                "Loaded project snapshot"
            ),
            None => info!(project_id = %project_id, "No snapshot stored for project"),
        }
        self.mark_loaded(project_id).await;
        Ok(snapshot)
    }

    /// Queue a debounced save. Returns false when the save was dropped
    /// because the project has not finished loading.
    pub async fn schedule_save(&self, project_id: &str, snapshot: Snapshot) -> bool {
        if !self.is_loaded(project_id).await {
            debug!(project_id = %project_id, "Dropping save requested before first load");
            return false;
        }
        if !self.writer.schedule(project_id.to_string(), snapshot) {
            warn!(project_id = %project_id, "Snapshot writer is not running");
            return false;
        }
        true
    }

    pub async fn save_now(&self, project_id: &str, snapshot: Snapshot) -> PersistenceResult<()> {
        if !self.is_loaded(project_id).await {
            return Err(PersistenceError::NotLoaded(project_id.to_string()));
        }

        match self
            .writer
            .save_now(project_id.to_string(), snapshot.clone())
            .await
        {
            Some(result) => result,
            None => self.storage.write(project_id, &snapshot).await,
        }
    }

    /// Write all pending debounced saves now.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    /// Final save for a project that is being closed. When storage fails
    /// the snapshot is written synchronously to the backup store.
    pub async fn teardown(
        &self,
        project_id: &str,
        snapshot: Snapshot,
    ) -> PersistenceResult<TeardownOutcome> {
        let json = snapshot.to_json()?;
        let err = match self.save_now(project_id, snapshot).await {
            Ok(()) => {
                debug!(project_id = %project_id, "Saved project on teardown");
                return Ok(TeardownOutcome::Saved);
            }
            Err(PersistenceError::NotLoaded(id)) => {
                // Nothing was restored, so there is nothing of ours to keep
                debug!(project_id = %id, "Skipping teardown save for unloaded project");
                return Err(PersistenceError::NotLoaded(id));
            }
            Err(err) => err,
        };

        warn!(project_id = %project_id, "Teardown save failed, writing emergency backup: {}", err);
        match self.backup.write(&backup_key(project_id), &json) {
            Ok(()) => Ok(TeardownOutcome::BackedUp(err)),
            Err(backup_err) => {
                error!(project_id = %project_id, "Emergency backup failed: {}", backup_err);
                Err(backup_err)
            }
        }
    }

    /// The emergency backup for a project, if one was ever written. Never
    /// consulted by [`PersistenceService::load`].
    pub fn read_backup(&self, project_id: &str) -> PersistenceResult<Option<Snapshot>> {
        self.backup
            .read(&backup_key(project_id))?
            .map(|json| Snapshot::from_json(&json))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Position};
    use crate::persistence::{MemoryBackupStore, MemorySnapshotStorage};
    use std::time::Duration;

    fn service(storage: &MemorySnapshotStorage, backup: &MemoryBackupStore) -> PersistenceService {
        PersistenceService::new(
            Arc::new(storage.clone()),
            Arc::new(backup.clone()),
            &PersistenceConfig {
                debounce: Duration::from_millis(2000),
                ..PersistenceConfig::default()
            },
        )
    }

    fn snapshot(nodes: usize) -> Snapshot {
        let elements = (0..nodes)
            .map(|i| Node::text(format!("t{}", i), Position::new(i as f64, 0.0), "x"))
            .collect();
        Snapshot::new("Test", elements, Vec::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_before_first_load_is_dropped() {
        let storage = MemorySnapshotStorage::new();
        let backup = MemoryBackupStore::new();
        let service = service(&storage, &backup);

        service.begin_project("p").await;
        assert!(!service.schedule_save("p", snapshot(1)).await);
        assert!(matches!(
            service.save_now("p", snapshot(1)).await,
            Err(PersistenceError::NotLoaded(_))
        ));

        assert!(service.load("p").await.unwrap().is_none());
        assert!(service.schedule_save("p", snapshot(1)).await);
        service.flush().await;
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_edits() {
        let storage = MemorySnapshotStorage::new();
        let backup = MemoryBackupStore::new();
        let service = service(&storage, &backup);
        service.load("p").await.unwrap();

        for nodes in 1..=5 {
            service.schedule_save("p", snapshot(nodes)).await;
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        assert_eq!(storage.write_count(), 0);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(storage.write_count(), 1);
        let stored = storage.read("p").await.unwrap().unwrap();
        assert_eq!(stored.elements.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_falls_back_to_backup() {
        let storage = MemorySnapshotStorage::new();
        let backup = MemoryBackupStore::new();
        let service = service(&storage, &backup);
        service.load("p").await.unwrap();
        storage.set_fail_writes(true);

        let outcome = service.teardown("p", snapshot(3)).await.unwrap();
        assert!(matches!(outcome, TeardownOutcome::BackedUp(_)));

        let restored = service.read_backup("p").unwrap().unwrap();
        assert_eq!(restored.elements.len(), 3);
        // The backup is never read back automatically
        assert!(service.load("p").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_debounced_write_is_retried() {
        let storage = MemorySnapshotStorage::new();
        let backup = MemoryBackupStore::new();
        let service = service(&storage, &backup);
        service.load("p").await.unwrap();
        storage.set_fail_writes(true);

        service.schedule_save("p", snapshot(2)).await;
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(storage.write_count(), 0);

        storage.set_fail_writes(false);
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(storage.write_count(), 1);
        assert_eq!(storage.read("p").await.unwrap().unwrap().elements.len(), 2);
    }
}
