use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::storage::sanitize_key;
use crate::errors::{PersistenceError, PersistenceResult};

/// Synchronous key/value store used for last-chance backups at teardown,
/// when there is no time to wait on async storage.
pub trait BackupStore: Send + Sync {
    fn write(&self, key: &str, value: &str) -> PersistenceResult<()>;
    fn read(&self, key: &str) -> PersistenceResult<Option<String>>;
}

pub fn backup_key(project_id: &str) -> String {
    format!("{}:emergency-backup", project_id)
}

#[derive(Clone, Debug)]
pub struct FileBackupStore {
    root: PathBuf,
}

impl FileBackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join("backups").join(sanitize_key(key))
    }
}

impl BackupStore for FileBackupStore {
    fn write(&self, key: &str, value: &str) -> PersistenceResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| PersistenceError::Backup(err.to_string()))?;
        }
        std::fs::write(&path, value).map_err(|err| PersistenceError::Backup(err.to_string()))
    }

    fn read(&self, key: &str) -> PersistenceResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryBackupStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BackupStore for MemoryBackupStore {
    fn write(&self, key: &str, value: &str) -> PersistenceResult<()> {
        self.entries
            .lock()
            .map_err(|_| PersistenceError::Backup("backup store lock poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> PersistenceResult<Option<String>> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| PersistenceError::Backup("backup store lock poisoned".to_string()))?
            .get(key)
            .cloned())
    }
}
