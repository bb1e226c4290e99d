//! Project snapshot persistence: debounced saves, the first-load gate and
//! the emergency backup used at teardown.

mod backup;
mod service;
mod snapshot;
mod storage;
mod writer;

pub use backup::{backup_key, BackupStore, FileBackupStore, MemoryBackupStore};
pub use service::{PersistenceService, TeardownOutcome};
pub use snapshot::Snapshot;
pub use storage::{FileSnapshotStorage, MemorySnapshotStorage, SnapshotStorage};
