use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::snapshot::Snapshot;
use super::storage::SnapshotStorage;
use crate::errors::PersistenceResult;

pub(crate) enum WriterCommand {
    /// Debounced save; replaces any pending save for the same project
    Schedule {
        project_id: String,
        snapshot: Snapshot,
    },
    /// Immediate save; the pending save for the project is dropped
    SaveNow {
        project_id: String,
        snapshot: Snapshot,
        response: oneshot::Sender<PersistenceResult<()>>,
    },
    /// Write everything pending now
    Flush { response: oneshot::Sender<()> },
}

/// Single task that owns all snapshot writes, so writes never overlap and
/// an edit arriving mid-write only re-arms the timer.
pub(crate) struct SnapshotWriter {
    storage: Arc<dyn SnapshotStorage>,
    debounce: Duration,
    pending: HashMap<String, Snapshot>,
    deadline: Option<Instant>,
    command_rx: mpsc::UnboundedReceiver<WriterCommand>,
}

#[derive(Clone)]
pub(crate) struct WriterHandle {
    command_tx: mpsc::UnboundedSender<WriterCommand>,
}

impl SnapshotWriter {
    pub(crate) fn spawn(storage: Arc<dyn SnapshotStorage>, debounce: Duration) -> WriterHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Self {
            storage,
            debounce,
            pending: HashMap::new(),
            deadline: None,
            command_rx: rx,
        };

        tokio::spawn(async move {
            writer.run().await;
        });

        WriterHandle { command_tx: tx }
    }

    async fn run(mut self) {
        debug!(debounce_ms = self.debounce.as_millis() as u64, "Snapshot writer started");

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(WriterCommand::Schedule { project_id, snapshot }) => {
                        self.pending.insert(project_id, snapshot);
                        self.deadline = Some(Instant::now() + self.debounce);
                    }
                    Some(WriterCommand::SaveNow { project_id, snapshot, response }) => {
                        self.pending.remove(&project_id);
                        let result = self.storage.write(&project_id, &snapshot).await;
                        let _ = response.send(result);
                    }
                    Some(WriterCommand::Flush { response }) => {
                        self.write_pending().await;
                        let _ = response.send(());
                    }
                    None => {
                        self.write_pending().await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.write_pending().await;
                }
            }
        }

        info!("Snapshot writer stopped");
    }

    /// Write every pending snapshot. A snapshot whose write fails stays
    /// queued and is retried after another debounce period.
    async fn write_pending(&mut self) {
        self.deadline = None;
        let mut failed = Vec::new();
        for (project_id, snapshot) in std::mem::take(&mut self.pending) {
            match self.storage.write(&project_id, &snapshot).await {
                Ok(()) => debug!(
                    project_id = %project_id,
                    nodes = snapshot.elements.len(),
                    "Saved snapshot"
                ),
                Err(err) => {
                    warn!(project_id = %project_id, "Debounced save failed, will retry: {}", err);
                    failed.push((project_id, snapshot));
                }
            }
        }

        if !failed.is_empty() {
            for (project_id, snapshot) in failed {
                self.pending.entry(project_id).or_insert(snapshot);
            }
            self.deadline = Some(Instant::now() + self.debounce);
        }
    }
}

impl WriterHandle {
    pub(crate) fn schedule(&self, project_id: String, snapshot: Snapshot) -> bool {
        self.command_tx
            .send(WriterCommand::Schedule {
                project_id,
                snapshot,
            })
            .is_ok()
    }

    /// `None` when the writer task is gone.
    pub(crate) async fn save_now(
        &self,
        project_id: String,
        snapshot: Snapshot,
    ) -> Option<PersistenceResult<()>> {
        let (response, rx) = oneshot::channel();
        self.command_tx
            .send(WriterCommand::SaveNow {
                project_id,
                snapshot,
                response,
            })
            .ok()?;
        rx.await.ok()
    }

    pub(crate) async fn flush(&self) {
        let (response, rx) = oneshot::channel();
        if self.command_tx.send(WriterCommand::Flush { response }).is_ok() {
            let _ = rx.await;
        }
    }
}
