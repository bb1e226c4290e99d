use anyhow::{anyhow, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::{ActiveProject, AppContext, ProjectLoad};
use crate::persistence::{Snapshot, TeardownOutcome};

impl AppContext {
    // ----- Project lifecycle -----------------------------------------------

    /// Make `project_id` the active project.
    ///
    /// The previous project is torn down first. Its graph is discarded and
    /// replaced by the stored snapshot, or cleared when none exists.
    pub async fn open_project(&self, project_id: &str) -> Result<ProjectLoad> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(anyhow!("Project id must not be empty"));
        }

        if let Err(err) = self.close_project().await {
            warn!("Previous project could not be saved: {}", err);
        }

        self.persistence.begin_project(project_id).await;
        let loaded = match self.persistence.load(project_id).await {
            Ok(loaded) => loaded,
            Err(err) => {
                // The gate stays closed, so nothing can overwrite the stored copy
                self.graph.write().await.clear();
                *self.active.write().await = None;
                return Err(anyhow!("Failed to load project {}: {}", project_id, err));
            }
        };

        self.orchestrator.reset().await;

        let (restored, title) = {
            let mut store = self.graph.write().await;
            match loaded {
                Some(snapshot) => {
                    let title = snapshot.project_title.clone();
                    store.replace_all(snapshot.elements, snapshot.edges);
                    (true, title)
                }
                None => {
                    store.clear();
                    (false, String::new())
                }
            }
        };

        let project = ActiveProject {
            id: project_id.to_string(),
            title: if title.is_empty() {
                project_id.to_string()
            } else {
                title
            },
        };
        *self.active.write().await = Some(project.clone());
        self.start_autosave(project.clone()).await;

        let node_count = self.graph.read().await.len();
        info!(
            project_id = %project.id,
            restored,
            nodes = node_count,
            "Opened project"
        );

        let resumed_jobs = self.orchestrator.resume_interrupted().await;
        let reconcile = self.spawn_background_reconcile();

        Ok(ProjectLoad {
            project,
            restored,
            node_count,
            resumed_jobs,
            reconcile,
        })
    }

    /// Save the active project immediately, bypassing the debounce.
    pub async fn save_project(&self) -> Result<()> {
        let project = self
            .active_project()
            .await
            .ok_or_else(|| anyhow!("No project is open"))?;
        let snapshot = self.snapshot(&project).await;
        self.persistence
            .save_now(&project.id, snapshot)
            .await
            .map_err(|e| anyhow!("Failed to save project {}: {}", project.id, e))
    }

    /// Final save for the active project, falling back to the emergency
    /// backup when storage is unavailable. Returns `None` when no project
    /// was open.
    pub async fn close_project(&self) -> Result<Option<TeardownOutcome>> {
        self.stop_autosave().await;

        let Some(project) = self.active.write().await.take() else {
            return Ok(None);
        };
        let snapshot = self.snapshot(&project).await;

        let outcome = self
            .persistence
            .teardown(&project.id, snapshot)
            .await
            .map_err(|e| anyhow!("Failed to close project {}: {}", project.id, e))?;
        match &outcome {
            TeardownOutcome::Saved => info!(project_id = %project.id, "Closed project"),
            TeardownOutcome::BackedUp(err) => warn!(
                project_id = %project.id,
                "Closed project with emergency backup after save failure: {}",
                err
            ),
        }
        Ok(Some(outcome))
    }

    /// The emergency backup written by a failed teardown, if any.
    pub fn read_backup(&self, project_id: &str) -> Result<Option<Snapshot>> {
        self.persistence
            .read_backup(project_id)
            .map_err(|e| anyhow!("Failed to read backup for {}: {}", project_id, e))
    }

    async fn snapshot(&self, project: &ActiveProject) -> Snapshot {
        let mut store = self.graph.write().await;
        let snapshot = Snapshot::from_store(&store, project.title.clone());
        store.mark_clean();
        snapshot
    }

    // ----- Autosave ---------------------------------------------------------

    /// Debounced save after every graph change of the active project.
    async fn start_autosave(&self, project: ActiveProject) {
        let mut events = self.graph.subscribe();
        let graph = self.graph.clone();
        let persistence = self.persistence.clone();

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
                // Collapse a burst of events into one snapshot
                while events.try_recv().is_ok() {}

                let snapshot = {
                    let mut store = graph.write().await;
                    if !store.is_dirty() {
                        continue;
                    }
                    store.mark_clean();
                    Snapshot::from_store(&store, project.title.clone())
                };
                persistence.schedule_save(&project.id, snapshot).await;
            }
            debug!(project_id = %project.id, "Autosave stopped");
        });

        if let Some(previous) = self.autosave.lock().await.replace(task) {
            previous.abort();
        }
    }

    async fn stop_autosave(&self) {
        if let Some(task) = self.autosave.lock().await.take() {
            task.abort();
        }
    }
}
