use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::MediagraphConfig;
use crate::generation::{
    CredentialProvider, GenerationOrchestrator, GenerationProvider, HttpGenerationProvider,
    JobHandle, StaticCredentials,
};
use crate::menu::ConnectionController;
use crate::persistence::{
    BackupStore, FileBackupStore, FileSnapshotStorage, PersistenceService, SnapshotStorage,
};
use crate::reconcile::ReconcileService;
use crate::store::GraphHandle;

mod graph_operations;
mod project_operations;

/// Wires the graph store, orchestrator, persistence and reconciliation
/// together for one active project at a time.
#[derive(Clone)]
pub struct AppContext {
    config: Arc<MediagraphConfig>,
    graph: GraphHandle,
    orchestrator: GenerationOrchestrator,
    persistence: Arc<PersistenceService>,
    reconcile: ReconcileService,
    active: Arc<RwLock<Option<ActiveProject>>>,
    autosave: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AppContext {
    /// Build a context backed by the HTTP provider and file storage under
    /// the configured data directory.
    pub fn from_config(config: MediagraphConfig) -> Result<Self> {
        let provider = Arc::new(HttpGenerationProvider::from_config(&config.provider)?);
        let credentials = Arc::new(StaticCredentials::new(config.provider.api_key.clone()));
        let data_dir = config.persistence.data_dir.clone();
        let storage = Arc::new(FileSnapshotStorage::new(&data_dir));
        let backup = Arc::new(FileBackupStore::new(&data_dir));

        Ok(Self::new(config, provider, credentials, storage, backup))
    }

    /// Must be called from within a tokio runtime.
    pub fn new(
        config: MediagraphConfig,
        provider: Arc<dyn GenerationProvider>,
        credentials: Arc<dyn CredentialProvider>,
        storage: Arc<dyn SnapshotStorage>,
        backup: Arc<dyn BackupStore>,
    ) -> Self {
        let graph = GraphHandle::new();
        let orchestrator = GenerationOrchestrator::new(
            graph.clone(),
            provider.clone(),
            credentials,
            config.poll.clone(),
        );
        let persistence = Arc::new(PersistenceService::new(
            storage,
            backup,
            &config.persistence,
        ));
        let reconcile = ReconcileService::new(provider, config.reconcile.clone());

        Self {
            config: Arc::new(config),
            graph,
            orchestrator,
            persistence,
            reconcile,
            active: Arc::new(RwLock::new(None)),
            autosave: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &MediagraphConfig {
        &self.config
    }

    pub fn graph(&self) -> &GraphHandle {
        &self.graph
    }

    pub fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.orchestrator
    }

    pub fn persistence(&self) -> &Arc<PersistenceService> {
        &self.persistence
    }

    pub fn reconcile_service(&self) -> &ReconcileService {
        &self.reconcile
    }

    /// A fresh connection menu bound to this context's graph.
    pub fn connection_controller(&self) -> ConnectionController {
        ConnectionController::new(self.graph.clone(), self.orchestrator.clone())
    }

    pub async fn active_project(&self) -> Option<ActiveProject> {
        self.active.read().await.clone()
    }
}

// ----- Public types -----

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProject {
    pub id: String,
    pub title: String,
}

/// Result of opening a project.
#[derive(Debug)]
pub struct ProjectLoad {
    pub project: ActiveProject,
    /// False when no snapshot existed and the graph starts empty
    pub restored: bool,
    pub node_count: usize,
    /// Polling tasks picked up for nodes that were generating at save time
    pub resumed_jobs: Vec<JobHandle>,
    /// Background URL refresh, when an external project id is configured
    pub reconcile: Option<JoinHandle<()>>,
}
