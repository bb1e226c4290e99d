use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppContext;
use crate::generation::{GenerationKind, GenerationParams, JobHandle};
use crate::model::{Edge, InputHandle, Node, Position};
use crate::store::NodePatch;

/// Horizontal gap between auto-placed nodes
const LAYOUT_GAP: f64 = 40.0;

impl AppContext {
    // ----- Graph helpers ----------------------------------------------------

    pub async fn add_node(&self, node: Node) -> Result<()> {
        let id = node.id.clone();
        self.graph
            .add_node(node)
            .await
            .map_err(|e| anyhow!("Failed to add node {}: {}", id, e))
    }

    /// Add a text node to the right of everything on the canvas.
    pub async fn add_text(&self, content: &str) -> Result<Node> {
        let node = Node::text(
            format!("text-{}", Uuid::new_v4()),
            self.next_free_position().await,
            content,
        );
        self.add_node(node.clone()).await?;
        Ok(node)
    }

    pub async fn update_node(&self, id: &str, patch: NodePatch) -> Result<Node> {
        self.graph
            .update_node(id, patch)
            .await
            .map_err(|e| anyhow!("Failed to update node {}: {}", id, e))
    }

    /// Delete a node. Any job still running for it stops at its next check.
    pub async fn delete_node(&self, id: &str) -> Result<Node> {
        let removed = self
            .graph
            .delete_node(id)
            .await
            .map_err(|e| anyhow!("Failed to delete node {}: {}", id, e))?;
        self.orchestrator.forget(id).await;
        Ok(removed)
    }

    pub async fn connect(&self, source: &str, target: &str, handle: InputHandle) -> Result<Edge> {
        self.graph
            .connect(source, target, handle)
            .await
            .map_err(|e| anyhow!("Failed to connect {} -> {}: {}", source, target, e))
    }

    // ----- Generation helpers -----------------------------------------------

    /// Run a generation into an existing node.
    pub async fn generate(
        &self,
        kind: GenerationKind,
        target_node_id: &str,
        params: GenerationParams,
    ) -> Result<JobHandle> {
        Ok(self.orchestrator.submit(kind, target_node_id, params).await?)
    }

    /// Create a placeholder of the right kind and generate into it.
    pub async fn generate_new(
        &self,
        kind: GenerationKind,
        params: GenerationParams,
    ) -> Result<JobHandle> {
        let node_kind = kind.node_kind();
        let node = Node::placeholder(
            node_kind,
            format!("{}-{}", node_kind, Uuid::new_v4()),
            self.next_free_position().await,
        );
        let node_id = node.id.clone();
        self.add_node(node).await?;
        debug!(node_id = %node_id, kind = %kind, "Created placeholder for generation");

        self.generate(kind, &node_id, params).await
    }

    // ----- Reconciliation ---------------------------------------------------

    /// Refresh stale media URLs now. Returns how many nodes changed.
    pub async fn reconcile_now(&self) -> Result<usize> {
        let external_project_id = self
            .config
            .provider
            .external_project_id
            .clone()
            .ok_or_else(|| anyhow!("No external project id configured"))?;
        run_reconcile(self, &external_project_id).await
    }

    /// Start a reconciliation pass in the background. Does nothing when no
    /// external project id is configured.
    pub(super) fn spawn_background_reconcile(&self) -> Option<tokio::task::JoinHandle<()>> {
        let Some(external_project_id) = self.config.provider.external_project_id.clone() else {
            debug!("Skipping reconciliation: no external project id");
            return None;
        };

        let context = self.clone();
        Some(tokio::spawn(async move {
            if let Err(err) = run_reconcile(&context, &external_project_id).await {
                warn!("Background reconciliation failed: {}", err);
            }
        }))
    }

    async fn next_free_position(&self) -> Position {
        let store = self.graph.read().await;
        let right_edge = store
            .nodes()
            .map(|node| node.position.x + node.size.width)
            .fold(None, |max: Option<f64>, x| Some(max.map_or(x, |m| m.max(x))));
        match right_edge {
            Some(x) => Position::new(x + LAYOUT_GAP, 0.0),
            None => Position::default(),
        }
    }
}

async fn run_reconcile(context: &AppContext, external_project_id: &str) -> Result<usize> {
    let credentials = context
        .orchestrator
        .credential_provider()
        .credentials()
        .await?;
    let nodes = context.graph.nodes().await;

    let updates = context
        .reconcile
        .reconcile(&nodes, external_project_id, &credentials)
        .await?;
    let applied = context.reconcile.apply_updates(&context.graph, &updates).await;

    info!(applied, "Refreshed media URLs");
    Ok(applied)
}
