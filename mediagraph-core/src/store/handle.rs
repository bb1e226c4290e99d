use std::sync::Arc;

use tokio::sync::{broadcast, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{GraphEvent, GraphStore, NodePatch};
use crate::errors::GraphResult;
use crate::model::{Edge, InputHandle, Node};

/// Cloneable, shared access to the active project's [`GraphStore`].
///
/// Each method takes the write guard once, so a mutation and the
/// consistency sweep it triggers are observed as one step.
#[derive(Clone)]
pub struct GraphHandle {
    inner: Arc<RwLock<GraphStore>>,
    events: broadcast::Sender<GraphEvent>,
}

impl Default for GraphHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphHandle {
    pub fn new() -> Self {
        Self::from_store(GraphStore::new())
    }

    pub fn from_store(store: GraphStore) -> Self {
        let events = store.event_sender();
        Self {
            inner: Arc::new(RwLock::new(store)),
            events,
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, GraphStore> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, GraphStore> {
        self.inner.write().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    pub async fn node(&self, id: &str) -> Option<Node> {
        self.inner.read().await.node(id).cloned()
    }

    pub async fn nodes(&self) -> Vec<Node> {
        self.inner.read().await.nodes().cloned().collect()
    }

    pub async fn edges(&self) -> Vec<Edge> {
        self.inner.read().await.edges().to_vec()
    }

    pub async fn add_node(&self, node: Node) -> GraphResult<()> {
        self.inner.write().await.add_node(node)
    }

    pub async fn update_node(&self, id: &str, patch: NodePatch) -> GraphResult<Node> {
        self.inner.write().await.update_node(id, patch).cloned()
    }

    pub async fn delete_node(&self, id: &str) -> GraphResult<Node> {
        self.inner.write().await.delete_node(id)
    }

    pub async fn add_or_replace_edge(&self, edge: Edge) -> GraphResult<()> {
        self.inner.write().await.add_or_replace_edge(edge)
    }

    pub async fn delete_edges_touching(&self, node_id: &str) -> Vec<Edge> {
        self.inner.write().await.delete_edges_touching(node_id)
    }

    pub async fn delete_edge(&self, edge_id: &str) -> GraphResult<Edge> {
        self.inner.write().await.delete_edge(edge_id)
    }

    pub async fn connect(&self, source: &str, target: &str, handle: InputHandle) -> GraphResult<Edge> {
        self.inner.write().await.connect(source, target, handle)
    }
}
