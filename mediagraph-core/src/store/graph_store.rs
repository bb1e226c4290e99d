use indexmap::IndexMap;
use tokio::sync::broadcast;
use tracing::debug;

use super::events::GraphEvent;
use super::patch::NodePatch;
use crate::errors::{GraphError, GraphResult};
use crate::model::{
    can_connect, Edge, InputHandle, Node, NodeKind, NodePayload, NodeStatus, VideoNode,
};

const EVENT_BUFFER: usize = 1024;

/// Node table plus edge list for one project.
///
/// Every mutation bumps [`GraphStore::revision`], marks the store dirty and
/// broadcasts a [`GraphEvent`]. Deletion sweeps all references to the removed
/// id so no other code has to tolerate dangling ids.
pub struct GraphStore {
    nodes: IndexMap<String, Node>,
    edges: Vec<Edge>,
    revision: u64,
    dirty: bool,
    events: broadcast::Sender<GraphEvent>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            nodes: IndexMap::new(),
            edges: Vec::new(),
            revision: 0,
            dirty: false,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<GraphEvent> {
        self.events.clone()
    }

    // ----- Reads ------------------------------------------------------------

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Owned copy of the node table and edge list, in insertion order.
    pub fn to_parts(&self) -> (Vec<Node>, Vec<Edge>) {
        (self.nodes.values().cloned().collect(), self.edges.clone())
    }

    // ----- Mutations --------------------------------------------------------

    pub fn add_node(&mut self, mut node: Node) -> GraphResult<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::NodeAlreadyExists(node.id));
        }

        self.prune_missing_references(&mut node);
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        self.touch(GraphEvent::NodeAdded { id });
        Ok(())
    }

    /// Apply `patch` to a copy of the node and store it only if the result
    /// keeps the lifecycle invariants. Replacing an image's `src` resets the
    /// videos built from it.
    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> GraphResult<&Node> {
        let current = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;
        let kind = current.kind();

        let mut next = current.clone();
        let effect = patch.apply(&mut next)?;
        if let Some(from) = next.generated_from.as_mut() {
            from.source_ids
                .retain(|source| source != id && self.nodes.contains_key(source.as_str()));
        }
        check_lifecycle(current, &next)?;

        let status = next.status;
        self.nodes.insert(id.to_string(), next);
        self.touch(GraphEvent::NodeUpdated {
            id: id.to_string(),
            status,
        });

        if effect.src_changed && kind == NodeKind::Image {
            self.invalidate_downstream(id);
        }

        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    /// Apply `patch` only while `job_id` still owns the node.
    ///
    /// Returns `Ok(false)` without touching anything when the node is gone or
    /// has been handed to a different job.
    pub fn update_node_for_job(
        &mut self,
        id: &str,
        job_id: &str,
        patch: NodePatch,
    ) -> GraphResult<bool> {
        match self.nodes.get(id) {
            Some(node) if node.is_owned_by(job_id) => {
                self.update_node(id, patch)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Point a media node at a fresh URL for the asset it already holds.
    ///
    /// The media itself is unchanged, so downstream videos are left alone.
    pub fn refresh_media_urls(
        &mut self,
        id: &str,
        src: Option<&str>,
        thumbnail: Option<&str>,
    ) -> GraphResult<bool> {
        let current = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

        let mut patch = NodePatch::new();
        if let Some(src) = src {
            patch = patch.src(src);
        }
        if let Some(thumbnail) = thumbnail {
            patch = patch.thumbnail(thumbnail);
        }
        if patch.is_empty() {
            return Ok(false);
        }

        let mut next = current.clone();
        patch.apply(&mut next)?;
        check_lifecycle(current, &next)?;

        let status = next.status;
        self.nodes.insert(id.to_string(), next);
        self.touch(GraphEvent::NodeUpdated {
            id: id.to_string(),
            status,
        });
        Ok(true)
    }

    /// Remove a node together with its edges and every reference to it.
    pub fn delete_node(&mut self, id: &str) -> GraphResult<Node> {
        let removed = self
            .nodes
            .shift_remove(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))?;

        self.delete_edges_touching(id);

        let mut swept = Vec::new();
        for node in self.nodes.values_mut() {
            let mut changed = false;
            if let Some(from) = node.generated_from.as_mut() {
                changed |= from.source_ids.remove(id);
            }
            if let Some(video) = node.as_video_mut() {
                if video.clear_slots_referencing(id) {
                    changed = true;
                    // The video was derived from the deleted frame
                    if node.status != NodeStatus::Pending {
                        node.reset_for_regeneration();
                    }
                }
            }
            if changed {
                swept.push((node.id.clone(), node.status));
            }
        }

        self.touch(GraphEvent::NodeRemoved { id: id.to_string() });
        for (id, status) in swept {
            debug!(node_id = %id, removed = %removed.id, "Swept reference to deleted node");
            self.touch(GraphEvent::NodeUpdated { id, status });
        }

        Ok(removed)
    }

    /// Insert `edge`, replacing any edge with the same identity.
    ///
    /// Edges into a named input take the same path as [`GraphStore::connect`],
    /// so the target's slot always agrees with the edge list.
    pub fn add_or_replace_edge(&mut self, edge: Edge) -> GraphResult<()> {
        self.check_endpoints(&edge)?;
        match edge.input_handle() {
            Some(handle) => self.commit_edge(edge, handle).map(|_| ()),
            None => {
                self.upsert_edge(edge);
                Ok(())
            }
        }
    }

    pub fn delete_edges_touching(&mut self, node_id: &str) -> Vec<Edge> {
        let (removed, kept): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|edge| edge.touches(node_id));
        self.edges = kept;
        for edge in &removed {
            self.touch(GraphEvent::EdgeRemoved {
                id: edge.id.clone(),
            });
        }
        removed
    }

    /// Remove one edge. A slot the edge was feeding is emptied.
    pub fn delete_edge(&mut self, edge_id: &str) -> GraphResult<Edge> {
        let index = self
            .edges
            .iter()
            .position(|edge| edge.id == edge_id)
            .ok_or_else(|| GraphError::EdgeNotFound(edge_id.to_string()))?;
        let edge = self.edges.remove(index);
        self.touch(GraphEvent::EdgeRemoved {
            id: edge.id.clone(),
        });

        if let Some(handle) = edge.input_handle().filter(InputHandle::is_slot) {
            let mut cleared = None;
            if let Some(target) = self.nodes.get_mut(&edge.target) {
                if let Some(slot) = target.as_video_mut().and_then(|v| slot_mut(v, handle)) {
                    if slot.as_deref() == Some(edge.source.as_str()) {
                        *slot = None;
                        // The video lost an input it was generated from
                        if target.status != NodeStatus::Pending {
                            target.reset_for_regeneration();
                        }
                        cleared = Some(target.status);
                    }
                }
            }
            if let Some(status) = cleared {
                debug!(node_id = %edge.target, handle = %handle, "Emptied video slot");
                self.touch(GraphEvent::NodeUpdated {
                    id: edge.target.clone(),
                    status,
                });
            }
        }

        Ok(edge)
    }

    /// Commit a structural connection from `source` into `handle` on `target`.
    ///
    /// Slot handles store the source id on the target, and any other edge
    /// occupying the same (target, handle) pair is replaced.
    pub fn connect(&mut self, source: &str, target: &str, handle: InputHandle) -> GraphResult<Edge> {
        let edge = Edge::into_handle(source, target, handle);
        self.check_endpoints(&edge)?;
        self.commit_edge(edge, handle)
    }

    /// Swap in a restored graph wholesale.
    pub fn replace_all(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        self.nodes = nodes
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect();
        let mut kept: Vec<Edge> = Vec::with_capacity(edges.len());
        for mut edge in edges {
            if !self.nodes.contains_key(&edge.source) || !self.nodes.contains_key(&edge.target) {
                continue;
            }
            edge.id = Edge::derive_id(&edge.source, &edge.target, edge.target_handle.as_deref());
            if kept.iter().all(|existing| existing.id != edge.id) {
                kept.push(edge);
            }
        }
        self.edges = kept;
        self.revision += 1;
        // Freshly restored state matches what is on disk
        self.dirty = false;
        let _ = self.events.send(GraphEvent::Replaced);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.revision += 1;
        self.dirty = false;
        let _ = self.events.send(GraphEvent::Cleared);
    }

    // ----- Internals --------------------------------------------------------

    fn check_endpoints(&self, edge: &Edge) -> GraphResult<()> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::InvalidEdge {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    reason: format!("node '{}' does not exist", endpoint),
                });
            }
        }
        if edge.source == edge.target {
            return Err(GraphError::InvalidEdge {
                from: edge.source.clone(),
                to: edge.target.clone(),
                reason: "a node cannot feed itself".to_string(),
            });
        }
        Ok(())
    }

    fn upsert_edge(&mut self, edge: Edge) {
        let id = edge.id.clone();
        match self.edges.iter_mut().find(|existing| existing.id == edge.id) {
            Some(existing) => *existing = edge,
            None => self.edges.push(edge),
        }
        self.touch(GraphEvent::EdgeUpserted { id });
    }

    /// Wire `edge` into `handle` on its target. Any other edge on the same
    /// (target, handle) pair is dropped, and a video whose slot now points at
    /// a different image is reset.
    fn commit_edge(&mut self, edge: Edge, handle: InputHandle) -> GraphResult<Edge> {
        let (source_kind, prompt) = match self.nodes.get(&edge.source) {
            Some(node) => (node.kind(), node.content().map(str::to_string)),
            None => return Err(GraphError::NodeNotFound(edge.source.clone())),
        };
        let target_kind = self
            .nodes
            .get(&edge.target)
            .map(Node::kind)
            .ok_or_else(|| GraphError::NodeNotFound(edge.target.clone()))?;

        if !can_connect(source_kind, target_kind, handle) {
            return Err(GraphError::InvalidEdge {
                from: edge.source.clone(),
                to: edge.target.clone(),
                reason: format!(
                    "{} output cannot feed '{}' on a {} node",
                    source_kind, handle, target_kind
                ),
            });
        }

        let handle_name = handle.as_str();
        let displaced: Vec<String> = self
            .edges
            .iter()
            .filter(|existing| {
                existing.target == edge.target
                    && existing.target_handle.as_deref() == Some(handle_name.as_str())
                    && existing.id != edge.id
            })
            .map(|existing| existing.id.clone())
            .collect();
        for id in displaced {
            self.edges.retain(|existing| existing.id != id);
            self.touch(GraphEvent::EdgeRemoved { id });
        }

        self.upsert_edge(edge.clone());

        let mut updated = None;
        if let Some(target_node) = self.nodes.get_mut(&edge.target) {
            let status = target_node.status;
            let mut rewired = false;
            if let Some(video) = target_node.as_video_mut() {
                if let Some(slot) = slot_mut(video, handle) {
                    let previous = slot.replace(edge.source.clone());
                    rewired = previous.is_some_and(|previous| previous != edge.source);
                    updated = Some(status);
                } else if handle == InputHandle::Prompt {
                    if let Some(prompt) = prompt {
                        video.prompt_text = prompt;
                        updated = Some(status);
                    }
                }
            }
            if rewired && status != NodeStatus::Pending {
                target_node.reset_for_regeneration();
                updated = Some(target_node.status);
            }
        }
        if let Some(status) = updated {
            self.touch(GraphEvent::NodeUpdated {
                id: edge.target.clone(),
                status,
            });
        }

        Ok(edge)
    }

    fn touch(&mut self, event: GraphEvent) {
        self.revision += 1;
        self.dirty = true;
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn prune_missing_references(&self, node: &mut Node) {
        if let Some(from) = node.generated_from.as_mut() {
            from.source_ids
                .retain(|source| self.nodes.contains_key(source));
        }
        if let NodePayload::Video(video) = &mut node.payload {
            for slot in [&mut video.start_image_id, &mut video.end_image_id]
                .into_iter()
                .chain(video.reference_image_ids.iter_mut())
            {
                if slot.as_deref().is_some_and(|id| !self.nodes.contains_key(id)) {
                    *slot = None;
                }
            }
        }
    }

    /// Reset generated videos whose frame or reference image just changed.
    fn invalidate_downstream(&mut self, image_id: &str) {
        let mut reset = Vec::new();
        for node in self.nodes.values_mut() {
            let derived = node
                .as_video()
                .map(|video| video.slots_reference(image_id))
                .unwrap_or(false);
            if derived && node.status != NodeStatus::Pending {
                node.reset_for_regeneration();
                reset.push(node.id.clone());
            }
        }
        for id in reset {
            debug!(node_id = %id, upstream = %image_id, "Invalidated downstream video");
            self.touch(GraphEvent::NodeUpdated {
                id,
                status: NodeStatus::Pending,
            });
        }
    }
}

/// A patch may not introduce a broken lifecycle invariant. A node restored
/// in a broken state can still be edited as long as it gets no worse.
fn check_lifecycle(before: &Node, after: &Node) -> GraphResult<()> {
    match after.invariant_violation() {
        Some(violation) if before.invariant_violation().as_ref() != Some(&violation) => {
            Err(GraphError::Validation(violation))
        }
        _ => Ok(()),
    }
}

fn slot_mut(video: &mut VideoNode, handle: InputHandle) -> Option<&mut Option<String>> {
    match handle {
        InputHandle::StartImage => Some(&mut video.start_image_id),
        InputHandle::EndImage => Some(&mut video.end_image_id),
        InputHandle::Reference(slot) => video.reference_image_ids.get_mut(slot),
        InputHandle::Prompt | InputHandle::SourceVideo => None,
    }
}
