use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::config::ReconcileConfig;
use crate::errors::{ReconcileError, ReconcileResult};
use crate::generation::{Credentials, GenerationProvider, ListMediaRequest, MediaEntry, MediaKind};
use crate::model::{Node, NodeStatus};
use crate::store::GraphHandle;

/// URL rewrite for one node. Only fields that actually change are set.
///
/// `media_generation_id` and `observed_src` record the node as it was when
/// the rewrite was computed, so a node regenerated in the meantime is left
/// alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileUpdate {
    pub node_id: String,
    pub media_generation_id: String,
    pub observed_src: String,
    pub new_src: Option<String>,
    pub new_thumbnail: Option<String>,
}

impl ReconcileUpdate {
    pub fn is_empty(&self) -> bool {
        self.new_src.is_none() && self.new_thumbnail.is_none()
    }

    /// Whether `node` still holds the asset this update was computed for.
    pub fn matches(&self, node: &Node) -> bool {
        node.status == NodeStatus::Ready
            && node.media_generation_id() == Some(self.media_generation_id.as_str())
            && node.src().unwrap_or_default() == self.observed_src
    }
}

/// A node whose stored URL may have expired.
struct Candidate<'a> {
    node: &'a Node,
    media_kind: MediaKind,
    media_id: &'a str,
}

/// Refreshes expiring media URLs against the provider's current listing,
/// matching on the stable media generation id.
#[derive(Clone)]
pub struct ReconcileService {
    provider: Arc<dyn GenerationProvider>,
    config: ReconcileConfig,
}

impl ReconcileService {
    pub fn new(provider: Arc<dyn GenerationProvider>, config: ReconcileConfig) -> Self {
        Self { provider, config }
    }

    /// Compute URL rewrites for `nodes`. The graph is not touched; pass the
    /// result to [`ReconcileService::apply_updates`].
    pub async fn reconcile(
        &self,
        nodes: &[Node],
        external_project_id: &str,
        credentials: &Credentials,
    ) -> ReconcileResult<Vec<ReconcileUpdate>> {
        let external_project_id = external_project_id.trim();
        if external_project_id.is_empty() {
            return Err(ReconcileError::MissingProject);
        }

        let candidates = candidates(nodes);
        if candidates.is_empty() {
            debug!("No media nodes to reconcile");
            return Ok(Vec::new());
        }

        let mut listings: HashMap<MediaKind, Vec<MediaEntry>> = HashMap::new();
        for kind in [MediaKind::Image, MediaKind::Video] {
            if candidates.iter().any(|c| c.media_kind == kind) {
                let entries = self
                    .fetch_listing(external_project_id, kind, credentials)
                    .await?;
                listings.insert(kind, entries);
            }
        }

        let mut matched: Vec<(&Candidate<'_>, MediaEntry)> = Vec::new();
        let mut unmatched: Vec<&Candidate<'_>> = Vec::new();
        for candidate in &candidates {
            let entries = listings
                .get(&candidate.media_kind)
                .map(Vec::as_slice)
                .unwrap_or_default();
            match find_entry(entries, candidate.media_id) {
                Some(entry) => matched.push((candidate, entry.clone())),
                None => unmatched.push(candidate),
            }
        }

        let looked_up = self.lookup_unmatched(&unmatched, credentials).await;
        let total_matched = matched.len() + looked_up.len();
        matched.extend(looked_up);

        let updates: Vec<ReconcileUpdate> = matched
            .into_iter()
            .map(|(candidate, entry)| diff(candidate, &entry))
            .filter(|update| !update.is_empty())
            .collect();

        info!(
            candidates = candidates.len(),
            matched = total_matched,
            updates = updates.len(),
            "Reconciled media URLs"
        );
        Ok(updates)
    }

    /// Write `updates` into the graph. Nodes that were deleted, left `ready`
    /// or got different media in the meantime are skipped. Returns how many
    /// were applied.
    pub async fn apply_updates(&self, graph: &GraphHandle, updates: &[ReconcileUpdate]) -> usize {
        let mut store = graph.write().await;
        let mut applied = 0;
        for update in updates {
            let unchanged = store
                .node(&update.node_id)
                .map(|node| update.matches(node))
                .unwrap_or(false);
            if !unchanged {
                debug!(node_id = %update.node_id, "Skipping URL refresh for changed node");
                continue;
            }
            match store.refresh_media_urls(
                &update.node_id,
                update.new_src.as_deref(),
                update.new_thumbnail.as_deref(),
            ) {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(err) => warn!(node_id = %update.node_id, "Failed to refresh media URL: {}", err),
            }
        }
        applied
    }

    async fn fetch_listing(
        &self,
        external_project_id: &str,
        media_kind: MediaKind,
        credentials: &Credentials,
    ) -> ReconcileResult<Vec<MediaEntry>> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let request = ListMediaRequest {
                external_project_id: external_project_id.to_string(),
                media_kind,
                page_size: self.config.page_size,
                cursor: cursor.clone(),
            };
            let page = self.provider.list_media(&request, credentials).await?;
            debug!(
                media_kind = %media_kind,
                entries = page.entries.len(),
                "Fetched media listing page"
            );
            entries.extend(page.entries);

            match page.next_cursor.filter(|next| !next.is_empty()) {
                // A repeated cursor would loop forever
                Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(entries)
    }

    async fn lookup_unmatched<'c, 'n>(
        &self,
        unmatched: &[&'c Candidate<'n>],
        credentials: &Credentials,
    ) -> Vec<(&'c Candidate<'n>, MediaEntry)> {
        let batch_size = self.config.batch_size.max(1);
        let mut found = Vec::new();

        for (index, batch) in unmatched.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.batch_pause).await;
            }

            let lookups = batch
                .iter()
                .map(|candidate| self.provider.lookup_media(candidate.media_id, credentials));
            for (candidate, result) in batch.iter().zip(join_all(lookups).await) {
                match result {
                    Ok(Some(entry)) => found.push((*candidate, entry)),
                    Ok(None) => debug!(
                        node_id = %candidate.node.id,
                        media_id = %candidate.media_id,
                        "Media not found by provider"
                    ),
                    Err(err) => warn!(
                        node_id = %candidate.node.id,
                        media_id = %candidate.media_id,
                        "Media lookup failed: {}",
                        err
                    ),
                }
            }
        }
        found
    }
}

fn candidates(nodes: &[Node]) -> Vec<Candidate<'_>> {
    nodes
        .iter()
        .filter(|node| node.status == NodeStatus::Ready)
        .filter_map(|node| {
            let media_kind = MediaKind::for_node(node.kind())?;
            let media_id = node.media_generation_id().filter(|id| !id.is_empty())?;
            Some(Candidate {
                node,
                media_kind,
                media_id,
            })
        })
        .collect()
}

/// Exact id first, then containment in either direction.
fn find_entry<'a>(entries: &'a [MediaEntry], media_id: &str) -> Option<&'a MediaEntry> {
    if media_id.is_empty() {
        return None;
    }
    entries
        .iter()
        .find(|entry| entry.media_generation_id == media_id)
        .or_else(|| {
            entries.iter().find(|entry| {
                let listed = entry.media_generation_id.as_str();
                !listed.is_empty() && (listed.contains(media_id) || media_id.contains(listed))
            })
        })
}

fn diff(candidate: &Candidate<'_>, entry: &MediaEntry) -> ReconcileUpdate {
    let node = candidate.node;
    let changed = |fresh: &Option<String>, current: Option<&str>| {
        fresh
            .as_deref()
            .filter(|url| !url.is_empty() && Some(*url) != current)
            .map(str::to_string)
    };

    let new_thumbnail = if node.as_video().is_some() {
        changed(&entry.thumbnail_url, node.thumbnail())
    } else {
        None
    };

    ReconcileUpdate {
        node_id: node.id.clone(),
        media_generation_id: candidate.media_id.to_string(),
        observed_src: node.src().unwrap_or_default().to_string(),
        new_src: changed(&entry.current_url, node.src()),
        new_thumbnail,
    }
}
