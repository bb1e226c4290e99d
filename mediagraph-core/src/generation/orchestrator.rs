use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::{GenerationJob, JobHandle, JobOutcome};
use super::provider::{CredentialProvider, GenerationProvider};
use super::types::{
    GeneratedMedia, GenerationKind, GenerationParams, SubmitRequest, SubmitResponse,
};
use crate::config::PollConfig;
use crate::errors::{GenerationError, GenerationResult, GraphResult};
use crate::model::{
    DerivationKind, Edge, GeneratedFrom, JobRef, Node, NodeStatus, REFERENCE_SLOTS,
};
use crate::store::{GraphHandle, GraphStore, NodePatch};

/// Horizontal gap between fanned-out result nodes
const SIBLING_GAP: f64 = 40.0;
const MAX_RESULTS_PER_REQUEST: u32 = 4;

/// Runs generation jobs against a provider and writes their results into
/// the graph.
///
/// Each asynchronous job owns one tokio task. A job may only touch its
/// target node while the node's `active_job` still names it; deleting or
/// resubmitting the node is therefore the only cancellation signal.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    graph: GraphHandle,
    provider: Arc<dyn GenerationProvider>,
    credentials: Arc<dyn CredentialProvider>,
    config: PollConfig,
    active_jobs: Arc<RwLock<HashMap<String, GenerationJob>>>,
    last_requests: Arc<RwLock<HashMap<String, (GenerationKind, GenerationParams)>>>,
    remaining_credits: Arc<RwLock<Option<i64>>>,
}

impl GenerationOrchestrator {
    pub fn new(
        graph: GraphHandle,
        provider: Arc<dyn GenerationProvider>,
        credentials: Arc<dyn CredentialProvider>,
        config: PollConfig,
    ) -> Self {
        Self {
            graph,
            provider,
            credentials,
            config,
            active_jobs: Arc::new(RwLock::new(HashMap::new())),
            last_requests: Arc::new(RwLock::new(HashMap::new())),
            remaining_credits: Arc::new(RwLock::new(None)),
        }
    }

    pub fn provider(&self) -> Arc<dyn GenerationProvider> {
        self.provider.clone()
    }

    pub fn credential_provider(&self) -> Arc<dyn CredentialProvider> {
        self.credentials.clone()
    }

    /// Start a job that fills `target_node_id` with generated media.
    ///
    /// Parameter problems are reported before any network call and leave
    /// the node in `error`. A submit that returns media inline settles
    /// immediately; otherwise the returned handle tracks the polling task.
    pub async fn submit(
        &self,
        kind: GenerationKind,
        target_node_id: &str,
        params: GenerationParams,
    ) -> GenerationResult<JobHandle> {
        let job_id = Uuid::new_v4().to_string();

        let request = match self.claim(kind, target_node_id, &params, &job_id).await {
            Ok(request) => request,
            Err(GenerationError::Graph(err)) => return Err(err.into()),
            Err(err) => {
                warn!(node_id = %target_node_id, "Rejected generation request: {}", err);
                self.mark_error(target_node_id, &err).await;
                return Err(err);
            }
        };

        self.last_requests
            .write()
            .await
            .insert(target_node_id.to_string(), (kind, params));

        let credentials = match self.credentials.credentials().await {
            Ok(credentials) => credentials,
            Err(err) => {
                self.settle_failure(target_node_id, &job_id, err.clone()).await;
                return Err(err);
            }
        };

        info!(
            job_id = %job_id,
            node_id = %target_node_id,
            kind = %kind,
            count = request.count,
            "Submitting generation job"
        );

        let response = match self.provider.submit(&request, &credentials).await {
            Ok(response) => response,
            Err(err) => {
                self.settle_failure(target_node_id, &job_id, err.clone()).await;
                return Err(err);
            }
        };

        match response {
            SubmitResponse::Completed {
                media,
                remaining_credits,
            } => {
                if let Some(credits) = remaining_credits {
                    self.record_credits(credits).await;
                }
                let outcome = self
                    .settle_success(target_node_id, &job_id, kind, media)
                    .await;
                Ok(JobHandle::settled(
                    job_id,
                    target_node_id.to_string(),
                    outcome,
                ))
            }
            SubmitResponse::Pending { operation_name } => {
                if !kind.supports_polling() {
                    let err = GenerationError::Provider(format!(
                        "{} generation returned an operation instead of media",
                        kind
                    ));
                    self.settle_failure(target_node_id, &job_id, err.clone())
                        .await;
                    return Err(err);
                }

                let job = GenerationJob {
                    job_id: job_id.clone(),
                    operation_name: Some(operation_name),
                    target_node_id: target_node_id.to_string(),
                    kind,
                    submitted_at: Utc::now(),
                    poll_interval_ms: self.config.initial_interval.as_millis() as u64,
                    attempts: 0,
                };

                let handed_over = self.graph.write().await.update_node_for_job(
                    target_node_id,
                    &job_id,
                    NodePatch::generating(job.job_ref()),
                )?;
                if !handed_over {
                    debug!(job_id = %job_id, "Node changed hands during submit");
                    return Ok(JobHandle::settled(
                        job_id,
                        target_node_id.to_string(),
                        JobOutcome::Superseded,
                    ));
                }

                Ok(self.spawn_poll(job).await)
            }
        }
    }

    /// Resubmit the parameters last used for `node_id`. The node is handed
    /// to the new job, so any job still running for it stops at its next
    /// ownership check.
    pub async fn retry(&self, node_id: &str) -> GenerationResult<JobHandle> {
        let previous = self.last_requests.read().await.get(node_id).cloned();
        let (kind, params) = previous.ok_or_else(|| {
            GenerationError::Validation(format!(
                "no previous generation is known for node '{}'",
                node_id
            ))
        })?;
        self.submit(kind, node_id, params).await
    }

    /// Pick up jobs restored from a snapshot. Nodes whose operation name was
    /// never recorded cannot be polled and are settled into `error`.
    pub async fn resume_interrupted(&self) -> Vec<JobHandle> {
        let nodes = self.graph.nodes().await;
        let mut handles = Vec::new();

        for node in nodes {
            let Some(job_ref) = node.active_job.clone() else {
                continue;
            };
            let kind = GenerationKind::for_node(node.kind());

            match (job_ref.operation_name, kind) {
                (Some(operation_name), Some(kind)) if kind.supports_polling() => {
                    if node.status != NodeStatus::Generating {
                        let patch = NodePatch::generating(JobRef {
                            job_id: job_ref.job_id.clone(),
                            operation_name: Some(operation_name.clone()),
                        });
                        if let Err(err) = self.graph.update_node(&node.id, patch).await {
                            warn!(node_id = %node.id, "Could not restore generating state: {}", err);
                            continue;
                        }
                    }
                    info!(node_id = %node.id, operation = %operation_name, "Resuming generation job");
                    let job = GenerationJob {
                        job_id: job_ref.job_id,
                        operation_name: Some(operation_name),
                        target_node_id: node.id.clone(),
                        kind,
                        submitted_at: Utc::now(),
                        poll_interval_ms: self.config.initial_interval.as_millis() as u64,
                        attempts: 0,
                    };
                    handles.push(self.spawn_poll(job).await);
                }
                _ => {
                    let err = GenerationError::Provider(
                        "generation was interrupted before the provider accepted it".to_string(),
                    );
                    self.settle_failure(&node.id, &job_ref.job_id, err).await;
                }
            }
        }

        handles
    }

    pub async fn active_jobs(&self) -> Vec<GenerationJob> {
        let mut jobs: Vec<GenerationJob> = self.active_jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        jobs
    }

    pub async fn remaining_credits(&self) -> Option<i64> {
        *self.remaining_credits.read().await
    }

    /// Drop what is remembered about a node that left the graph.
    pub async fn forget(&self, node_id: &str) {
        self.last_requests.write().await.remove(node_id);
    }

    /// Forget per-project state after the active project changes.
    pub async fn reset(&self) {
        self.last_requests.write().await.clear();
    }

    // ----- Job lifecycle ----------------------------------------------------

    /// Validate, resolve references and hand the node to `job_id`, all under
    /// one write guard.
    async fn claim(
        &self,
        kind: GenerationKind,
        target_node_id: &str,
        params: &GenerationParams,
        job_id: &str,
    ) -> GenerationResult<SubmitRequest> {
        let mut store = self.graph.write().await;
        let request = build_request(&store, kind, target_node_id, params)?;

        let mut generated_from =
            GeneratedFrom::new(params.derivation).with_sources(params.source_node_ids());
        if !params.prompt.trim().is_empty() {
            generated_from = generated_from.with_prompt(params.prompt.trim());
        }

        let mut patch = NodePatch::new()
            .status(NodeStatus::Pending)
            .clear_error()
            .generated_from(Some(generated_from))
            .active_job(Some(JobRef {
                job_id: job_id.to_string(),
                operation_name: None,
            }));
        if kind == GenerationKind::Video {
            patch = patch.prompt_text(params.prompt.trim());
        }

        store.update_node(target_node_id, patch)?;
        Ok(request)
    }

    async fn spawn_poll(&self, job: GenerationJob) -> JobHandle {
        self.active_jobs
            .write()
            .await
            .insert(job.job_id.clone(), job.clone());

        let orchestrator = self.clone();
        let task_job = job.clone();
        let task = tokio::spawn(async move {
            let _entry = ActiveJobEntry {
                jobs: orchestrator.active_jobs.clone(),
                job_id: task_job.job_id.clone(),
            };
            orchestrator.poll_until_settled(task_job).await
        });

        JobHandle::running(&job, task)
    }

    async fn poll_until_settled(&self, mut job: GenerationJob) -> JobOutcome {
        let Some(operation_name) = job.operation_name.clone() else {
            let err = GenerationError::Provider("job has no operation to poll".to_string());
            return self
                .settle_failure(&job.target_node_id, &job.job_id, err)
                .await;
        };

        let mut interval = self.config.initial_interval;
        let mut consecutive_failures = 0u32;

        loop {
            if job.attempts >= self.config.max_attempts {
                warn!(job_id = %job.job_id, attempts = job.attempts, "Generation job timed out");
                let err = GenerationError::Timeout {
                    attempts: job.attempts,
                };
                return self
                    .settle_failure(&job.target_node_id, &job.job_id, err)
                    .await;
            }

            tokio::time::sleep(interval).await;

            if !self.still_owns(&job).await {
                debug!(job_id = %job.job_id, node_id = %job.target_node_id, "Job superseded, stopping");
                return JobOutcome::Superseded;
            }

            job.attempts += 1;
            job.poll_interval_ms = interval.as_millis() as u64;
            self.active_jobs
                .write()
                .await
                .insert(job.job_id.clone(), job.clone());

            let polled = match self.credentials.credentials().await {
                Ok(credentials) => {
                    self.provider
                        .poll(std::slice::from_ref(&operation_name), &credentials)
                        .await
                }
                Err(err) => Err(err),
            };

            match polled {
                Ok(responses) => {
                    let response = responses
                        .into_iter()
                        .find(|response| response.operation_name == operation_name);

                    let Some(response) = response else {
                        consecutive_failures += 1;
                        warn!(
                            job_id = %job.job_id,
                            failures = consecutive_failures,
                            "Poll response did not include the operation"
                        );
                        if consecutive_failures > self.config.max_failures {
                            let err = GenerationError::Provider(format!(
                                "operation '{}' is unknown to the provider",
                                operation_name
                            ));
                            return self
                                .settle_failure(&job.target_node_id, &job.job_id, err)
                                .await;
                        }
                        interval = self.config.next_interval(interval);
                        continue;
                    };

                    consecutive_failures = 0;
                    if let Some(credits) = response.remaining_credits {
                        self.record_credits(credits).await;
                    }

                    if response.status.is_success() {
                        return self
                            .settle_success(
                                &job.target_node_id,
                                &job.job_id,
                                job.kind,
                                response.media,
                            )
                            .await;
                    }
                    if response.status.is_failure() {
                        let err = response.error.unwrap_or_default().into_error();
                        return self
                            .settle_failure(&job.target_node_id, &job.job_id, err)
                            .await;
                    }

                    debug!(
                        job_id = %job.job_id,
                        status = ?response.status,
                        attempt = job.attempts,
                        "Generation still running"
                    );
                }
                Err(err) if err.is_retryable() => {
                    consecutive_failures += 1;
                    if consecutive_failures > self.config.max_failures {
                        warn!(job_id = %job.job_id, "Giving up after repeated poll failures: {}", err);
                        return self
                            .settle_failure(&job.target_node_id, &job.job_id, err)
                            .await;
                    }
                    warn!(
                        job_id = %job.job_id,
                        failures = consecutive_failures,
                        "Transient poll failure: {}",
                        err
                    );
                }
                Err(err) => {
                    return self
                        .settle_failure(&job.target_node_id, &job.job_id, err)
                        .await;
                }
            }

            interval = self.config.next_interval(interval);
        }
    }

    async fn still_owns(&self, job: &GenerationJob) -> bool {
        self.graph
            .read()
            .await
            .node(&job.target_node_id)
            .map(|node| node.is_owned_by(&job.job_id))
            .unwrap_or(false)
    }

    /// Apply results. The first result fills the target node; any further
    /// results become sibling nodes to its right.
    async fn settle_success(
        &self,
        node_id: &str,
        job_id: &str,
        kind: GenerationKind,
        media: Vec<GeneratedMedia>,
    ) -> JobOutcome {
        if media.is_empty() {
            let err = GenerationError::Provider("generation completed without media".to_string());
            return self.settle_failure(node_id, job_id, err).await;
        }

        let mut patches = Vec::with_capacity(media.len());
        for item in &media {
            match result_patch(kind, item) {
                Ok(patch) => patches.push(patch),
                Err(err) => return self.settle_failure(node_id, job_id, err).await,
            }
        }

        let mut store = self.graph.write().await;
        let placeholder = match store.node(node_id) {
            Some(node) if node.is_owned_by(job_id) => node.clone(),
            _ => {
                debug!(job_id = %job_id, node_id = %node_id, "Dropping result for superseded job");
                return JobOutcome::Superseded;
            }
        };

        match apply_results(&mut store, &placeholder, kind, patches) {
            Ok(node_ids) => {
                info!(
                    job_id = %job_id,
                    node_id = %node_id,
                    results = node_ids.len(),
                    "Generation job completed"
                );
                JobOutcome::Completed { node_ids }
            }
            Err(err) => {
                error!(job_id = %job_id, node_id = %node_id, "Failed to apply generation result: {}", err);
                JobOutcome::Failed(err.into())
            }
        }
    }

    /// Settle the node into `error` if this job still owns it.
    async fn settle_failure(&self, node_id: &str, job_id: &str, err: GenerationError) -> JobOutcome {
        let applied = self.graph.write().await.update_node_for_job(
            node_id,
            job_id,
            NodePatch::error(err.user_message()),
        );

        match applied {
            Ok(true) => {
                warn!(
                    job_id = %job_id,
                    node_id = %node_id,
                    code = err.error_code(),
                    "Generation job failed: {}",
                    err
                );
                JobOutcome::Failed(err)
            }
            Ok(false) => JobOutcome::Superseded,
            Err(graph_err) => JobOutcome::Failed(graph_err.into()),
        }
    }

    /// Only media nodes have a generation lifecycle to put into `error`.
    async fn mark_error(&self, node_id: &str, err: &GenerationError) {
        let mut store = self.graph.write().await;
        let is_media = store
            .node(node_id)
            .map(|node| node.kind().is_media())
            .unwrap_or(false);
        if !is_media {
            return;
        }
        if let Err(graph_err) = store.update_node(node_id, NodePatch::error(err.user_message())) {
            debug!(node_id = %node_id, "Could not mark node as failed: {}", graph_err);
        }
    }

    async fn record_credits(&self, credits: i64) {
        *self.remaining_credits.write().await = Some(credits);
    }
}

/// Removes a job from the active table when its task ends, including when
/// the task panics or is aborted.
struct ActiveJobEntry {
    jobs: Arc<RwLock<HashMap<String, GenerationJob>>>,
    job_id: String,
}

impl Drop for ActiveJobEntry {
    fn drop(&mut self) {
        if let Ok(mut jobs) = self.jobs.try_write() {
            jobs.remove(&self.job_id);
            return;
        }
        let jobs = self.jobs.clone();
        let job_id = std::mem::take(&mut self.job_id);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                jobs.write().await.remove(&job_id);
            });
        }
    }
}

/// Check parameters against the graph and translate node ids into provider
/// media ids.
fn build_request(
    store: &GraphStore,
    kind: GenerationKind,
    target_node_id: &str,
    params: &GenerationParams,
) -> GenerationResult<SubmitRequest> {
    let target = store
        .node(target_node_id)
        .ok_or_else(|| crate::errors::GraphError::NodeNotFound(target_node_id.to_string()))?;
    let invalid = |message: String| Err(GenerationError::Validation(message));

    if target.kind() != kind.node_kind() {
        return invalid(format!(
            "node '{}' is a {} node and cannot hold {} output",
            target.id,
            target.kind(),
            kind
        ));
    }

    let prompt = params.prompt.trim();
    if prompt.is_empty() && params.derivation != DerivationKind::CameraControl {
        return invalid("a prompt is required".to_string());
    }
    if params.count == 0 || params.count > MAX_RESULTS_PER_REQUEST {
        return invalid(format!(
            "result count must be between 1 and {}",
            MAX_RESULTS_PER_REQUEST
        ));
    }

    match params.derivation {
        DerivationKind::FramesToVideo if params.start_image_id.is_none() => {
            return invalid("a start frame image is required".to_string());
        }
        DerivationKind::ImageToVideo
            if params.start_image_id.is_none() && params.reference_node_ids.is_empty() =>
        {
            return invalid("a source image is required".to_string());
        }
        DerivationKind::ReferencesToVideo if params.reference_node_ids.is_empty() => {
            return invalid("at least one reference image is required".to_string());
        }
        DerivationKind::VideoExtend | DerivationKind::CameraControl
            if params.source_video_id.is_none() =>
        {
            return invalid("a source video is required".to_string());
        }
        DerivationKind::CameraControl if params.camera_motion.is_none() => {
            return invalid("a camera motion is required".to_string());
        }
        _ => {}
    }

    if kind == GenerationKind::Video && params.reference_node_ids.len() > REFERENCE_SLOTS {
        return invalid(format!(
            "at most {} reference images are supported",
            REFERENCE_SLOTS
        ));
    }

    if kind == GenerationKind::Audio {
        if params.voice_id.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return invalid("a voice is required for speech".to_string());
        }
        if !params.reference_node_ids.is_empty()
            || params.start_image_id.is_some()
            || params.source_video_id.is_some()
        {
            return invalid("speech generation does not take media inputs".to_string());
        }
    }

    if let Some(source) = params.prompt_source_id.as_deref() {
        if !store.contains(source) {
            return invalid(format!("prompt source '{}' does not exist", source));
        }
    }

    let resolve = |node_id: &str| -> GenerationResult<String> {
        let node = store.node(node_id).ok_or_else(|| {
            GenerationError::Validation(format!("referenced node '{}' does not exist", node_id))
        })?;
        node.media_generation_id()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                GenerationError::Validation(format!(
                    "referenced node '{}' has no generated media yet",
                    node_id
                ))
            })
    };

    let reference_ids = params
        .reference_node_ids
        .iter()
        .map(|id| resolve(id))
        .collect::<GenerationResult<Vec<_>>>()?;
    let start_frame_id = params.start_image_id.as_deref().map(resolve).transpose()?;
    let end_frame_id = params.end_image_id.as_deref().map(resolve).transpose()?;
    let source_media_id = params.source_video_id.as_deref().map(resolve).transpose()?;

    Ok(SubmitRequest {
        kind,
        prompt: prompt.to_string(),
        aspect_ratio: params.aspect_ratio,
        reference_ids,
        start_frame_id,
        end_frame_id,
        source_media_id,
        count: params.count,
        seed: params.seed,
        camera_motion: params.camera_motion,
        voice_id: params.voice_id.clone(),
        emotion: params.emotion.clone(),
    })
}

fn result_patch(kind: GenerationKind, media: &GeneratedMedia) -> GenerationResult<NodePatch> {
    let mut patch = NodePatch::new()
        .src(media.src(kind)?)
        .status(NodeStatus::Ready)
        .clear_error()
        .active_job(None);
    let media_id = Some(media.media_generation_id.clone()).filter(|id| !id.is_empty());

    match kind {
        GenerationKind::Image => {
            patch = patch.media_generation_id(media_id).seed(media.seed);
        }
        GenerationKind::Video => {
            patch = patch.media_generation_id(media_id);
            if let Some(thumbnail) = media.thumbnail_url.clone() {
                patch = patch.thumbnail(thumbnail);
            }
        }
        GenerationKind::Audio => {
            patch = patch.duration(media.duration_secs);
        }
    }
    Ok(patch)
}

fn apply_results(
    store: &mut GraphStore,
    placeholder: &Node,
    kind: GenerationKind,
    patches: Vec<NodePatch>,
) -> GraphResult<Vec<String>> {
    let mut patches = patches.into_iter();
    let mut node_ids = Vec::new();

    if let Some(primary) = patches.next() {
        store.update_node(&placeholder.id, primary)?;
        node_ids.push(placeholder.id.clone());
    }

    let incoming: Vec<Edge> = store
        .edges()
        .iter()
        .filter(|edge| edge.target == placeholder.id)
        .cloned()
        .collect();

    for (index, patch) in patches.enumerate() {
        let offset = (placeholder.size.width + SIBLING_GAP) * (index + 1) as f64;
        let mut sibling = placeholder.clone();
        sibling.id = format!("{}-{}", kind, Uuid::new_v4());
        sibling.position = placeholder.position.offset(offset, 0.0);
        sibling.active_job = None;
        sibling.status = NodeStatus::Pending;

        let sibling_id = sibling.id.clone();
        store.add_node(sibling)?;
        store.update_node(&sibling_id, patch)?;

        for edge in &incoming {
            let mut copy = Edge::new(edge.source.clone(), sibling_id.clone());
            if let Some(handle) = edge.target_handle.clone() {
                copy = copy.with_target_handle(handle);
            }
            if let Some(handle) = edge.source_handle.clone() {
                copy = copy.with_source_handle(handle);
            }
            store.add_or_replace_edge(copy)?;
        }

        node_ids.push(sibling_id);
    }

    Ok(node_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, Position};

    fn store_with(nodes: Vec<Node>) -> GraphStore {
        let mut store = GraphStore::new();
        for node in nodes {
            store.add_node(node).unwrap();
        }
        store
    }

    #[test]
    fn test_missing_prompt_is_rejected() {
        let store = store_with(vec![Node::image("img", Position::default())]);
        let params = GenerationParams::new(DerivationKind::TextToImage, "   ");
        let err = build_request(&store, GenerationKind::Image, "img", &params).unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)));
    }

    #[test]
    fn test_frames_need_start_image() {
        let store = store_with(vec![Node::video("vid", Position::default())]);
        let params = GenerationParams::new(DerivationKind::FramesToVideo, "walk");
        let err = build_request(&store, GenerationKind::Video, "vid", &params).unwrap_err();
        assert_eq!(
            err,
            GenerationError::Validation("a start frame image is required".to_string())
        );
    }

    #[test]
    fn test_unfinished_reference_is_rejected() {
        let store = store_with(vec![
            Node::image("ref", Position::default()),
            Node::image("img", Position::new(400.0, 0.0)),
        ]);
        let params =
            GenerationParams::new(DerivationKind::ImageToImage, "recolor").with_reference("ref");
        let err = build_request(&store, GenerationKind::Image, "img", &params).unwrap_err();
        assert!(err.to_string().contains("has no generated media"));
    }

    #[test]
    fn test_references_resolve_to_media_ids() {
        let store = store_with(vec![
            Node::image("a", Position::default())
                .with_src("https://cdn/a.png")
                .with_media_generation_id("m-a")
                .with_status(NodeStatus::Ready),
            Node::video("vid", Position::new(400.0, 0.0)),
        ]);
        let params = GenerationParams::new(DerivationKind::FramesToVideo, "zoom")
            .with_start_image("a")
            .with_aspect_ratio(crate::model::AspectRatio::Portrait);
        let request = build_request(&store, GenerationKind::Video, "vid", &params).unwrap();
        assert_eq!(request.start_frame_id.as_deref(), Some("m-a"));
        assert_eq!(request.prompt, "zoom");
        assert_eq!(request.aspect_ratio.to_string(), "9:16");
    }

    #[test]
    fn test_kind_must_match_target() {
        let store = store_with(vec![Node::text("txt", Position::default(), "hi")]);
        let params = GenerationParams::new(DerivationKind::TextToImage, "sunset");
        let err = build_request(&store, GenerationKind::Image, "txt", &params).unwrap_err();
        assert!(matches!(err, GenerationError::Validation(_)));
        assert_eq!(store.node("txt").map(Node::kind), Some(NodeKind::Text));
    }

    #[test]
    fn test_siblings_copy_provenance_and_edges() {
        let mut store = store_with(vec![
            Node::text("txt", Position::default(), "sunset"),
            Node::image("img", Position::new(400.0, 0.0)).with_generated_from(
                GeneratedFrom::new(DerivationKind::TextToImage).with_sources(["txt"]),
            ),
        ]);
        store
            .connect("txt", "img", crate::model::InputHandle::Prompt)
            .unwrap();
        let placeholder = store.node("img").cloned().unwrap();

        let patches = vec![
            result_patch(
                GenerationKind::Image,
                &GeneratedMedia::from_url("m-1", "https://cdn/1.png"),
            )
            .unwrap(),
            result_patch(
                GenerationKind::Image,
                &GeneratedMedia::from_url("m-2", "https://cdn/2.png"),
            )
            .unwrap(),
        ];
        let ids = apply_results(&mut store, &placeholder, GenerationKind::Image, patches).unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], "img");
        let sibling = store.node(&ids[1]).unwrap();
        assert_eq!(sibling.status, NodeStatus::Ready);
        assert_eq!(sibling.media_generation_id(), Some("m-2"));
        assert_eq!(sibling.generated_from, placeholder.generated_from);
        assert!(sibling.position.x > placeholder.position.x);
        assert!(store.edges().iter().any(|edge| edge.target == ids[1]));
    }
}
