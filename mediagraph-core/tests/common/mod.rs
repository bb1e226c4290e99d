#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mediagraph::config::MediagraphConfig;
use mediagraph::errors::{GenerationError, GenerationResult};
use mediagraph::generation::{
    Credentials, GeneratedMedia, GenerationProvider, ListMediaRequest, MediaEntry, MediaKind,
    MediaPage, OperationStatus, PollResponse, ProviderFailure, StaticCredentials, SubmitRequest,
    SubmitResponse,
};
use mediagraph::persistence::{MemoryBackupStore, MemorySnapshotStorage};
use mediagraph::AppContext;

/// Provider that replays canned responses.
///
/// Polls for an operation with no script left report `IN_PROGRESS`.
#[derive(Default)]
pub struct ScriptedProvider {
    submits: Mutex<VecDeque<GenerationResult<SubmitResponse>>>,
    polls: Mutex<HashMap<String, VecDeque<GenerationResult<PollResponse>>>>,
    listings: Mutex<HashMap<MediaKind, Vec<Vec<MediaEntry>>>>,
    lookups: Mutex<HashMap<String, GenerationResult<Option<MediaEntry>>>>,
    poll_latency: Mutex<Option<Duration>>,
    pub submitted: Mutex<Vec<SubmitRequest>>,
    pub poll_calls: AtomicUsize,
    pub lookup_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_submit(&self, response: GenerationResult<SubmitResponse>) {
        self.submits.lock().unwrap().push_back(response);
    }

    pub fn on_poll(&self, operation: &str, response: GenerationResult<PollResponse>) {
        self.polls
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default()
            .push_back(response);
    }

    /// Each inner vec is one listing page, chained by numeric cursors.
    pub fn set_listing(&self, kind: MediaKind, pages: Vec<Vec<MediaEntry>>) {
        self.listings.lock().unwrap().insert(kind, pages);
    }

    pub fn on_lookup(&self, media_id: &str, result: GenerationResult<Option<MediaEntry>>) {
        self.lookups
            .lock()
            .unwrap()
            .insert(media_id.to_string(), result);
    }

    /// Every poll takes `latency` before it answers.
    pub fn set_poll_latency(&self, latency: Duration) {
        *self.poll_latency.lock().unwrap() = Some(latency);
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_count(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn submit(
        &self,
        request: &SubmitRequest,
        _credentials: &Credentials,
    ) -> GenerationResult<SubmitResponse> {
        self.submitted.lock().unwrap().push(request.clone());
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Provider("no scripted submit".to_string())))
    }

    async fn poll(
        &self,
        operation_names: &[String],
        _credentials: &Credentials,
    ) -> GenerationResult<Vec<PollResponse>> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.poll_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut polls = self.polls.lock().unwrap();
        let mut responses = Vec::new();
        for name in operation_names {
            match polls.get_mut(name).and_then(VecDeque::pop_front) {
                Some(Ok(response)) => responses.push(response),
                Some(Err(err)) => return Err(err),
                None => responses.push(status(name, OperationStatus::InProgress)),
            }
        }
        Ok(responses)
    }

    async fn list_media(
        &self,
        request: &ListMediaRequest,
        _credentials: &Credentials,
    ) -> GenerationResult<MediaPage> {
        let listings = self.listings.lock().unwrap();
        let pages = listings.get(&request.media_kind).cloned().unwrap_or_default();
        let index: usize = request
            .cursor
            .as_deref()
            .and_then(|cursor| cursor.parse().ok())
            .unwrap_or(0);
        let entries = pages.get(index).cloned().unwrap_or_default();
        let next_cursor = (index + 1 < pages.len()).then(|| (index + 1).to_string());
        Ok(MediaPage {
            entries,
            next_cursor,
        })
    }

    async fn lookup_media(
        &self,
        media_generation_id: &str,
        _credentials: &Credentials,
    ) -> GenerationResult<Option<MediaEntry>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.lookups
            .lock()
            .unwrap()
            .get(media_generation_id)
            .cloned()
            .unwrap_or(Ok(None))
    }
}

pub fn pending(operation: &str) -> GenerationResult<SubmitResponse> {
    Ok(SubmitResponse::Pending {
        operation_name: operation.to_string(),
    })
}

pub fn status(operation: &str, status: OperationStatus) -> PollResponse {
    PollResponse {
        operation_name: operation.to_string(),
        status,
        ..PollResponse::default()
    }
}

pub fn in_progress(operation: &str) -> GenerationResult<PollResponse> {
    Ok(status(operation, OperationStatus::InProgress))
}

pub fn completed(operation: &str, media_id: &str) -> GenerationResult<PollResponse> {
    Ok(PollResponse {
        media: vec![GeneratedMedia::from_url(
            media_id,
            format!("https://cdn.example/{}.png", media_id),
        )],
        remaining_credits: Some(42),
        ..status(operation, OperationStatus::Completed)
    })
}

pub fn failed(operation: &str, code: &str, message: &str) -> GenerationResult<PollResponse> {
    Ok(PollResponse {
        error: Some(ProviderFailure {
            code: Some(code.to_string()),
            message: Some(message.to_string()),
        }),
        ..status(operation, OperationStatus::Failed)
    })
}

pub fn entry(media_id: &str, url: &str) -> MediaEntry {
    MediaEntry {
        workflow_id: None,
        media_generation_id: media_id.to_string(),
        current_url: Some(url.to_string()),
        thumbnail_url: None,
    }
}

pub fn credentials() -> Arc<StaticCredentials> {
    Arc::new(StaticCredentials::new(Some("test-token".to_string())))
}

pub struct TestContext {
    pub context: AppContext,
    pub provider: Arc<ScriptedProvider>,
    pub storage: MemorySnapshotStorage,
    pub backup: MemoryBackupStore,
}

/// Context over in-memory storage. Must run inside a tokio runtime.
pub fn test_context(external_project_id: Option<&str>) -> TestContext {
    let provider = ScriptedProvider::new();
    let storage = MemorySnapshotStorage::new();
    let backup = MemoryBackupStore::new();

    let mut config = MediagraphConfig::default();
    config.provider.external_project_id = external_project_id.map(str::to_string);

    let context = AppContext::new(
        config,
        provider.clone(),
        credentials(),
        Arc::new(storage.clone()),
        Arc::new(backup.clone()),
    );

    TestContext {
        context,
        provider,
        storage,
        backup,
    }
}
