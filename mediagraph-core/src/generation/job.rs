use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::error;

use super::types::GenerationKind;
use crate::errors::GenerationError;
use crate::model::JobRef;

/// Bookkeeping for one in-flight generation job.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub job_id: String,
    pub operation_name: Option<String>,
    pub target_node_id: String,
    pub kind: GenerationKind,
    pub submitted_at: DateTime<Utc>,
    pub poll_interval_ms: u64,
    pub attempts: u32,
}

impl GenerationJob {
    pub fn job_ref(&self) -> JobRef {
        JobRef {
            job_id: self.job_id.clone(),
            operation_name: self.operation_name.clone(),
        }
    }
}

/// How a job ended.
#[derive(Clone, Debug, PartialEq)]
pub enum JobOutcome {
    /// Results were applied; the first id is the original target node
    Completed { node_ids: Vec<String> },
    /// The job settled its node into `error`
    Failed(GenerationError),
    /// The node was deleted or handed to a newer job; nothing was applied
    Superseded,
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

enum HandleState {
    Settled(JobOutcome),
    Running(JoinHandle<JobOutcome>),
}

/// Returned by submit; await [`JobHandle::wait`] for the outcome.
pub struct JobHandle {
    pub job_id: String,
    pub node_id: String,
    pub operation_name: Option<String>,
    state: HandleState,
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id)
            .field("node_id", &self.node_id)
            .field("operation_name", &self.operation_name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl JobHandle {
    pub(crate) fn settled(job_id: String, node_id: String, outcome: JobOutcome) -> Self {
        Self {
            job_id,
            node_id,
            operation_name: None,
            state: HandleState::Settled(outcome),
        }
    }

    pub(crate) fn running(job: &GenerationJob, task: JoinHandle<JobOutcome>) -> Self {
        Self {
            job_id: job.job_id.clone(),
            node_id: job.target_node_id.clone(),
            operation_name: job.operation_name.clone(),
            state: HandleState::Running(task),
        }
    }

    pub fn is_running(&self) -> bool {
        match &self.state {
            HandleState::Settled(_) => false,
            HandleState::Running(task) => !task.is_finished(),
        }
    }

    pub async fn wait(self) -> JobOutcome {
        match self.state {
            HandleState::Settled(outcome) => outcome,
            HandleState::Running(task) => match task.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(job_id = %self.job_id, "Generation task ended abnormally: {}", err);
                    JobOutcome::Failed(GenerationError::Provider(format!(
                        "generation task ended abnormally: {err}"
                    )))
                }
            },
        }
    }
}
