//! Generation jobs: provider abstraction, HTTP client and the orchestrator
//! that submits, polls and applies results to the graph.

mod http;
mod job;
mod orchestrator;
mod provider;
mod types;

pub use http::{classify_http_failure, HttpGenerationProvider};
pub use job::{GenerationJob, JobHandle, JobOutcome};
pub use orchestrator::GenerationOrchestrator;
pub use provider::{CredentialProvider, Credentials, GenerationProvider, StaticCredentials};
pub use types::{
    GeneratedMedia, GenerationKind, GenerationParams, ListMediaRequest, MediaEntry, MediaKind,
    MediaPage, OperationStatus, PollResponse, ProviderFailure, SubmitRequest, SubmitResponse,
};
