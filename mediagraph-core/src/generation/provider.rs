use async_trait::async_trait;

use super::types::{
    ListMediaRequest, MediaEntry, MediaPage, PollResponse, SubmitRequest, SubmitResponse,
};
use crate::errors::{GenerationError, GenerationResult};

/// Bearer credentials attached to every provider call.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Source of provider credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credentials(&self) -> GenerationResult<Credentials>;
}

/// Fixed token, typically read from configuration.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn credentials(&self) -> GenerationResult<Credentials> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(Credentials {
                access_token: token.to_string(),
            }),
            _ => Err(GenerationError::Auth(
                "No provider credential is configured".to_string(),
            )),
        }
    }
}

/// Remote generation service.
///
/// Implementations classify failures into [`GenerationError`] kinds; the
/// orchestrator decides retry and node state from the kind alone.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn submit(
        &self,
        request: &SubmitRequest,
        credentials: &Credentials,
    ) -> GenerationResult<SubmitResponse>;

    /// Batch status query for one or more operations.
    async fn poll(
        &self,
        operation_names: &[String],
        credentials: &Credentials,
    ) -> GenerationResult<Vec<PollResponse>>;

    async fn list_media(
        &self,
        request: &ListMediaRequest,
        credentials: &Credentials,
    ) -> GenerationResult<MediaPage>;

    /// Single media record by id; `Ok(None)` when the provider does not know it.
    async fn lookup_media(
        &self,
        media_generation_id: &str,
        credentials: &Credentials,
    ) -> GenerationResult<Option<MediaEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credentials() {
        let creds = StaticCredentials::new(Some("s3cret".to_string()))
            .credentials()
            .await
            .unwrap();
        assert_eq!(creds.access_token, "s3cret");
        assert!(!format!("{:?}", creds).contains("s3cret"));

        let err = StaticCredentials::new(Some("  ".to_string()))
            .credentials()
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Auth(_)));
    }
}
