//! Generation job error types
//!
//! The taxonomy decides what happens to a failed job: only transport
//! failures observed while polling are retried, everything else settles the
//! target node into `error` with [`GenerationError::user_message`].

use thiserror::Error;

use super::GraphError;

/// Errors raised while submitting or polling a generation job
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Missing or inconsistent parameters, detected before any network call
    #[error("Invalid generation request: {0}")]
    Validation(String),

    /// Expired or invalid credential
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider concurrency cap reached
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// Network failure talking to the provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Safety or content filtering rejected the request
    #[error("Content rejected by provider: {0}")]
    ContentRejected(String),

    /// Any other provider-side failure
    #[error("Provider error: {0}")]
    Provider(String),

    /// Job did not settle within the configured number of polls
    #[error("Generation timed out after {attempts} polls")]
    Timeout { attempts: u32 },

    /// The target node could not be read or updated
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl GenerationError {
    /// Transient failures worth another poll
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Transport(_))
    }

    /// Failures the user can resolve by waiting and submitting again
    pub fn is_retry_later(&self) -> bool {
        matches!(self, GenerationError::RateLimited(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "VALIDATION_FAILED",
            GenerationError::Auth(_) => "UNAUTHORIZED",
            GenerationError::RateLimited(_) => "RATE_LIMITED",
            GenerationError::Transport(_) => "TRANSPORT_ERROR",
            GenerationError::ContentRejected(_) => "CONTENT_REJECTED",
            GenerationError::Provider(_) => "PROVIDER_ERROR",
            GenerationError::Timeout { .. } => "TIMEOUT",
            GenerationError::Graph(err) => err.error_code(),
        }
    }

    /// Message stored on the node when the job settles with this error.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Auth(message) => message.clone(),
            GenerationError::RateLimited(_) => {
                "Too many generations are running. Try again shortly.".to_string()
            }
            GenerationError::ContentRejected(_) => {
                "The request was blocked by the provider's content policy. Adjust the prompt or reference media and retry.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Classify a provider failure code reported by a poll or submit response.
    pub fn from_provider_failure(code: Option<&str>, message: Option<&str>) -> Self {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or("generation failed")
            .to_string();
        let code = code.unwrap_or_default().to_ascii_uppercase();

        if code.contains("UNSAFE")
            || code.contains("SAFETY")
            || code.contains("CONTENT")
            || code.contains("POLICY")
        {
            GenerationError::ContentRejected(message)
        } else if code.contains("RESOURCE_EXHAUSTED") || code.contains("RATE") {
            GenerationError::RateLimited(message)
        } else if code.contains("UNAUTHENTICATED") || code.contains("PERMISSION") {
            GenerationError::Auth(message)
        } else {
            GenerationError::Provider(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(GenerationError::Transport("reset".to_string()).is_retryable());
        assert!(!GenerationError::Auth("expired".to_string()).is_retryable());
        assert!(!GenerationError::RateLimited("cap".to_string()).is_retryable());
        assert!(!GenerationError::ContentRejected("nsfw".to_string()).is_retryable());
    }

    #[test]
    fn test_rate_limit_message_is_distinct() {
        let err = GenerationError::RateLimited("429".to_string());
        assert!(err.is_retry_later());
        assert!(err.user_message().contains("Try again shortly"));
        assert_eq!(err.error_code(), "RATE_LIMITED");
    }

    #[test]
    fn test_auth_message_is_verbatim() {
        let err = GenerationError::Auth("Token expired at 10:00".to_string());
        assert_eq!(err.user_message(), "Token expired at 10:00");
    }

    #[test]
    fn test_classify_provider_failures() {
        assert!(matches!(
            GenerationError::from_provider_failure(Some("PUBLIC_ERROR_UNSAFE_GENERATION"), None),
            GenerationError::ContentRejected(_)
        ));
        assert!(matches!(
            GenerationError::from_provider_failure(Some("RESOURCE_EXHAUSTED"), Some("cap")),
            GenerationError::RateLimited(_)
        ));
        assert_eq!(
            GenerationError::from_provider_failure(None, Some("boom")),
            GenerationError::Provider("boom".to_string())
        );
    }

    #[test]
    fn test_graph_error_code_passthrough() {
        let err: GenerationError = GraphError::NodeNotFound("n".to_string()).into();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }
}
