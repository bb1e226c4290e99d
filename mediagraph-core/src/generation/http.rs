use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::provider::{Credentials, GenerationProvider};
use super::types::{
    GeneratedMedia, ListMediaRequest, MediaEntry, MediaPage, PollResponse, ProviderFailure,
    SubmitRequest, SubmitResponse,
};
use crate::config::ProviderConfig;
use crate::errors::{GenerationError, GenerationResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    #[serde(default)]
    operation_name: Option<String>,
    #[serde(default)]
    media: Vec<GeneratedMedia>,
    #[serde(default)]
    remaining_credits: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchPollBody<'a> {
    operation_names: &'a [String],
}

#[derive(Debug, Default, Deserialize)]
struct BatchPollResponse {
    #[serde(default)]
    operations: Vec<PollResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<ProviderFailure>,
}

/// [`GenerationProvider`] speaking JSON over HTTP.
#[derive(Clone)]
pub struct HttpGenerationProvider {
    client: Client,
    base_url: Url,
}

impl HttpGenerationProvider {
    pub fn new(base_url: &str, timeout: Duration) -> GenerationResult<Self> {
        let mut base_url = Url::parse(base_url).map_err(|err| {
            GenerationError::Validation(format!("invalid provider url '{}': {}", base_url, err))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mediagraph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| GenerationError::Transport(format!("failed to build client: {err}")))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ProviderConfig) -> GenerationResult<Self> {
        Self::new(&config.base_url, config.request_timeout)
    }

    fn endpoint(&self, path: &str) -> GenerationResult<Url> {
        self.base_url.join(path).map_err(|err| {
            GenerationError::Validation(format!("invalid provider path '{}': {}", path, err))
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        credentials: &Credentials,
    ) -> GenerationResult<(StatusCode, Option<T>)> {
        let response = request
            .bearer_auth(&credentials.access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| GenerationError::Transport(err.to_string()))?;

        if status == StatusCode::NOT_FOUND {
            return Ok((status, None));
        }
        if !status.is_success() {
            return Err(classify_http_failure(status, &body));
        }

        let parsed = serde_json::from_str(&body).map_err(|err| {
            GenerationError::Provider(format!("unreadable provider response: {err}"))
        })?;
        Ok((status, Some(parsed)))
    }
}

/// Map a non-success HTTP response onto the error taxonomy.
pub fn classify_http_failure(status: StatusCode, body: &str) -> GenerationError {
    let failure = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .unwrap_or_default();
    let message = failure
        .message
        .clone()
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("provider returned {}", status));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            match GenerationError::from_provider_failure(failure.code.as_deref(), Some(&message)) {
                rejected @ GenerationError::ContentRejected(_) => rejected,
                _ => GenerationError::Provider(message),
            }
        }
        status if status.is_server_error() => GenerationError::Transport(message),
        _ => GenerationError::Provider(message),
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn submit(
        &self,
        request: &SubmitRequest,
        credentials: &Credentials,
    ) -> GenerationResult<SubmitResponse> {
        let url = self.endpoint("v1/generations")?;
        debug!(kind = %request.kind, count = request.count, "Submitting generation request");

        let (status, body) = self
            .send::<SubmitBody>(self.client.post(url).json(request), credentials)
            .await?;
        let body = body.ok_or_else(|| {
            GenerationError::Provider(format!("generation endpoint returned {}", status))
        })?;

        match body.operation_name.filter(|name| !name.is_empty()) {
            Some(operation_name) => Ok(SubmitResponse::Pending { operation_name }),
            None if !body.media.is_empty() => Ok(SubmitResponse::Completed {
                media: body.media,
                remaining_credits: body.remaining_credits,
            }),
            None => Err(GenerationError::Provider(
                "submit response carried neither media nor an operation".to_string(),
            )),
        }
    }

    async fn poll(
        &self,
        operation_names: &[String],
        credentials: &Credentials,
    ) -> GenerationResult<Vec<PollResponse>> {
        let url = self.endpoint("v1/operations:batchGet")?;
        let request = self
            .client
            .post(url)
            .json(&BatchPollBody { operation_names });

        let (_, body) = self.send::<BatchPollResponse>(request, credentials).await?;
        Ok(body.map(|body| body.operations).unwrap_or_default())
    }

    async fn list_media(
        &self,
        request: &ListMediaRequest,
        credentials: &Credentials,
    ) -> GenerationResult<MediaPage> {
        let mut url = self.endpoint(&format!(
            "v1/projects/{}/media",
            request.external_project_id
        ))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("kind", request.media_kind.as_ref());
            query.append_pair("pageSize", &request.page_size.to_string());
            if let Some(cursor) = request.cursor.as_deref() {
                query.append_pair("cursor", cursor);
            }
        }

        let (_, page) = self
            .send::<MediaPage>(self.client.get(url), credentials)
            .await?;
        Ok(page.unwrap_or_default())
    }

    async fn lookup_media(
        &self,
        media_generation_id: &str,
        credentials: &Credentials,
    ) -> GenerationResult<Option<MediaEntry>> {
        let url = self.endpoint(&format!("v1/media/{}", media_generation_id))?;
        let (_, entry) = self
            .send::<MediaEntry>(self.client.get(url), credentials)
            .await?;
        Ok(entry)
    }
}
