use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD},
    Engine as _,
};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::errors::{GenerationError, GenerationResult};
use crate::model::{AspectRatio, CameraMotion, DerivationKind, NodeKind};

/// Media category requested from the provider.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GenerationKind {
    Image,
    Video,
    Audio,
}

impl GenerationKind {
    pub fn node_kind(&self) -> NodeKind {
        match self {
            GenerationKind::Image => NodeKind::Image,
            GenerationKind::Video => NodeKind::Video,
            GenerationKind::Audio => NodeKind::Audio,
        }
    }

    pub fn for_node(kind: NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Image => Some(GenerationKind::Image),
            NodeKind::Video => Some(GenerationKind::Video),
            NodeKind::Audio => Some(GenerationKind::Audio),
            NodeKind::Text | NodeKind::Note => None,
        }
    }

    /// Audio is only produced synchronously.
    pub fn supports_polling(&self) -> bool {
        !matches!(self, GenerationKind::Audio)
    }
}

/// Caller-facing parameters for a generation job. Node ids are resolved to
/// provider media ids before submit.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    pub derivation: DerivationKind,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub count: u32,
    pub seed: Option<u64>,
    /// Text node the prompt was taken from, recorded as provenance
    pub prompt_source_id: Option<String>,
    pub reference_node_ids: Vec<String>,
    pub start_image_id: Option<String>,
    pub end_image_id: Option<String>,
    pub source_video_id: Option<String>,
    pub camera_motion: Option<CameraMotion>,
    pub voice_id: Option<String>,
    pub emotion: Option<String>,
}

impl GenerationParams {
    pub fn new(derivation: DerivationKind, prompt: impl Into<String>) -> Self {
        Self {
            derivation,
            prompt: prompt.into(),
            aspect_ratio: AspectRatio::default(),
            count: 1,
            seed: None,
            prompt_source_id: None,
            reference_node_ids: Vec::new(),
            start_image_id: None,
            end_image_id: None,
            source_video_id: None,
            camera_motion: None,
            voice_id: None,
            emotion: None,
        }
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_prompt_source(mut self, node_id: impl Into<String>) -> Self {
        self.prompt_source_id = Some(node_id.into());
        self
    }

    pub fn with_reference(mut self, node_id: impl Into<String>) -> Self {
        self.reference_node_ids.push(node_id.into());
        self
    }

    pub fn with_start_image(mut self, node_id: impl Into<String>) -> Self {
        self.start_image_id = Some(node_id.into());
        self
    }

    pub fn with_end_image(mut self, node_id: impl Into<String>) -> Self {
        self.end_image_id = Some(node_id.into());
        self
    }

    pub fn with_source_video(mut self, node_id: impl Into<String>) -> Self {
        self.source_video_id = Some(node_id.into());
        self
    }

    pub fn with_camera_motion(mut self, motion: CameraMotion) -> Self {
        self.camera_motion = Some(motion);
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>, emotion: Option<String>) -> Self {
        self.voice_id = Some(voice_id.into());
        self.emotion = emotion;
        self
    }

    /// Every node this job reads from, in a stable order.
    pub fn source_node_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        let candidates = self
            .prompt_source_id
            .iter()
            .chain(self.start_image_id.iter())
            .chain(self.end_image_id.iter())
            .chain(self.source_video_id.iter())
            .chain(self.reference_node_ids.iter());
        for id in candidates {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}

/// Submit body sent to the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub kind: GenerationKind,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub reference_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_frame_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_frame_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_media_id: Option<String>,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_motion: Option<CameraMotion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

/// One generated asset. Either `url` or `encoded_data` is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedMedia {
    #[serde(default)]
    pub media_generation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl GeneratedMedia {
    pub fn from_url(media_generation_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            media_generation_id: media_generation_id.into(),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn from_bytes(
        media_generation_id: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            media_generation_id: media_generation_id.into(),
            encoded_data: Some(STANDARD.encode(bytes)),
            mime_type: Some(mime_type.into()),
            ..Self::default()
        }
    }

    /// Renderable source: the URL as-is, or inline data as a `data:` URL.
    /// Providers sometimes return url-safe base64; it is normalized to the
    /// standard alphabet.
    pub fn src(&self, kind: GenerationKind) -> GenerationResult<String> {
        if let Some(url) = self.url.as_deref().filter(|url| !url.is_empty()) {
            return Ok(url.to_string());
        }

        let encoded = self
            .encoded_data
            .as_deref()
            .filter(|data| !data.is_empty())
            .ok_or_else(|| {
                GenerationError::Provider(format!(
                    "media '{}' has neither a url nor inline data",
                    self.media_generation_id
                ))
            })?;

        let bytes = STANDARD
            .decode(encoded)
            .or_else(|_| URL_SAFE.decode(encoded))
            .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
            .map_err(|err| {
                GenerationError::Provider(format!(
                    "media '{}' carries undecodable inline data: {}",
                    self.media_generation_id, err
                ))
            })?;

        let mime = self
            .mime_type
            .clone()
            .unwrap_or_else(|| default_mime(kind).to_string());
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }
}

fn default_mime(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::Image => "image/png",
        GenerationKind::Video => "video/mp4",
        GenerationKind::Audio => "audio/mpeg",
    }
}

/// Result of a submit call.
#[derive(Clone, Debug, PartialEq)]
pub enum SubmitResponse {
    /// Media produced synchronously
    Completed {
        media: Vec<GeneratedMedia>,
        remaining_credits: Option<i64>,
    },
    /// Long-running operation to poll
    Pending { operation_name: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    InQueue,
    InProgress,
    Active,
    Completed,
    Successful,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Successful)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OperationStatus::Failed)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProviderFailure {
    pub fn into_error(self) -> GenerationError {
        GenerationError::from_provider_failure(self.code.as_deref(), self.message.as_deref())
    }
}

/// Status of one operation as reported by a poll.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub operation_name: String,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub media: Vec<GeneratedMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProviderFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_credits: Option<i64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn for_node(kind: NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Image => Some(MediaKind::Image),
            NodeKind::Video => Some(MediaKind::Video),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMediaRequest {
    pub external_project_id: String,
    pub media_kind: MediaKind,
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One provider-side record of a generated asset and its current URLs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub media_generation_id: String,
    #[serde(default)]
    pub current_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    #[serde(default)]
    pub entries: Vec<MediaEntry>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
