use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::position::{Position, Size};
use super::REFERENCE_SLOTS;

// Lifecycle of a node's generated content
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Pending,
    Generating,
    Ready,
    Error,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    Image,
    Video,
    Audio,
    Text,
    Note,
}

impl NodeKind {
    /// Kinds whose content comes from a generation provider
    pub fn is_media(&self) -> bool {
        matches!(self, NodeKind::Image | NodeKind::Video | NodeKind::Audio)
    }

    pub fn default_size(&self) -> Size {
        match self {
            NodeKind::Image => Size::new(320.0, 320.0),
            NodeKind::Video => Size::new(480.0, 270.0),
            NodeKind::Audio => Size::new(320.0, 120.0),
            NodeKind::Text => Size::new(280.0, 160.0),
            NodeKind::Note => Size::new(220.0, 220.0),
        }
    }
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DerivationKind {
    Manual,
    TextToImage,
    TextToVideo,
    ImageToImage,
    ImageToVideo,
    FramesToVideo,
    ReferencesToVideo,
    VideoExtend,
    CameraControl,
    Storyboard,
    TextToSpeech,
}

// Provenance of a generated node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFrom {
    #[serde(rename = "type")]
    pub kind: DerivationKind,
    #[serde(default)]
    pub source_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl GeneratedFrom {
    pub fn new(kind: DerivationKind) -> Self {
        Self {
            kind,
            source_ids: BTreeSet::new(),
            prompt: None,
        }
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_ids.extend(sources.into_iter().map(Into::into));
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// The job currently allowed to mutate a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRef {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    #[strum(serialize = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    #[strum(serialize = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    #[strum(serialize = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    #[strum(serialize = "4:3")]
    Classic,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum CameraMotion {
    DollyIn,
    DollyOut,
    PanLeft,
    PanRight,
    TiltUp,
    TiltDown,
    Orbit,
    Static,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageNode {
    #[serde(default)]
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_generation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoNode {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_generation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_image_id: Option<String>,
    #[serde(default)]
    pub reference_image_ids: [Option<String>; REFERENCE_SLOTS],
    #[serde(default)]
    pub prompt_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_motion: Option<CameraMotion>,
}

impl VideoNode {
    /// Clear every frame or reference slot pointing at `node_id`.
    /// Returns true when at least one slot changed.
    pub fn clear_slots_referencing(&mut self, node_id: &str) -> bool {
        let mut changed = false;
        for slot in [&mut self.start_image_id, &mut self.end_image_id]
            .into_iter()
            .chain(self.reference_image_ids.iter_mut())
        {
            if slot.as_deref() == Some(node_id) {
                *slot = None;
                changed = true;
            }
        }
        changed
    }

    pub fn slots_reference(&self, node_id: &str) -> bool {
        self.start_image_id.as_deref() == Some(node_id)
            || self.end_image_id.as_deref() == Some(node_id)
            || self
                .reference_image_ids
                .iter()
                .any(|slot| slot.as_deref() == Some(node_id))
    }

    pub fn filled_reference_ids(&self) -> Vec<String> {
        self.reference_image_ids.iter().flatten().cloned().collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioNode {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default)]
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    #[serde(default)]
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteNode {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodePayload {
    Image(ImageNode),
    Video(VideoNode),
    Audio(AudioNode),
    Text(TextNode),
    Note(NoteNode),
}

// Graph node: shared canvas/lifecycle fields plus a kind-specific payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub position: Position,
    pub size: Size,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_from: Option<GeneratedFrom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_job: Option<JobRef>,
    #[serde(flatten)]
    pub payload: NodePayload,
}

impl Node {
    fn with_payload(id: impl Into<String>, position: Position, payload: NodePayload) -> Self {
        let kind = payload_kind(&payload);
        let status = if kind.is_media() {
            NodeStatus::Pending
        } else {
            NodeStatus::Ready
        };
        Self {
            id: id.into(),
            position,
            size: kind.default_size(),
            status,
            error_message: None,
            generated_from: None,
            active_job: None,
            payload,
        }
    }

    pub fn image(id: impl Into<String>, position: Position) -> Self {
        Self::with_payload(id, position, NodePayload::Image(ImageNode::default()))
    }

    pub fn video(id: impl Into<String>, position: Position) -> Self {
        Self::with_payload(id, position, NodePayload::Video(VideoNode::default()))
    }

    pub fn audio(id: impl Into<String>, position: Position, text: impl Into<String>) -> Self {
        Self::with_payload(
            id,
            position,
            NodePayload::Audio(AudioNode {
                text: text.into(),
                ..AudioNode::default()
            }),
        )
    }

    pub fn text(id: impl Into<String>, position: Position, content: impl Into<String>) -> Self {
        Self::with_payload(
            id,
            position,
            NodePayload::Text(TextNode {
                content: content.into(),
            }),
        )
    }

    pub fn note(id: impl Into<String>, position: Position, content: impl Into<String>) -> Self {
        Self::with_payload(
            id,
            position,
            NodePayload::Note(NoteNode {
                content: content.into(),
                color: None,
            }),
        )
    }

    /// Empty node of `kind` waiting for generated content.
    pub fn placeholder(kind: NodeKind, id: impl Into<String>, position: Position) -> Self {
        match kind {
            NodeKind::Image => Self::image(id, position),
            NodeKind::Video => Self::video(id, position),
            NodeKind::Audio => Self::audio(id, position, ""),
            NodeKind::Text => Self::text(id, position, ""),
            NodeKind::Note => Self::note(id, position, ""),
        }
    }

    pub fn with_generated_from(mut self, generated_from: GeneratedFrom) -> Self {
        self.generated_from = Some(generated_from);
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        let src = src.into();
        match &mut self.payload {
            NodePayload::Image(image) => image.src = src,
            NodePayload::Video(video) => video.src = src,
            NodePayload::Audio(audio) => audio.src = src,
            NodePayload::Text(_) | NodePayload::Note(_) => {}
        }
        self
    }

    pub fn with_media_generation_id(mut self, media_id: impl Into<String>) -> Self {
        let media_id = Some(media_id.into());
        match &mut self.payload {
            NodePayload::Image(image) => image.media_generation_id = media_id,
            NodePayload::Video(video) => video.media_generation_id = media_id,
            _ => {}
        }
        self
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn kind(&self) -> NodeKind {
        payload_kind(&self.payload)
    }

    pub fn src(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Image(image) => Some(image.src.as_str()),
            NodePayload::Video(video) => Some(video.src.as_str()),
            NodePayload::Audio(audio) => Some(audio.src.as_str()),
            NodePayload::Text(_) | NodePayload::Note(_) => None,
        }
    }

    pub fn thumbnail(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Video(video) => Some(video.thumbnail.as_str()),
            _ => None,
        }
    }

    pub fn media_generation_id(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Image(image) => image.media_generation_id.as_deref(),
            NodePayload::Video(video) => video.media_generation_id.as_deref(),
            _ => None,
        }
    }

    /// Plain text carried by text and note nodes.
    pub fn content(&self) -> Option<&str> {
        match &self.payload {
            NodePayload::Text(text) => Some(text.content.as_str()),
            NodePayload::Note(note) => Some(note.content.as_str()),
            _ => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoNode> {
        match &self.payload {
            NodePayload::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn as_video_mut(&mut self) -> Option<&mut VideoNode> {
        match &mut self.payload {
            NodePayload::Video(video) => Some(video),
            _ => None,
        }
    }

    pub fn active_job_id(&self) -> Option<&str> {
        self.active_job.as_ref().map(|job| job.job_id.as_str())
    }

    /// True when the node is currently owned by `job_id`.
    pub fn is_owned_by(&self, job_id: &str) -> bool {
        self.active_job_id() == Some(job_id)
    }

    /// Does any provenance or slot field on this node point at `node_id`?
    pub fn references(&self, node_id: &str) -> bool {
        let provenance = self
            .generated_from
            .as_ref()
            .map(|from| from.source_ids.contains(node_id))
            .unwrap_or(false);
        let slots = self
            .as_video()
            .map(|video| video.slots_reference(node_id))
            .unwrap_or(false);
        provenance || slots
    }

    /// Drop generated content so the node can be generated again.
    pub fn reset_for_regeneration(&mut self) {
        match &mut self.payload {
            NodePayload::Image(image) => {
                image.src.clear();
                image.media_generation_id = None;
            }
            NodePayload::Video(video) => {
                video.src.clear();
                video.thumbnail.clear();
                video.media_generation_id = None;
            }
            NodePayload::Audio(audio) => {
                audio.src.clear();
                audio.duration = None;
            }
            NodePayload::Text(_) | NodePayload::Note(_) => return,
        }
        self.status = NodeStatus::Pending;
        self.error_message = None;
        self.active_job = None;
    }

    /// Returns a description of the first broken lifecycle invariant, if any.
    pub fn invariant_violation(&self) -> Option<String> {
        if !self.kind().is_media() {
            return None;
        }
        match self.status {
            NodeStatus::Ready if self.src().map(str::is_empty).unwrap_or(true) => {
                Some(format!("node '{}' is ready without src", self.id))
            }
            NodeStatus::Error if self.error_message.is_none() => {
                Some(format!("node '{}' is in error without a message", self.id))
            }
            NodeStatus::Generating if self.active_job.is_none() => {
                Some(format!("node '{}' is generating without a job", self.id))
            }
            _ => None,
        }
    }
}

fn payload_kind(payload: &NodePayload) -> NodeKind {
    match payload {
        NodePayload::Image(_) => NodeKind::Image,
        NodePayload::Video(_) => NodeKind::Video,
        NodePayload::Audio(_) => NodeKind::Audio,
        NodePayload::Text(_) => NodeKind::Text,
        NodePayload::Note(_) => NodeKind::Note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let node = Node::image("img-1", Position::new(10.0, 20.0))
            .with_src("https://cdn/img.png")
            .with_media_generation_id("m-1")
            .with_status(NodeStatus::Ready)
            .with_generated_from(
                GeneratedFrom::new(DerivationKind::TextToImage)
                    .with_sources(["txt-1"])
                    .with_prompt("sunset"),
            );

        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["kind"], "image");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["mediaGenerationId"], "m-1");
        assert_eq!(value["generatedFrom"]["type"], "text-to-image");
        assert_eq!(value["generatedFrom"]["sourceIds"][0], "txt-1");
    }

    #[test]
    fn test_text_nodes_are_ready() {
        let node = Node::text("t", Position::default(), "hello");
        assert_eq!(node.status, NodeStatus::Ready);
        assert_eq!(node.invariant_violation(), None);
    }

    #[test]
    fn test_ready_without_src_is_a_violation() {
        let node = Node::image("i", Position::default()).with_status(NodeStatus::Ready);
        assert!(node.invariant_violation().is_some());
    }

    #[test]
    fn test_clear_slots_referencing() {
        let mut video = VideoNode {
            start_image_id: Some("a".to_string()),
            reference_image_ids: [None, Some("a".to_string()), Some("b".to_string())],
            ..VideoNode::default()
        };
        assert!(video.clear_slots_referencing("a"));
        assert_eq!(video.start_image_id, None);
        assert_eq!(video.reference_image_ids, [None, None, Some("b".to_string())]);
        assert!(!video.clear_slots_referencing("a"));
    }

    #[test]
    fn test_aspect_ratio_strings() {
        assert_eq!(AspectRatio::Portrait.to_string(), "9:16");
        assert_eq!("1:1".parse::<AspectRatio>().unwrap(), AspectRatio::Square);
        assert_eq!(
            serde_json::to_string(&AspectRatio::Landscape).unwrap(),
            "\"16:9\""
        );
    }
}
