use crate::errors::{GraphError, GraphResult};
use crate::model::{
    GeneratedFrom, JobRef, Node, NodeKind, NodePayload, NodeStatus, Position, Size,
};

/// Partial update for a node. `None` leaves a field untouched; for optional
/// node fields `Some(None)` clears them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    pub position: Option<Position>,
    pub size: Option<Size>,
    pub status: Option<NodeStatus>,
    pub error_message: Option<Option<String>>,
    pub generated_from: Option<Option<GeneratedFrom>>,
    pub active_job: Option<Option<JobRef>>,
    pub src: Option<String>,
    pub thumbnail: Option<String>,
    pub media_generation_id: Option<Option<String>>,
    pub seed: Option<Option<u64>>,
    pub prompt_text: Option<String>,
    pub content: Option<String>,
    pub duration: Option<Option<f64>>,
}

/// What an applied patch changed, for follow-up consistency work.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PatchEffect {
    pub src_changed: bool,
}

impl NodePatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle a node into `error` with a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Some(NodeStatus::Error),
            error_message: Some(Some(message.into())),
            active_job: Some(None),
            ..Self::default()
        }
    }

    /// Hand a node to a job that is now running.
    pub fn generating(job: JobRef) -> Self {
        Self {
            status: Some(NodeStatus::Generating),
            error_message: Some(None),
            active_job: Some(Some(job)),
            ..Self::default()
        }
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn status(mut self, status: NodeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn media_generation_id(mut self, media_id: Option<String>) -> Self {
        self.media_generation_id = Some(media_id);
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn prompt_text(mut self, prompt: impl Into<String>) -> Self {
        self.prompt_text = Some(prompt.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn duration(mut self, duration: Option<f64>) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn generated_from(mut self, generated_from: Option<GeneratedFrom>) -> Self {
        self.generated_from = Some(generated_from);
        self
    }

    pub fn active_job(mut self, job: Option<JobRef>) -> Self {
        self.active_job = Some(job);
        self
    }

    pub fn clear_error(mut self) -> Self {
        self.error_message = Some(None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn validate(&self, node: &Node) -> GraphResult<()> {
        let kind = node.kind();
        let reject = |field: &str| {
            Err(GraphError::Validation(format!(
                "field '{}' does not apply to {} node '{}'",
                field, kind, node.id
            )))
        };

        if self.src.is_some() && !kind.is_media() {
            return reject("src");
        }
        if self.thumbnail.is_some() && kind != NodeKind::Video {
            return reject("thumbnail");
        }
        if self.media_generation_id.is_some() && !matches!(kind, NodeKind::Image | NodeKind::Video)
        {
            return reject("mediaGenerationId");
        }
        if self.seed.is_some() && kind != NodeKind::Image {
            return reject("seed");
        }
        if self.prompt_text.is_some() && kind != NodeKind::Video {
            return reject("promptText");
        }
        if self.content.is_some() && !matches!(kind, NodeKind::Text | NodeKind::Note) {
            return reject("content");
        }
        if self.duration.is_some() && kind != NodeKind::Audio {
            return reject("duration");
        }
        if let Some(size) = self.size {
            if size.width <= 0.0 || size.height <= 0.0 {
                return Err(GraphError::Validation(format!(
                    "node '{}' size must be positive",
                    node.id
                )));
            }
        }
        Ok(())
    }

    /// Validate then apply. Nothing is changed when validation fails.
    pub(crate) fn apply(self, node: &mut Node) -> GraphResult<PatchEffect> {
        self.validate(node)?;
        let mut effect = PatchEffect::default();

        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(size) = self.size {
            node.size = size;
        }
        if let Some(status) = self.status {
            node.status = status;
        }
        if let Some(error_message) = self.error_message {
            node.error_message = error_message;
        }
        if let Some(generated_from) = self.generated_from {
            node.generated_from = generated_from;
        }
        if let Some(active_job) = self.active_job {
            node.active_job = active_job;
        }

        match &mut node.payload {
            NodePayload::Image(image) => {
                if let Some(src) = self.src {
                    effect.src_changed = image.src != src;
                    image.src = src;
                }
                if let Some(media_id) = self.media_generation_id {
                    image.media_generation_id = media_id;
                }
                if let Some(seed) = self.seed {
                    image.seed = seed;
                }
            }
            NodePayload::Video(video) => {
                if let Some(src) = self.src {
                    effect.src_changed = video.src != src;
                    video.src = src;
                }
                if let Some(thumbnail) = self.thumbnail {
                    video.thumbnail = thumbnail;
                }
                if let Some(media_id) = self.media_generation_id {
                    video.media_generation_id = media_id;
                }
                if let Some(prompt) = self.prompt_text {
                    video.prompt_text = prompt;
                }
            }
            NodePayload::Audio(audio) => {
                if let Some(src) = self.src {
                    effect.src_changed = audio.src != src;
                    audio.src = src;
                }
                if let Some(duration) = self.duration {
                    audio.duration = duration;
                }
            }
            NodePayload::Text(text) => {
                if let Some(content) = self.content {
                    text.content = content;
                }
            }
            NodePayload::Note(note) => {
                if let Some(content) = self.content {
                    note.content = content;
                }
            }
        }

        Ok(effect)
    }
}
