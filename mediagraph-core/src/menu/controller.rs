use tracing::{debug, info};
use uuid::Uuid;

use super::reducer::reduce;
use super::state::{GenerationRequest, MenuAction, MenuCommand, MenuEvent, MenuState};
use crate::errors::{GenerationError, GenerationResult, GraphError};
use crate::generation::{GenerationKind, GenerationOrchestrator, GenerationParams, JobHandle};
use crate::model::{DerivationKind, Edge, InputHandle, Node, NodeKind};
use crate::store::GraphHandle;

const SHOT_GAP: f64 = 40.0;
const VARIATION_PROMPT: &str = "A new variation of the reference image";
const ANIMATE_PROMPT: &str = "Bring the image to life with natural motion";

/// What executing a menu command did to the graph.
#[derive(Debug)]
pub enum CommandOutcome {
    Connected(Edge),
    /// Placeholder nodes were created and handed to generation jobs
    Generating {
        node_ids: Vec<String>,
        jobs: Vec<JobHandle>,
    },
}

/// Drives the connection menu and carries out the commands it emits.
pub struct ConnectionController {
    graph: GraphHandle,
    orchestrator: GenerationOrchestrator,
    state: MenuState,
}

impl ConnectionController {
    pub fn new(graph: GraphHandle, orchestrator: GenerationOrchestrator) -> Self {
        Self {
            graph,
            orchestrator,
            state: MenuState::Idle,
        }
    }

    pub fn state(&self) -> &MenuState {
        &self.state
    }

    /// Feed one UI event through the reducer and execute any resulting command.
    pub async fn dispatch(&mut self, event: MenuEvent) -> GenerationResult<Option<CommandOutcome>> {
        let transition = reduce(&self.state, event);
        self.state = transition.state;

        match transition.command {
            Some(command) => self.execute(command).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn execute(&self, command: MenuCommand) -> GenerationResult<CommandOutcome> {
        match command {
            MenuCommand::Connect {
                source,
                target,
                handle,
            } => {
                let edge = self.graph.connect(&source, &target, handle).await?;
                debug!(edge_id = %edge.id, "Connected nodes from menu drag");
                Ok(CommandOutcome::Connected(edge))
            }
            MenuCommand::Generate(request) => self.generate(request).await,
        }
    }

    async fn generate(&self, request: GenerationRequest) -> GenerationResult<CommandOutcome> {
        let source = self
            .graph
            .node(&request.source_id)
            .await
            .ok_or_else(|| GraphError::NodeNotFound(request.source_id.clone()))?;

        let plan = plan_generation(&request, &source)?;
        info!(
            action = %request.action,
            source_id = %source.id,
            shots = plan.shots.len(),
            "Starting generation from menu"
        );

        let mut node_ids = Vec::with_capacity(plan.shots.len());
        let mut jobs = Vec::with_capacity(plan.shots.len());
        let width = plan.kind.node_kind().default_size().width;

        for (index, params) in plan.shots.into_iter().enumerate() {
            let node_id = format!("{}-{}", plan.kind, Uuid::new_v4());
            let position = request
                .anchor
                .offset((width + SHOT_GAP) * index as f64, 0.0);
            let placeholder = Node::placeholder(plan.kind.node_kind(), &node_id, position);

            self.graph.add_node(placeholder).await?;
            if let Some(handle) = plan.input {
                self.graph.connect(&source.id, &node_id, handle).await?;
            }

            jobs.push(self.orchestrator.submit(plan.kind, &node_id, params).await?);
            node_ids.push(node_id);
        }

        Ok(CommandOutcome::Generating { node_ids, jobs })
    }
}

struct GenerationPlan {
    kind: GenerationKind,
    /// Input the source is wired into on each placeholder
    input: Option<InputHandle>,
    shots: Vec<GenerationParams>,
}

/// Translate a committed menu choice into job parameters for each
/// placeholder it creates.
fn plan_generation(request: &GenerationRequest, source: &Node) -> GenerationResult<GenerationPlan> {
    let source_id = source.id.as_str();
    let text = source
        .content()
        .map(str::trim)
        .filter(|content| !content.is_empty())
        .map(str::to_string);
    let inherited_prompt = source
        .generated_from
        .as_ref()
        .and_then(|from| from.prompt.clone())
        .or_else(|| source.as_video().map(|video| video.prompt_text.clone()))
        .filter(|prompt| !prompt.trim().is_empty());

    let unsupported = || {
        GenerationError::Validation(format!(
            "'{}' is not available for {} nodes",
            request.action.label(),
            source.kind()
        ))
    };

    let plan = match (request.action, source.kind()) {
        (MenuAction::GenerateImage, NodeKind::Text) => GenerationPlan {
            kind: GenerationKind::Image,
            input: Some(InputHandle::Prompt),
            shots: vec![GenerationParams::new(
                DerivationKind::TextToImage,
                text.unwrap_or_default(),
            )
            .with_prompt_source(source_id)
            .with_aspect_ratio(request.aspect_ratio)],
        },
        (MenuAction::GenerateImage, NodeKind::Image) => GenerationPlan {
            kind: GenerationKind::Image,
            input: Some(InputHandle::Reference(0)),
            shots: vec![GenerationParams::new(
                DerivationKind::ImageToImage,
                inherited_prompt.unwrap_or_else(|| VARIATION_PROMPT.to_string()),
            )
            .with_reference(source_id)
            .with_aspect_ratio(request.aspect_ratio)],
        },
        (MenuAction::GenerateVideo, NodeKind::Text) => GenerationPlan {
            kind: GenerationKind::Video,
            input: Some(InputHandle::Prompt),
            shots: vec![GenerationParams::new(
                DerivationKind::TextToVideo,
                text.unwrap_or_default(),
            )
            .with_prompt_source(source_id)
            .with_aspect_ratio(request.aspect_ratio)],
        },
        (MenuAction::GenerateVideo, NodeKind::Image) => GenerationPlan {
            kind: GenerationKind::Video,
            input: Some(InputHandle::StartImage),
            shots: vec![GenerationParams::new(
                DerivationKind::ImageToVideo,
                inherited_prompt.unwrap_or_else(|| ANIMATE_PROMPT.to_string()),
            )
            .with_start_image(source_id)
            .with_aspect_ratio(request.aspect_ratio)],
        },
        (MenuAction::AutoStoryboard, kind @ (NodeKind::Text | NodeKind::Image)) => {
            let count = request.shot_count.unwrap_or(1);
            let base = match kind {
                NodeKind::Text => text.unwrap_or_default(),
                _ => inherited_prompt.unwrap_or_else(|| VARIATION_PROMPT.to_string()),
            };
            let shots = (1..=count)
                .map(|shot| {
                    let prompt = if base.is_empty() {
                        String::new()
                    } else {
                        format!("{} (shot {} of {})", base, shot, count)
                    };
                    let params = GenerationParams::new(DerivationKind::Storyboard, prompt);
                    let params = if kind == NodeKind::Text {
                        params.with_prompt_source(source_id)
                    } else {
                        params.with_reference(source_id)
                    };
                    params.with_aspect_ratio(request.aspect_ratio)
                })
                .collect();
            GenerationPlan {
                kind: GenerationKind::Image,
                input: Some(if kind == NodeKind::Text {
                    InputHandle::Prompt
                } else {
                    InputHandle::Reference(0)
                }),
                shots,
            }
        }
        (MenuAction::CustomNextShot, kind @ (NodeKind::Text | NodeKind::Image)) => {
            let prompt = request.prompt.clone().unwrap_or_default();
            let params = if kind == NodeKind::Text {
                GenerationParams::new(DerivationKind::TextToImage, prompt)
                    .with_prompt_source(source_id)
            } else {
                GenerationParams::new(DerivationKind::ImageToImage, prompt)
                    .with_reference(source_id)
            };
            GenerationPlan {
                kind: GenerationKind::Image,
                // The typed prompt replaces the source text, so only image
                // sources are wired in
                input: (kind == NodeKind::Image).then_some(InputHandle::Reference(0)),
                shots: vec![params.with_aspect_ratio(request.aspect_ratio)],
            }
        }
        (MenuAction::CameraControl, NodeKind::Video) => {
            let motion = request
                .camera_motion
                .ok_or_else(|| GenerationError::Validation("a camera motion is required".to_string()))?;
            GenerationPlan {
                kind: GenerationKind::Video,
                input: Some(InputHandle::SourceVideo),
                shots: vec![GenerationParams::new(
                    DerivationKind::CameraControl,
                    inherited_prompt.unwrap_or_default(),
                )
                .with_source_video(source_id)
                .with_camera_motion(motion)],
            }
        }
        (MenuAction::ExtendVideo, NodeKind::Video) => GenerationPlan {
            kind: GenerationKind::Video,
            input: Some(InputHandle::SourceVideo),
            shots: vec![GenerationParams::new(
                DerivationKind::VideoExtend,
                request.prompt.clone().unwrap_or_default(),
            )
            .with_source_video(source_id)],
        },
        _ => return Err(unsupported()),
    };

    Ok(plan)
}
