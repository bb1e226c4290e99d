use std::ops::RangeInclusive;

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::model::{AspectRatio, CameraMotion, InputHandle, NodeKind, Position};

/// Storyboards produce between one and this many shots.
pub const MAX_STORYBOARD_SHOTS: u32 = 8;

/// Something the connection menu offers for a dragged source node.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MenuAction {
    GenerateImage,
    GenerateVideo,
    AutoStoryboard,
    CustomNextShot,
    CameraControl,
    ExtendVideo,
}

impl MenuAction {
    pub fn leaf(&self) -> MenuLeaf {
        match self {
            MenuAction::GenerateImage => MenuLeaf::ImageRatioPick,
            MenuAction::GenerateVideo => MenuLeaf::VideoRatioPick,
            MenuAction::AutoStoryboard => MenuLeaf::ShotCountPick,
            MenuAction::CustomNextShot | MenuAction::ExtendVideo => MenuLeaf::PromptEntry,
            MenuAction::CameraControl => MenuLeaf::CameraControlPick,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::GenerateImage => "Generate image",
            MenuAction::GenerateVideo => "Generate video",
            MenuAction::AutoStoryboard => "Auto storyboard",
            MenuAction::CustomNextShot => "Custom next shot",
            MenuAction::CameraControl => "Camera control",
            MenuAction::ExtendVideo => "Extend video",
        }
    }
}

/// Input screen shown after an action is chosen.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Display)]
#[serde(rename_all = "kebab-case")]
pub enum MenuLeaf {
    ImageRatioPick,
    VideoRatioPick,
    PromptEntry,
    CameraControlPick,
    ShotCountPick,
}

/// Where the dragged connection came from and where the menu is drawn.
#[derive(Clone, Debug, PartialEq)]
pub struct MenuContext {
    pub source_id: String,
    pub source_kind: NodeKind,
    pub anchor: Position,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum MenuState {
    #[default]
    Idle,
    MenuOpen(MenuContext),
    ImageRatioPick(MenuContext),
    VideoRatioPick(MenuContext),
    /// Free-text prompt for `action` (custom next shot or extend video)
    PromptEntry {
        context: MenuContext,
        action: MenuAction,
    },
    CameraControlPick(MenuContext),
    ShotCountPick(MenuContext),
}

impl MenuState {
    pub fn is_idle(&self) -> bool {
        matches!(self, MenuState::Idle)
    }

    pub fn context(&self) -> Option<&MenuContext> {
        match self {
            MenuState::Idle => None,
            MenuState::MenuOpen(context)
            | MenuState::ImageRatioPick(context)
            | MenuState::VideoRatioPick(context)
            | MenuState::CameraControlPick(context)
            | MenuState::ShotCountPick(context)
            | MenuState::PromptEntry { context, .. } => Some(context),
        }
    }

    /// Active leaf, if the menu is past its root.
    pub fn submenu(&self) -> Option<MenuLeaf> {
        match self {
            MenuState::Idle | MenuState::MenuOpen(_) => None,
            MenuState::ImageRatioPick(_) => Some(MenuLeaf::ImageRatioPick),
            MenuState::VideoRatioPick(_) => Some(MenuLeaf::VideoRatioPick),
            MenuState::PromptEntry { .. } => Some(MenuLeaf::PromptEntry),
            MenuState::CameraControlPick(_) => Some(MenuLeaf::CameraControlPick),
            MenuState::ShotCountPick(_) => Some(MenuLeaf::ShotCountPick),
        }
    }

    /// What should be rendered for this state.
    pub fn view(&self) -> Option<MenuView> {
        self.context()
            .map(|context| menu_view(context.source_kind, self.submenu()))
    }
}

/// Where a drag ended.
#[derive(Clone, Debug, PartialEq)]
pub enum DropTarget {
    Canvas {
        position: Position,
    },
    NodeInput {
        node_id: String,
        node_kind: NodeKind,
        handle: InputHandle,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum MenuEvent {
    DragRelease {
        source_id: String,
        source_kind: NodeKind,
        target: DropTarget,
    },
    ChooseAction(MenuAction),
    Back,
    PickRatio(AspectRatio),
    PickShotCount(u32),
    SubmitPrompt(String),
    PickCamera(CameraMotion),
    /// Escape, click outside, or a drop without a choice
    Cancel,
}

/// Everything a committed menu choice needs to start generation.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    pub action: MenuAction,
    pub source_id: String,
    pub source_kind: NodeKind,
    pub anchor: Position,
    pub aspect_ratio: AspectRatio,
    pub prompt: Option<String>,
    pub camera_motion: Option<CameraMotion>,
    pub shot_count: Option<u32>,
}

impl GenerationRequest {
    pub(crate) fn new(action: MenuAction, context: &MenuContext) -> Self {
        Self {
            action,
            source_id: context.source_id.clone(),
            source_kind: context.source_kind,
            anchor: context.anchor,
            aspect_ratio: AspectRatio::default(),
            prompt: None,
            camera_motion: None,
            shot_count: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MenuCommand {
    Generate(GenerationRequest),
    Connect {
        source: String,
        target: String,
        handle: InputHandle,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: MenuState,
    pub command: Option<MenuCommand>,
}

impl Transition {
    pub(crate) fn stay(state: &MenuState) -> Self {
        Self {
            state: state.clone(),
            command: None,
        }
    }

    pub(crate) fn to(state: MenuState) -> Self {
        Self {
            state,
            command: None,
        }
    }

    pub(crate) fn commit(command: MenuCommand) -> Self {
        Self {
            state: MenuState::Idle,
            command: Some(command),
        }
    }
}

/// Choices presented inside a leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum LeafChoices {
    Ratios(Vec<AspectRatio>),
    ShotCounts(RangeInclusive<u32>),
    Prompt,
    CameraMotions(Vec<CameraMotion>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MenuView {
    pub leaf: Option<MenuLeaf>,
    pub actions: Vec<MenuAction>,
    pub choices: Option<LeafChoices>,
}

/// Actions the menu root offers for a source of `kind`.
pub fn offered_actions(kind: NodeKind) -> &'static [MenuAction] {
    match kind {
        NodeKind::Text | NodeKind::Image => &[
            MenuAction::GenerateImage,
            MenuAction::GenerateVideo,
            MenuAction::AutoStoryboard,
            MenuAction::CustomNextShot,
        ],
        NodeKind::Video => &[MenuAction::CameraControl, MenuAction::ExtendVideo],
        NodeKind::Audio | NodeKind::Note => &[],
    }
}

pub fn image_ratios() -> Vec<AspectRatio> {
    vec![
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Square,
        AspectRatio::Classic,
    ]
}

pub fn video_ratios() -> Vec<AspectRatio> {
    vec![AspectRatio::Landscape, AspectRatio::Portrait]
}

pub fn camera_motions() -> Vec<CameraMotion> {
    vec![
        CameraMotion::DollyIn,
        CameraMotion::DollyOut,
        CameraMotion::PanLeft,
        CameraMotion::PanRight,
        CameraMotion::TiltUp,
        CameraMotion::TiltDown,
        CameraMotion::Orbit,
        CameraMotion::Static,
    ]
}

/// Render description for `(source_kind, submenu)`.
pub fn menu_view(source_kind: NodeKind, submenu: Option<MenuLeaf>) -> MenuView {
    let choices = submenu.map(|leaf| match leaf {
        MenuLeaf::ImageRatioPick => LeafChoices::Ratios(image_ratios()),
        MenuLeaf::VideoRatioPick => LeafChoices::Ratios(video_ratios()),
        MenuLeaf::ShotCountPick => LeafChoices::ShotCounts(1..=MAX_STORYBOARD_SHOTS),
        MenuLeaf::PromptEntry => LeafChoices::Prompt,
        MenuLeaf::CameraControlPick => LeafChoices::CameraMotions(camera_motions()),
    });
    let actions = match submenu {
        None => offered_actions(source_kind).to_vec(),
        Some(_) => Vec::new(),
    };

    MenuView {
        leaf: submenu,
        actions,
        choices,
    }
}
