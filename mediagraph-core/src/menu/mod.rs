//! Connection menu: a pure reducer over drag/menu events plus the
//! controller that turns committed choices into graph edits and jobs.

mod controller;
mod reducer;
mod state;

pub use controller::{CommandOutcome, ConnectionController};
pub use reducer::reduce;
pub use state::{
    camera_motions, image_ratios, menu_view, offered_actions, video_ratios, DropTarget,
    GenerationRequest, LeafChoices, MenuAction, MenuCommand, MenuContext, MenuEvent, MenuLeaf,
    MenuState, MenuView, Transition, MAX_STORYBOARD_SHOTS,
};
