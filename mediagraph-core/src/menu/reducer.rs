use super::state::{
    image_ratios, offered_actions, video_ratios, DropTarget, GenerationRequest, MenuAction,
    MenuCommand, MenuContext, MenuEvent, MenuState, Transition, MAX_STORYBOARD_SHOTS,
};
use crate::model::can_connect;

/// Pure transition function for the connection menu.
///
/// Events that make no sense in the current state leave it unchanged and
/// produce no command.
pub fn reduce(state: &MenuState, event: MenuEvent) -> Transition {
    match event {
        MenuEvent::Cancel => Transition::to(MenuState::Idle),
        MenuEvent::DragRelease {
            source_id,
            source_kind,
            target,
        } => match target {
            DropTarget::Canvas { position } => {
                if offered_actions(source_kind).is_empty() {
                    Transition::to(MenuState::Idle)
                } else {
                    Transition::to(MenuState::MenuOpen(MenuContext {
                        source_id,
                        source_kind,
                        anchor: position,
                    }))
                }
            }
            DropTarget::NodeInput {
                node_id,
                node_kind,
                handle,
            } => {
                if node_id != source_id && can_connect(source_kind, node_kind, handle) {
                    Transition::commit(MenuCommand::Connect {
                        source: source_id,
                        target: node_id,
                        handle,
                    })
                } else {
                    Transition::stay(state)
                }
            }
        },
        MenuEvent::ChooseAction(action) => match state {
            MenuState::MenuOpen(context)
                if offered_actions(context.source_kind).contains(&action) =>
            {
                Transition::to(enter_leaf(context.clone(), action))
            }
            _ => Transition::stay(state),
        },
        MenuEvent::Back => match state.context() {
            Some(context) if state.submenu().is_some() => {
                Transition::to(MenuState::MenuOpen(context.clone()))
            }
            _ => Transition::stay(state),
        },
        MenuEvent::PickRatio(ratio) => match state {
            MenuState::ImageRatioPick(context) if image_ratios().contains(&ratio) => {
                let mut request = GenerationRequest::new(MenuAction::GenerateImage, context);
                request.aspect_ratio = ratio;
                Transition::commit(MenuCommand::Generate(request))
            }
            MenuState::VideoRatioPick(context) if video_ratios().contains(&ratio) => {
                let mut request = GenerationRequest::new(MenuAction::GenerateVideo, context);
                request.aspect_ratio = ratio;
                Transition::commit(MenuCommand::Generate(request))
            }
            _ => Transition::stay(state),
        },
        MenuEvent::PickShotCount(count) => match state {
            MenuState::ShotCountPick(context) if (1..=MAX_STORYBOARD_SHOTS).contains(&count) => {
                let mut request = GenerationRequest::new(MenuAction::AutoStoryboard, context);
                request.shot_count = Some(count);
                Transition::commit(MenuCommand::Generate(request))
            }
            _ => Transition::stay(state),
        },
        MenuEvent::SubmitPrompt(prompt) => match state {
            MenuState::PromptEntry { context, action } if !prompt.trim().is_empty() => {
                let mut request = GenerationRequest::new(*action, context);
                request.prompt = Some(prompt.trim().to_string());
                Transition::commit(MenuCommand::Generate(request))
            }
            _ => Transition::stay(state),
        },
        MenuEvent::PickCamera(motion) => match state {
            MenuState::CameraControlPick(context) => {
                let mut request = GenerationRequest::new(MenuAction::CameraControl, context);
                request.camera_motion = Some(motion);
                Transition::commit(MenuCommand::Generate(request))
            }
            _ => Transition::stay(state),
        },
    }
}

fn enter_leaf(context: MenuContext, action: MenuAction) -> MenuState {
    match action {
        MenuAction::GenerateImage => MenuState::ImageRatioPick(context),
        MenuAction::GenerateVideo => MenuState::VideoRatioPick(context),
        MenuAction::AutoStoryboard => MenuState::ShotCountPick(context),
        MenuAction::CameraControl => MenuState::CameraControlPick(context),
        MenuAction::CustomNextShot | MenuAction::ExtendVideo => {
            MenuState::PromptEntry { context, action }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::menu::state::{menu_view, LeafChoices, MenuLeaf};
    use crate::model::{AspectRatio, CameraMotion, InputHandle, NodeKind, Position};

    fn open_menu(kind: NodeKind) -> MenuState {
        reduce(
            &MenuState::Idle,
            MenuEvent::DragRelease {
                source_id: "src".to_string(),
                source_kind: kind,
                target: DropTarget::Canvas {
                    position: Position::new(100.0, 50.0),
                },
            },
        )
        .state
    }

    #[test]
    fn test_offered_actions_by_kind() {
        let generation = [
            MenuAction::GenerateImage,
            MenuAction::GenerateVideo,
            MenuAction::AutoStoryboard,
            MenuAction::CustomNextShot,
        ];
        assert_eq!(offered_actions(NodeKind::Text), generation);
        assert_eq!(offered_actions(NodeKind::Image), generation);
        assert_eq!(
            offered_actions(NodeKind::Video),
            [MenuAction::CameraControl, MenuAction::ExtendVideo]
        );
        assert!(offered_actions(NodeKind::Audio).is_empty());
        assert!(offered_actions(NodeKind::Note).is_empty());
    }

    #[test]
    fn test_action_leaves() {
        let cases = [
            (MenuAction::GenerateImage, MenuLeaf::ImageRatioPick),
            (MenuAction::GenerateVideo, MenuLeaf::VideoRatioPick),
            (MenuAction::AutoStoryboard, MenuLeaf::ShotCountPick),
            (MenuAction::CustomNextShot, MenuLeaf::PromptEntry),
            (MenuAction::CameraControl, MenuLeaf::CameraControlPick),
            (MenuAction::ExtendVideo, MenuLeaf::PromptEntry),
        ];
        for (action, leaf) in cases {
            assert_eq!(action.leaf(), leaf);
            let source = if matches!(action, MenuAction::CameraControl | MenuAction::ExtendVideo) {
                NodeKind::Video
            } else {
                NodeKind::Image
            };
            let state = reduce(&open_menu(source), MenuEvent::ChooseAction(action)).state;
            assert_eq!(state.submenu(), Some(leaf), "{}", action);
        }
    }

    #[test]
    fn test_canvas_drop_opens_menu_at_release_point() {
        let state = open_menu(NodeKind::Text);
        let context = state.context().unwrap();
        assert_eq!(context.anchor, Position::new(100.0, 50.0));
        assert_eq!(context.source_id, "src");
    }

    #[test]
    fn test_canvas_drop_without_actions_stays_idle() {
        assert!(open_menu(NodeKind::Audio).is_idle());
        assert!(open_menu(NodeKind::Note).is_idle());
    }

    #[test]
    fn test_compatible_input_connects_without_menu() {
        let transition = reduce(
            &MenuState::Idle,
            MenuEvent::DragRelease {
                source_id: "img".to_string(),
                source_kind: NodeKind::Image,
                target: DropTarget::NodeInput {
                    node_id: "vid".to_string(),
                    node_kind: NodeKind::Video,
                    handle: InputHandle::StartImage,
                },
            },
        );
        assert!(transition.state.is_idle());
        assert_eq!(
            transition.command,
            Some(MenuCommand::Connect {
                source: "img".to_string(),
                target: "vid".to_string(),
                handle: InputHandle::StartImage,
            })
        );
    }

    #[test]
    fn test_incompatible_input_is_a_noop() {
        let transition = reduce(
            &MenuState::Idle,
            MenuEvent::DragRelease {
                source_id: "vid".to_string(),
                source_kind: NodeKind::Video,
                target: DropTarget::NodeInput {
                    node_id: "img".to_string(),
                    node_kind: NodeKind::Image,
                    handle: InputHandle::Reference(0),
                },
            },
        );
        assert!(transition.state.is_idle());
        assert!(transition.command.is_none());
    }

    #[test]
    fn test_video_menu_rejects_image_actions() {
        let state = open_menu(NodeKind::Video);
        let transition = reduce(&state, MenuEvent::ChooseAction(MenuAction::GenerateImage));
        assert_eq!(transition.state, state);
        assert!(transition.command.is_none());
    }

    #[test]
    fn test_back_returns_to_root() {
        let root = open_menu(NodeKind::Image);
        let leaf = reduce(&root, MenuEvent::ChooseAction(MenuAction::GenerateVideo)).state;
        assert_eq!(reduce(&leaf, MenuEvent::Back).state, root);
        assert_eq!(reduce(&root, MenuEvent::Back).state, root);
    }

    #[test]
    fn test_cancel_from_any_state() {
        let root = open_menu(NodeKind::Text);
        let leaf = reduce(&root, MenuEvent::ChooseAction(MenuAction::CustomNextShot)).state;
        for state in [MenuState::Idle, root, leaf] {
            let transition = reduce(&state, MenuEvent::Cancel);
            assert!(transition.state.is_idle());
            assert!(transition.command.is_none());
        }
    }

    #[test]
    fn test_ratio_pick_commits_generation() {
        let root = open_menu(NodeKind::Text);
        let leaf = reduce(&root, MenuEvent::ChooseAction(MenuAction::GenerateImage)).state;
        let transition = reduce(&leaf, MenuEvent::PickRatio(AspectRatio::Square));

        assert!(transition.state.is_idle());
        let Some(MenuCommand::Generate(request)) = transition.command else {
            panic!("expected a generate command");
        };
        assert_eq!(request.action, MenuAction::GenerateImage);
        assert_eq!(request.aspect_ratio, AspectRatio::Square);
        assert_eq!(request.anchor, Position::new(100.0, 50.0));
    }

    #[test]
    fn test_video_leaf_rejects_unsupported_ratio() {
        let root = open_menu(NodeKind::Image);
        let leaf = reduce(&root, MenuEvent::ChooseAction(MenuAction::GenerateVideo)).state;
        let transition = reduce(&leaf, MenuEvent::PickRatio(AspectRatio::Classic));
        assert_eq!(transition.state, leaf);
        assert!(transition.command.is_none());
    }

    #[test]
    fn test_blank_prompt_keeps_entry_open() {
        let root = open_menu(NodeKind::Video);
        let leaf = reduce(&root, MenuEvent::ChooseAction(MenuAction::ExtendVideo)).state;
        let transition = reduce(&leaf, MenuEvent::SubmitPrompt("   ".to_string()));
        assert_eq!(transition.state, leaf);

        let transition = reduce(&leaf, MenuEvent::SubmitPrompt(" slow pan ".to_string()));
        let Some(MenuCommand::Generate(request)) = transition.command else {
            panic!("expected a generate command");
        };
        assert_eq!(request.action, MenuAction::ExtendVideo);
        assert_eq!(request.prompt.as_deref(), Some("slow pan"));
    }

    #[test]
    fn test_shot_count_bounds() {
        let root = open_menu(NodeKind::Text);
        let leaf = reduce(&root, MenuEvent::ChooseAction(MenuAction::AutoStoryboard)).state;
        assert!(reduce(&leaf, MenuEvent::PickShotCount(0)).command.is_none());
        assert!(reduce(&leaf, MenuEvent::PickShotCount(MAX_STORYBOARD_SHOTS + 1))
            .command
            .is_none());

        let transition = reduce(&leaf, MenuEvent::PickShotCount(3));
        let Some(MenuCommand::Generate(request)) = transition.command else {
            panic!("expected a generate command");
        };
        assert_eq!(request.shot_count, Some(3));
    }

    #[test]
    fn test_camera_pick_commits() {
        let root = open_menu(NodeKind::Video);
        let leaf = reduce(&root, MenuEvent::ChooseAction(MenuAction::CameraControl)).state;
        let transition = reduce(&leaf, MenuEvent::PickCamera(CameraMotion::Orbit));
        let Some(MenuCommand::Generate(request)) = transition.command else {
            panic!("expected a generate command");
        };
        assert_eq!(request.camera_motion, Some(CameraMotion::Orbit));
    }

    #[test]
    fn test_commit_events_outside_their_leaf_are_ignored() {
        let root = open_menu(NodeKind::Text);
        assert!(reduce(&root, MenuEvent::PickRatio(AspectRatio::Square))
            .command
            .is_none());
        assert!(reduce(&MenuState::Idle, MenuEvent::PickCamera(CameraMotion::Static))
            .state
            .is_idle());
    }

    #[test]
    fn test_menu_view_per_submenu() {
        let root = menu_view(NodeKind::Video, None);
        assert_eq!(root.leaf, None);
        assert_eq!(root.actions.len(), 2);

        let leaf = menu_view(NodeKind::Image, Some(MenuLeaf::VideoRatioPick));
        assert!(leaf.actions.is_empty());
        assert_eq!(
            leaf.choices,
            Some(LeafChoices::Ratios(vec![
                AspectRatio::Landscape,
                AspectRatio::Portrait
            ]))
        );
    }
}
