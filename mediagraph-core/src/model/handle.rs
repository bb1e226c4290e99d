use std::fmt;
use std::str::FromStr;

use crate::errors::GraphError;

use super::NodeKind;

/// Number of fixed reference-image slots on a video node
pub const REFERENCE_SLOTS: usize = 3;

/// Named input on a target node that an edge can be wired into.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InputHandle {
    Prompt,
    StartImage,
    EndImage,
    Reference(usize),
    SourceVideo,
}

impl InputHandle {
    pub fn as_str(&self) -> String {
        match self {
            InputHandle::Prompt => "prompt".to_string(),
            InputHandle::StartImage => "start-image".to_string(),
            InputHandle::EndImage => "end-image".to_string(),
            InputHandle::Reference(slot) => format!("reference-{}", slot),
            InputHandle::SourceVideo => "source-video".to_string(),
        }
    }

    /// Slot handles carry a node id on the target (frames and references).
    pub fn is_slot(&self) -> bool {
        matches!(
            self,
            InputHandle::StartImage | InputHandle::EndImage | InputHandle::Reference(_)
        )
    }
}

impl fmt::Display for InputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl FromStr for InputHandle {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(InputHandle::Prompt),
            "start-image" => Ok(InputHandle::StartImage),
            "end-image" => Ok(InputHandle::EndImage),
            "source-video" => Ok(InputHandle::SourceVideo),
            other => {
                let slot = other
                    .strip_prefix("reference-")
                    .and_then(|slot| slot.parse::<usize>().ok())
                    .filter(|slot| *slot < REFERENCE_SLOTS)
                    .ok_or_else(|| GraphError::Validation(format!("unknown input handle '{}'", s)))?;
                Ok(InputHandle::Reference(slot))
            }
        }
    }
}

/// Whether a drag from a `source` node may be committed directly into
/// `handle` on a `target` node.
pub fn can_connect(source: NodeKind, target: NodeKind, handle: InputHandle) -> bool {
    matches!(
        (source, target, handle),
        (NodeKind::Image, NodeKind::Video, InputHandle::StartImage)
            | (NodeKind::Image, NodeKind::Video, InputHandle::EndImage)
            | (NodeKind::Image, NodeKind::Video, InputHandle::Reference(_))
            | (NodeKind::Image, NodeKind::Image, InputHandle::Reference(0))
            | (NodeKind::Text, NodeKind::Image, InputHandle::Prompt)
            | (NodeKind::Text, NodeKind::Video, InputHandle::Prompt)
            | (NodeKind::Video, NodeKind::Video, InputHandle::SourceVideo)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_slots() {
        assert_eq!("reference-2".parse::<InputHandle>().unwrap(), InputHandle::Reference(2));
        assert!("reference-3".parse::<InputHandle>().is_err());
        assert!("reference-x".parse::<InputHandle>().is_err());
    }

    #[test]
    fn test_compatibility_table() {
        assert!(can_connect(NodeKind::Image, NodeKind::Video, InputHandle::Reference(2)));
        assert!(can_connect(NodeKind::Text, NodeKind::Video, InputHandle::Prompt));
        assert!(!can_connect(NodeKind::Video, NodeKind::Image, InputHandle::Reference(0)));
        assert!(!can_connect(NodeKind::Audio, NodeKind::Video, InputHandle::StartImage));
        assert!(!can_connect(NodeKind::Image, NodeKind::Image, InputHandle::Reference(1)));
    }

    #[test]
    fn test_display_matches_parse() {
        for handle in [
            InputHandle::Prompt,
            InputHandle::StartImage,
            InputHandle::EndImage,
            InputHandle::Reference(1),
            InputHandle::SourceVideo,
        ] {
            assert_eq!(handle.to_string().parse::<InputHandle>().unwrap(), handle);
        }
    }
}
