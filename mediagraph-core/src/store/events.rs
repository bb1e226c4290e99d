use crate::model::NodeStatus;

/// Change notification broadcast after every graph mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphEvent {
    NodeAdded { id: String },
    NodeUpdated { id: String, status: NodeStatus },
    NodeRemoved { id: String },
    EdgeUpserted { id: String },
    EdgeRemoved { id: String },
    /// The whole graph was swapped for a restored snapshot
    Replaced,
    Cleared,
}

impl GraphEvent {
    pub fn node_id(&self) -> Option<&str> {
        match self {
            GraphEvent::NodeAdded { id }
            | GraphEvent::NodeUpdated { id, .. }
            | GraphEvent::NodeRemoved { id } => Some(id),
            _ => None,
        }
    }
}
