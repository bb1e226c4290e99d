//! In-memory graph store: the source of truth for nodes and edges.

mod events;
mod graph_store;
mod handle;
mod patch;

pub use events::GraphEvent;
pub use graph_store::GraphStore;
pub use handle::GraphHandle;
pub use patch::NodePatch;
