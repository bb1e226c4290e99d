pub mod edge;
pub mod handle;
pub mod node;
pub mod position;

pub use edge::*;
pub use handle::*;
pub use node::*;
pub use position::*;

/// Opaque, stable node identifier
pub type NodeId = String;
