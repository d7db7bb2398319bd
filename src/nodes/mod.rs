pub mod kind;
pub mod lineage;
pub mod node;
pub mod resources;

pub use kind::{Conv2DParams, DenseParams, LayerFamily, NodeKind, PoolingParams};
pub use lineage::{LineageCounter, LineageId};
pub use node::{Node, NodeId};
pub use resources::node_resources;
