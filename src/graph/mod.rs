pub mod builder;
pub mod node_graph;

pub use builder::GraphBuilder;
pub use node_graph::NodeGraph;
