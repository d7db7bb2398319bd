pub mod catalog;
pub mod config;
pub mod engines;
pub mod error;
pub mod graph;
pub mod nodes;
pub mod types;

pub use engines::generation::{apply_batch, Genome, Offspring, Operator};
pub use engines::serialization::{deserialize_genome, serialize_genome};
pub use error::{GenomeError, Result};
pub use graph::{GraphBuilder, NodeGraph};
pub use nodes::{LineageCounter, LineageId, Node, NodeId, NodeKind};
