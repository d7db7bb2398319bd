pub mod adapter;
pub mod batch;
pub mod crossover;
pub mod genome;
pub mod mutation;
pub mod sampler;
pub mod subgraph;

pub use adapter::{create_adapter, resolve_link, AdapterPlan};
pub use batch::{apply_batch, Operator};
pub use crossover::{breed, breed_by_replacement, breed_multi_point, breed_neat_style};
pub use genome::{Genome, Offspring};
pub use mutation::{
    mutate_add_node, mutate_add_skip_connection, mutate_change_layer_type, mutate_parameters, mutate_remove_node,
};
pub use subgraph::{find_insertion_point, linear_chains, random_subgraph, Fragment, InsertionPoint};
