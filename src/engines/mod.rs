pub mod generation;
pub mod serialization;
