use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Tensor shape: `[units]` for flat vectors, `[height, width, channels]` for feature maps.
pub type Shape = Vec<usize>;

/// Declared dimensionality of a node's input or output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dims {
    Any,
    Rank(usize),
}

impl Dims {
    /// Two declarations agree unless both are specific and differ
    pub fn agrees_with(self, other: Dims) -> bool {
        match (self, other) {
            (Dims::Rank(a), Dims::Rank(b)) => a == b,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelSize {
    pub h: usize,
    pub w: usize,
}

impl KernelSize {
    pub fn square(size: usize) -> Self {
        Self { h: size, w: size }
    }

    pub fn area(&self) -> usize {
        self.h.saturating_mul(self.w)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    Max,
    Avg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    LeakyRelu,
    Softmax,
    Linear,
}

/// Resource cost of a node or a whole genome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCriteria {
    /// Parameter storage in bytes
    pub flash: u64,
    /// Peak activation memory in bytes
    pub ram: u64,
    /// Multiply-accumulate operations
    pub macs: u64,
}

impl Add for ResourceCriteria {
    type Output = ResourceCriteria;

    fn add(self, rhs: Self) -> Self::Output {
        ResourceCriteria {
            flash: self.flash.saturating_add(rhs.flash),
            ram: self.ram.saturating_add(rhs.ram),
            macs: self.macs.saturating_add(rhs.macs),
        }
    }
}

impl AddAssign for ResourceCriteria {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Totals for a genome plus its node count
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeResources {
    pub totals: ResourceCriteria,
    pub node_count: usize,
}

/// Number of elements in a shape; an unknown (empty) shape counts as zero.
/// Saturates rather than wrapping on absurd shapes.
pub fn element_count(shape: &[usize]) -> usize {
    if shape.is_empty() {
        0
    } else {
        shape.iter().fold(1usize, |acc, &d| acc.saturating_mul(d))
    }
}

/// Shapes that no layer can legally produce: unknown, wrong rank, or a collapsed axis
pub fn is_degenerate(shape: &[usize]) -> bool {
    !(shape.len() == 1 || shape.len() == 3) || shape.iter().any(|&d| d == 0)
}
