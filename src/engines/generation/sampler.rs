use crate::config::{LayerSamplingConfig, MutationOptions};
use crate::nodes::{Conv2DParams, DenseParams, NodeKind, PoolingParams};
use crate::types::{Activation, KernelSize, PoolType};
use rand::seq::SliceRandom;
use rand::Rng;

const DILATIONS: [usize; 4] = [1, 2, 4, 8];
const POOL_KERNELS: [usize; 3] = [2, 4, 6];
const MUTABLE_ACTIVATIONS: [Activation; 3] = [Activation::Relu, Activation::LeakyRelu, Activation::Softmax];

/// Shape-preserving convolution with a sampled filter count and kernel
pub fn random_conv<R: Rng>(layers: &LayerSamplingConfig, rng: &mut R) -> NodeKind {
    let filters = layers.conv_filters.choose(rng).copied().unwrap_or(16);
    let kernel = layers.conv_kernel_sizes.choose(rng).copied().unwrap_or(3);
    NodeKind::Conv2D(Conv2DParams {
        filters,
        kernel_size: KernelSize::square(kernel),
        stride: 1,
        padding: kernel / 2,
        dilation: 1,
        use_bias: true,
    })
}

pub fn random_pooling<R: Rng>(layers: &LayerSamplingConfig, rng: &mut R) -> NodeKind {
    let pool_type = if rng.gen_bool(0.5) { PoolType::Max } else { PoolType::Avg };
    NodeKind::Pooling(PoolingParams {
        pool_type,
        kernel_size: KernelSize::square(layers.pool_kernel),
        stride: layers.pool_stride,
        padding: 0,
    })
}

pub fn random_dense<R: Rng>(layers: &LayerSamplingConfig, rng: &mut R) -> NodeKind {
    NodeKind::Dense(DenseParams {
        units: layers.dense_units.choose(rng).copied().unwrap_or(32),
        activation: Activation::Relu,
        use_bias: true,
    })
}

/// New layer for a tensor of the given rank: convolution or pooling for
/// feature maps, dense for vectors
pub fn random_layer<R: Rng>(rank: usize, layers: &LayerSamplingConfig, rng: &mut R) -> Option<NodeKind> {
    match rank {
        3 if rng.gen_bool(layers.conv_probability.clamp(0.0, 1.0)) => Some(random_conv(layers, rng)),
        3 => Some(random_pooling(layers, rng)),
        1 => Some(random_dense(layers, rng)),
        _ => None,
    }
}

/// A layer from a different family that takes the same input rank.
///
/// Only convolution and pooling can stand in for each other; a dense layer has
/// no alternative among vector layers.
pub fn random_replacement<R: Rng>(current: &NodeKind, layers: &LayerSamplingConfig, rng: &mut R) -> Option<NodeKind> {
    match current {
        NodeKind::Conv2D(_) => Some(random_pooling(layers, rng)),
        NodeKind::Pooling(_) => Some(random_conv(layers, rng)),
        _ => None,
    }
}

fn roll<R: Rng>(rng: &mut R, probability: f64) -> bool {
    probability > 0.0 && rng.gen_bool(probability.min(1.0))
}

/// Resample hyperparameters of `kind` according to `options`; `None` when nothing changed
pub fn mutate_kind<R: Rng>(kind: &NodeKind, options: &MutationOptions, rng: &mut R) -> Option<NodeKind> {
    let mutated = match kind {
        NodeKind::Conv2D(p) => {
            let mut p = p.clone();
            if roll(rng, options.conv2d_filters) {
                p.filters = 4 * rng.gen_range(4..=16);
            }
            if roll(rng, options.conv2d_kernel_size) {
                p.kernel_size = KernelSize::square(1 + 2 * rng.gen_range(0..=3));
            }
            if roll(rng, options.conv2d_stride_size) {
                p.stride = rng.gen_range(1..=2);
            }
            if roll(rng, options.conv2d_padding) {
                p.padding = rng.gen_range(1..=2);
            }
            if roll(rng, options.conv2d_dilation) {
                p.dilation = DILATIONS[rng.gen_range(0..DILATIONS.len())];
            }
            if roll(rng, options.conv2d_use_bias) {
                p.use_bias = !p.use_bias;
            }
            NodeKind::Conv2D(p)
        }
        NodeKind::Pooling(p) => {
            let mut p = p.clone();
            if roll(rng, options.pooling_pool_type) {
                p.pool_type = match p.pool_type {
                    PoolType::Max => PoolType::Avg,
                    PoolType::Avg => PoolType::Max,
                };
            }
            if roll(rng, options.pooling_kernel_size) {
                p.kernel_size = KernelSize::square(POOL_KERNELS[rng.gen_range(0..POOL_KERNELS.len())]);
            }
            NodeKind::Pooling(p)
        }
        NodeKind::Dense(p) => {
            let mut p = p.clone();
            if roll(rng, options.dense_units) {
                p.units = 1usize << rng.gen_range(4..=12u32);
            }
            if roll(rng, options.dense_activation) {
                p.activation = MUTABLE_ACTIVATIONS[rng.gen_range(0..MUTABLE_ACTIVATIONS.len())];
            }
            if roll(rng, options.dense_use_bias) {
                p.use_bias = !p.use_bias;
            }
            NodeKind::Dense(p)
        }
        _ => return None,
    };

    (mutated != *kind).then_some(mutated)
}
