use crate::types::{Activation, Dims, KernelSize, PoolType, Shape};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenseParams {
    pub units: usize,
    pub activation: Activation,
    pub use_bias: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conv2DParams {
    pub filters: usize,
    pub kernel_size: KernelSize,
    pub stride: usize,
    pub padding: usize,
    pub dilation: usize,
    pub use_bias: bool,
}

impl Conv2DParams {
    /// 1x1 convolution used to remap channels or subsample
    pub fn pointwise(filters: usize, stride: usize) -> Self {
        Self {
            filters,
            kernel_size: KernelSize::square(1),
            stride,
            padding: 0,
            dilation: 1,
            use_bias: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolingParams {
    pub pool_type: PoolType,
    pub kernel_size: KernelSize,
    pub stride: usize,
    pub padding: usize,
}

/// Closed set of layer and merge kinds a graph vertex can be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Input { shape: Shape },
    Output,
    Dense(DenseParams),
    Conv2D(Conv2DParams),
    Pooling(PoolingParams),
    Flatten,
    Add,
    Concat,
}

/// Coarse grouping used when swapping one layer for another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerFamily {
    Io,
    Dense,
    Convolution,
    Pooling,
    Reshape,
    Merge,
}

impl NodeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Input { .. } => "Input",
            NodeKind::Output => "Output",
            NodeKind::Dense(_) => "Dense",
            NodeKind::Conv2D(_) => "Conv2D",
            NodeKind::Pooling(_) => "Pooling",
            NodeKind::Flatten => "Flatten",
            NodeKind::Add => "Add",
            NodeKind::Concat => "Concat",
        }
    }

    pub fn family(&self) -> LayerFamily {
        match self {
            NodeKind::Input { .. } | NodeKind::Output => LayerFamily::Io,
            NodeKind::Dense(_) => LayerFamily::Dense,
            NodeKind::Conv2D(_) => LayerFamily::Convolution,
            NodeKind::Pooling(_) => LayerFamily::Pooling,
            NodeKind::Flatten => LayerFamily::Reshape,
            NodeKind::Add | NodeKind::Concat => LayerFamily::Merge,
        }
    }

    pub fn is_merging(&self) -> bool {
        matches!(self, NodeKind::Add | NodeKind::Concat)
    }

    pub fn is_input(&self) -> bool {
        matches!(self, NodeKind::Input { .. })
    }

    pub fn is_output(&self) -> bool {
        matches!(self, NodeKind::Output)
    }

    /// Rank this kind expects on its input. Output nodes expect whatever rank
    /// they were declared with, so the caller passes the node's current input shape.
    pub fn expected_input_dims(&self, current_input: &[usize]) -> Dims {
        match self {
            NodeKind::Input { .. } => Dims::Any,
            NodeKind::Output => {
                if current_input.is_empty() {
                    Dims::Any
                } else {
                    Dims::Rank(current_input.len())
                }
            }
            NodeKind::Dense(_) => Dims::Rank(1),
            NodeKind::Conv2D(_) | NodeKind::Pooling(_) | NodeKind::Flatten => Dims::Rank(3),
            NodeKind::Add => Dims::Any,
            NodeKind::Concat => Dims::Rank(3),
        }
    }

    pub fn output_dims(&self) -> Dims {
        match self {
            NodeKind::Input { shape } => Dims::Rank(shape.len()),
            NodeKind::Output | NodeKind::Add => Dims::Any,
            NodeKind::Dense(_) | NodeKind::Flatten => Dims::Rank(1),
            NodeKind::Conv2D(_) | NodeKind::Pooling(_) | NodeKind::Concat => Dims::Rank(3),
        }
    }

    /// Output shape for a single incoming tensor of shape `input`.
    ///
    /// Merge kinds fed by one predecessor pass their input through; the
    /// multi-predecessor rules live in the graph, which can see every source.
    /// A rank mismatch yields an empty shape and a collapsed spatial axis
    /// yields a zero, both of which `types::is_degenerate` reports.
    pub fn infer_output_shape(&self, input: &[usize]) -> Shape {
        match self {
            NodeKind::Input { shape } => shape.clone(),
            NodeKind::Output | NodeKind::Add | NodeKind::Concat => input.to_vec(),
            NodeKind::Dense(p) => vec![p.units],
            NodeKind::Flatten => {
                if input.len() != 3 {
                    return Vec::new();
                }
                match input.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)) {
                    Some(units) => vec![units],
                    None => Vec::new(),
                }
            }
            NodeKind::Conv2D(p) => {
                if input.len() != 3 {
                    return Vec::new();
                }
                vec![
                    window_extent(input[0], p.kernel_size.h, p.stride, p.padding, p.dilation),
                    window_extent(input[1], p.kernel_size.w, p.stride, p.padding, p.dilation),
                    p.filters,
                ]
            }
            NodeKind::Pooling(p) => {
                if input.len() != 3 {
                    return Vec::new();
                }
                vec![
                    window_extent(input[0], p.kernel_size.h, p.stride, p.padding, 1),
                    window_extent(input[1], p.kernel_size.w, p.stride, p.padding, 1),
                    input[2],
                ]
            }
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Input { shape } => write!(f, "Input{:?}", shape),
            NodeKind::Dense(p) => write!(f, "Dense({})", p.units),
            NodeKind::Conv2D(p) => write!(
                f,
                "Conv2D({}, {}x{}/{})",
                p.filters, p.kernel_size.h, p.kernel_size.w, p.stride
            ),
            NodeKind::Pooling(p) => write!(
                f,
                "Pooling({:?}, {}x{}/{})",
                p.pool_type, p.kernel_size.h, p.kernel_size.w, p.stride
            ),
            other => f.write_str(other.tag()),
        }
    }
}

/// `(in + 2·pad − dilation·(k−1) − 1) / stride + 1`, floored, clamped at zero.
/// Parameters large enough to overflow also collapse the axis to zero.
pub fn window_extent(input: usize, kernel: usize, stride: usize, padding: usize, dilation: usize) -> usize {
    let span = dilation
        .checked_mul(kernel.saturating_sub(1))
        .and_then(|s| s.checked_add(1));
    let padded = padding.checked_mul(2).and_then(|p| p.checked_add(input));
    let (Some(span), Some(padded)) = (span, padded) else {
        return 0;
    };
    if padded < span || stride == 0 {
        return 0;
    }
    (padded - span) / stride + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(filters: usize, k: usize, stride: usize, padding: usize, dilation: usize) -> NodeKind {
        NodeKind::Conv2D(Conv2DParams {
            filters,
            kernel_size: KernelSize::square(k),
            stride,
            padding,
            dilation,
            use_bias: true,
        })
    }

    #[test]
    fn test_conv_same_padding() {
        assert_eq!(conv(16, 3, 1, 1, 1).infer_output_shape(&[28, 28, 3]), vec![28, 28, 16]);
    }

    #[test]
    fn test_conv_strided_and_dilated() {
        // (32 + 0 - 2*2 - 1)/2 + 1 = 14
        assert_eq!(conv(8, 3, 2, 0, 2).infer_output_shape(&[32, 32, 3]), vec![14, 14, 8]);
    }

    #[test]
    fn test_pooling_halves_spatial() {
        let pool = NodeKind::Pooling(PoolingParams {
            pool_type: PoolType::Max,
            kernel_size: KernelSize::square(2),
            stride: 2,
            padding: 0,
        });
        assert_eq!(pool.infer_output_shape(&[28, 28, 16]), vec![14, 14, 16]);
    }

    #[test]
    fn test_flatten() {
        assert_eq!(NodeKind::Flatten.infer_output_shape(&[14, 14, 32]), vec![6272]);
        assert!(NodeKind::Flatten.infer_output_shape(&[10]).is_empty());
    }

    #[test]
    fn test_collapsed_window_is_zero() {
        assert_eq!(window_extent(1, 3, 1, 0, 1), 0);
    }

    #[test]
    fn test_huge_padding_collapses_instead_of_overflowing() {
        let mut params = Conv2DParams::pointwise(8, 1);
        params.padding = usize::MAX / 2 + 1;
        let shape = NodeKind::Conv2D(params).infer_output_shape(&[28, 28, 3]);
        assert_eq!(shape, vec![0, 0, 8]);
        assert!(crate::types::is_degenerate(&shape));
    }

    #[test]
    fn test_huge_dilation_collapses_instead_of_overflowing() {
        assert_eq!(window_extent(28, 3, 1, 1, usize::MAX), 0);
    }

    #[test]
    fn test_flatten_overflow_is_degenerate() {
        let big = 1usize << (usize::BITS / 2);
        assert!(NodeKind::Flatten.infer_output_shape(&[big, big, 2]).is_empty());
    }

    #[test]
    fn test_declared_dims() {
        assert_eq!(NodeKind::Flatten.expected_input_dims(&[]), Dims::Rank(3));
        assert_eq!(NodeKind::Flatten.output_dims(), Dims::Rank(1));
        assert_eq!(NodeKind::Add.expected_input_dims(&[4]), Dims::Any);
        assert_eq!(NodeKind::Output.expected_input_dims(&[10]), Dims::Rank(1));
    }
}
