use super::kind::NodeKind;
use crate::types::{element_count, ResourceCriteria};

/// Analytic cost of one node given its current shapes
pub fn node_resources(kind: &NodeKind, input: &[usize], output: &[usize], dtype_bytes: u64) -> ResourceCriteria {
    let in_elems = element_count(input) as u64;
    let out_elems = element_count(output) as u64;

    match kind {
        NodeKind::Conv2D(p) => {
            let in_channels = input.get(2).copied().unwrap_or(0) as u64;
            let window = (p.kernel_size.area() as u64).saturating_mul(in_channels);
            let bias = u64::from(p.use_bias);
            ResourceCriteria {
                flash: (p.filters as u64)
                    .saturating_mul(window.saturating_add(bias))
                    .saturating_mul(dtype_bytes),
                ram: in_elems.saturating_add(out_elems).saturating_mul(dtype_bytes),
                macs: out_elems.saturating_mul(window),
            }
        }
        NodeKind::Pooling(p) => ResourceCriteria {
            flash: 0,
            ram: in_elems.saturating_add(out_elems).saturating_mul(dtype_bytes),
            macs: out_elems.saturating_mul((p.kernel_size.area() as u64).saturating_sub(1)),
        },
        NodeKind::Dense(p) => {
            let units = p.units as u64;
            let bias = u64::from(p.use_bias);
            ResourceCriteria {
                flash: units.saturating_mul(in_elems.saturating_add(bias)).saturating_mul(dtype_bytes),
                ram: in_elems.saturating_add(units).saturating_mul(dtype_bytes),
                macs: in_elems.saturating_mul(units),
            }
        }
        NodeKind::Input { .. }
        | NodeKind::Output
        | NodeKind::Flatten
        | NodeKind::Add
        | NodeKind::Concat => ResourceCriteria::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::kind::{Conv2DParams, DenseParams};
    use crate::types::{Activation, KernelSize};

    #[test]
    fn test_conv_resources() {
        let kind = NodeKind::Conv2D(Conv2DParams {
            filters: 16,
            kernel_size: KernelSize::square(3),
            stride: 1,
            padding: 1,
            dilation: 1,
            use_bias: true,
        });
        let r = node_resources(&kind, &[28, 28, 3], &[28, 28, 16], 4);

        assert_eq!(r.flash, 16 * (3 * 3 * 3 + 1) * 4);
        assert_eq!(r.ram, (28 * 28 * 3 + 28 * 28 * 16) * 4);
        assert_eq!(r.macs, 28 * 28 * 16 * 27);
    }

    #[test]
    fn test_dense_resources_without_bias() {
        let kind = NodeKind::Dense(DenseParams {
            units: 10,
            activation: Activation::Linear,
            use_bias: false,
        });
        let r = node_resources(&kind, &[128], &[10], 2);

        assert_eq!(r.flash, 10 * 128 * 2);
        assert_eq!(r.ram, (128 + 10) * 2);
        assert_eq!(r.macs, 1280);
    }

    #[test]
    fn test_oversized_dense_saturates() {
        let kind = NodeKind::Dense(DenseParams {
            units: usize::MAX,
            activation: Activation::Relu,
            use_bias: true,
        });
        let r = node_resources(&kind, &[usize::MAX, usize::MAX, 4], &[usize::MAX], 4);

        assert_eq!(r.flash, u64::MAX);
        assert_eq!(r.macs, u64::MAX);
        assert_eq!((r + r).ram, u64::MAX);
    }

    #[test]
    fn test_structural_nodes_are_free() {
        let r = node_resources(&NodeKind::Flatten, &[4, 4, 2], &[32], 4);
        assert_eq!(r, ResourceCriteria::default());
    }
}
