use crate::nodes::{Conv2DParams, DenseParams, LineageCounter, Node, NodeKind, PoolingParams};
use crate::types::{is_degenerate, Activation, KernelSize, PoolType, Shape};

/// Outcome of bridging one tensor shape to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterPlan {
    /// Shapes already line up, nothing to insert
    Direct,
    /// Insert these layers, in order, between source and target
    Chain(Vec<NodeKind>),
    Unbridgeable,
}

/// Rule table turning a `(from, to)` shape pair into bridging layers.
///
/// Spatial upsampling and 1-D to 3-D reshapes are not supported.
pub fn create_adapter(from: &[usize], to: &[usize]) -> AdapterPlan {
    match (from.len(), to.len()) {
        (3, 3) => spatial_adapter(from, to),
        (3, 1) => AdapterPlan::Chain(vec![NodeKind::Flatten]),
        (1, 1) if from == to => AdapterPlan::Direct,
        (1, 1) => AdapterPlan::Chain(vec![NodeKind::Dense(DenseParams {
            units: to[0],
            activation: Activation::Linear,
            use_bias: false,
        })]),
        _ => AdapterPlan::Unbridgeable,
    }
}

fn spatial_adapter(from: &[usize], to: &[usize]) -> AdapterPlan {
    let (from_h, from_w, from_c) = (from[0], from[1], from[2]);
    let (to_h, to_w, to_c) = (to[0], to[1], to[2]);
    let mut chain = Vec::new();

    if (from_h, from_w) != (to_h, to_w) {
        if from_h < to_h || from_w < to_w || to_h == 0 || to_w == 0 {
            return AdapterPlan::Unbridgeable;
        }

        let ratio = (from_h as f64 / to_h as f64).min(from_w as f64 / to_w as f64);
        let stride = (ratio.floor() as usize).max(2);
        let pool = NodeKind::Pooling(PoolingParams {
            pool_type: PoolType::Max,
            kernel_size: KernelSize::square(stride),
            stride,
            padding: 0,
        });
        let pooled = pool.infer_output_shape(from);
        chain.push(pool);

        if pooled.len() == 3 && (pooled[0], pooled[1]) != (to_h, to_w) {
            let remaining = (pooled[0] as f64 / to_h as f64).min(pooled[1] as f64 / to_w as f64);
            let conv_stride = (remaining.floor() as usize).max(1);
            chain.push(NodeKind::Conv2D(Conv2DParams::pointwise(from_c, conv_stride)));
        }
    }

    if from_c != to_c {
        chain.push(NodeKind::Conv2D(Conv2DParams::pointwise(to_c, 1)));
    }

    if chain.is_empty() {
        AdapterPlan::Direct
    } else {
        AdapterPlan::Chain(chain)
    }
}

/// Shape produced by running `input` through `kinds` in order
pub fn simulate_chain(kinds: &[NodeKind], input: &[usize]) -> Shape {
    kinds
        .iter()
        .fold(input.to_vec(), |shape, kind| kind.infer_output_shape(&shape))
}

/// Layers needed so that a source of `source_kind` emitting `source_output`
/// can feed `target`.
///
/// `Some(vec![])` means a direct edge is legal. A chain is only returned when
/// its simulated output is actually accepted by the target, so callers can
/// treat `None` as "this connection point is invalid".
pub fn resolve_link(
    source_kind: &NodeKind,
    source_output: &[usize],
    target: &Node,
    tentative: bool,
) -> Option<Vec<NodeKind>> {
    if target.accepts(source_kind, source_output, tentative) {
        return Some(Vec::new());
    }
    if target.kind().is_input() || source_kind.is_output() {
        return None;
    }

    match create_adapter(source_output, &adapter_target(target, source_output)) {
        AdapterPlan::Chain(kinds) => {
            let bridged = simulate_chain(&kinds, source_output);
            let last = kinds.last()?;
            (!is_degenerate(&bridged) && target.accepts(last, &bridged, tentative)).then_some(kinds)
        }
        AdapterPlan::Direct | AdapterPlan::Unbridgeable => None,
    }
}

/// Shape an adapter chain must produce to feed `target`.
///
/// A Concat only constrains height and width, so the source keeps its channels.
fn adapter_target(target: &Node, source_output: &[usize]) -> Shape {
    let expected = target.input_shape();
    match target.kind() {
        NodeKind::Concat if expected.len() == 3 && source_output.len() == 3 => {
            vec![expected[0], expected[1], source_output[2]]
        }
        _ => expected.to_vec(),
    }
}

/// Fresh nodes for an adapter chain, each stamped with a new lineage id
pub fn materialize(kinds: Vec<NodeKind>, lineage: &LineageCounter) -> Vec<Node> {
    kinds.into_iter().map(|kind| Node::new(kind, lineage)).collect()
}
