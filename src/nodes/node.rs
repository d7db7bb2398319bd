use super::kind::NodeKind;
use super::lineage::{LineageCounter, LineageId};
use super::resources::node_resources;
use crate::types::{Dims, ResourceCriteria, Shape};
use std::fmt;
use uuid::Uuid;

/// Index of a node inside the arena of the graph that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A graph vertex: one layer or merge operation.
///
/// Adjacency is stored as arena indices and is only ever edited through
/// [`crate::graph::NodeGraph`], which keeps both directions in sync and
/// re-derives shapes after every change.
#[derive(Debug)]
pub struct Node {
    id: Uuid,
    lineage_id: LineageId,
    kind: NodeKind,
    pub(crate) predecessors: Vec<NodeId>,
    pub(crate) successors: Vec<NodeId>,
    pub(crate) input_shape: Shape,
    pub(crate) output_shape: Shape,
}

impl Node {
    pub fn new(kind: NodeKind, lineage: &LineageCounter) -> Self {
        let input_shape = match &kind {
            NodeKind::Input { shape } => shape.clone(),
            _ => Vec::new(),
        };
        Self::with_input_shape(kind, input_shape, lineage)
    }

    /// Fresh node whose input shape is known before it is wired
    pub fn with_input_shape(kind: NodeKind, input_shape: Shape, lineage: &LineageCounter) -> Self {
        let output_shape = kind.infer_output_shape(&input_shape);
        Self {
            id: Uuid::new_v4(),
            lineage_id: lineage.next_id(),
            kind,
            predecessors: Vec::new(),
            successors: Vec::new(),
            input_shape,
            output_shape,
        }
    }

    pub fn input(shape: Shape, lineage: &LineageCounter) -> Self {
        Self::new(NodeKind::Input { shape }, lineage)
    }

    pub fn output(declared: Shape, lineage: &LineageCounter) -> Self {
        Self::with_input_shape(NodeKind::Output, declared, lineage)
    }

    /// Used by the decoder so persisted lineage ids survive a round trip
    pub(crate) fn with_lineage(mut self, lineage_id: LineageId) -> Self {
        self.lineage_id = lineage_id;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn lineage_id(&self) -> LineageId {
        self.lineage_id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }

    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    pub fn is_merging(&self) -> bool {
        self.kind.is_merging()
    }

    /// Exactly one way in and one way out
    pub fn is_linear(&self) -> bool {
        self.predecessors.len() == 1 && self.successors.len() == 1
    }

    pub fn resources(&self, dtype_bytes: u64) -> ResourceCriteria {
        node_resources(&self.kind, &self.input_shape, &self.output_shape, dtype_bytes)
    }

    /// Same variant and parameters, same lineage, same shape snapshot, new
    /// identity and no adjacency.
    pub fn clone_detached(&self) -> Node {
        Node {
            id: Uuid::new_v4(),
            lineage_id: self.lineage_id,
            kind: self.kind.clone(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            input_shape: self.input_shape.clone(),
            output_shape: self.output_shape.clone(),
        }
    }

    /// Detached clone carrying new hyperparameters but the same lineage
    pub(crate) fn clone_with_kind(&self, kind: NodeKind) -> Node {
        let output_shape = kind.infer_output_shape(&self.input_shape);
        Node {
            kind,
            output_shape,
            ..self.clone_detached()
        }
    }

    /// Whether an edge from `source` into this node is legal.
    ///
    /// `tentative` means one existing incoming edge is about to be replaced
    /// rather than joined by the new one.
    pub fn can_accept_connection_from(&self, source: &Node, tentative: bool) -> bool {
        self.accepts(&source.kind, &source.output_shape, tentative)
    }

    /// Same as [`Node::can_accept_connection_from`] for a source that does not
    /// exist yet, described only by its kind and the shape it would emit.
    pub fn accepts(&self, source_kind: &NodeKind, source_output: &[usize], tentative: bool) -> bool {
        if self.kind.is_input() || source_kind.is_output() {
            return false;
        }

        let remaining = if tentative {
            self.predecessors.len().saturating_sub(1)
        } else {
            self.predecessors.len()
        };
        if !self.kind.is_merging() && remaining > 0 {
            return false;
        }

        let declared = match source_kind.output_dims() {
            Dims::Any if !source_output.is_empty() => Dims::Rank(source_output.len()),
            dims => dims,
        };
        if !declared.agrees_with(self.kind.expected_input_dims(&self.input_shape)) {
            return false;
        }

        match self.kind {
            NodeKind::Add if remaining > 0 => source_output == self.input_shape.as_slice(),
            NodeKind::Concat if remaining > 0 => {
                source_output.len() == 3
                    && self.input_shape.len() == 3
                    && source_output[..2] == self.input_shape[..2]
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::kind::{Conv2DParams, DenseParams};
    use crate::types::{Activation, KernelSize};

    fn conv(lineage: &LineageCounter) -> Node {
        Node::with_input_shape(
            NodeKind::Conv2D(Conv2DParams {
                filters: 16,
                kernel_size: KernelSize::square(3),
                stride: 1,
                padding: 1,
                dilation: 1,
                use_bias: true,
            }),
            vec![28, 28, 3],
            lineage,
        )
    }

    #[test]
    fn test_clone_keeps_lineage_and_shapes() {
        let lineage = LineageCounter::new();
        let mut original = conv(&lineage);
        original.successors.push(NodeId(7));

        let copy = original.clone_detached();
        assert_eq!(copy.lineage_id(), original.lineage_id());
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.kind(), original.kind());
        assert_eq!(copy.input_shape(), &[28, 28, 3]);
        assert_eq!(copy.output_shape(), &[28, 28, 16]);
        assert!(copy.successors().is_empty());
        assert!(copy.predecessors().is_empty());
    }

    #[test]
    fn test_input_refuses_everything() {
        let lineage = LineageCounter::new();
        let a = Node::input(vec![10], &lineage);
        let b = Node::input(vec![10], &lineage);
        assert!(!b.can_accept_connection_from(&a, false));
    }

    #[test]
    fn test_output_is_never_a_source() {
        let lineage = LineageCounter::new();
        let out = Node::output(vec![10], &lineage);
        let add = Node::new(NodeKind::Add, &lineage);
        assert!(!add.can_accept_connection_from(&out, false));
    }

    #[test]
    fn test_rank_mismatch_is_refused() {
        let lineage = LineageCounter::new();
        let input = Node::input(vec![28, 28, 3], &lineage);
        let dense = Node::new(
            NodeKind::Dense(DenseParams { units: 8, activation: Activation::Relu, use_bias: true }),
            &lineage,
        );
        assert!(!dense.can_accept_connection_from(&input, false));
        assert!(conv(&lineage).can_accept_connection_from(&input, false));
    }

    #[test]
    fn test_second_predecessor_needs_tentative() {
        let lineage = LineageCounter::new();
        let input = Node::input(vec![28, 28, 3], &lineage);
        let mut target = conv(&lineage);
        target.predecessors.push(NodeId(0));

        assert!(!target.can_accept_connection_from(&input, false));
        assert!(target.can_accept_connection_from(&input, true));
    }
}
