use super::adapter::{resolve_link, simulate_chain};
use crate::graph::NodeGraph;
use crate::nodes::{Node, NodeId, NodeKind};
use crate::types::{is_degenerate, Shape};
use log::trace;
use rand::seq::SliceRandom;
use rand::Rng;

/// Maximal runs of nodes that each have exactly one predecessor and one successor
pub fn linear_chains(graph: &NodeGraph) -> Vec<Vec<NodeId>> {
    let mut chains = Vec::new();
    for id in graph.ids() {
        let node = &graph[id];
        if !node.is_linear() || graph[node.predecessors()[0]].is_linear() {
            continue;
        }

        let mut chain = vec![id];
        let mut current = id;
        loop {
            let next = graph[current].successors()[0];
            if !graph[next].is_linear() {
                break;
            }
            chain.push(next);
            current = next;
        }
        chains.push(chain);
    }
    chains
}

/// A uniformly chosen chain of length two or more, then a uniformly chosen
/// contiguous non-empty span of it.
pub fn random_subgraph<R: Rng>(graph: &NodeGraph, rng: &mut R) -> Option<Vec<NodeId>> {
    let chains: Vec<Vec<NodeId>> = linear_chains(graph).into_iter().filter(|c| c.len() >= 2).collect();
    let chain = chains.choose(rng)?;
    let start = rng.gen_range(0..chain.len());
    let end = rng.gen_range(start..chain.len());
    Some(chain[start..=end].to_vec())
}

/// Detached copies of a linear span, in path order
#[derive(Debug)]
pub struct Fragment {
    nodes: Vec<Node>,
}

impl Fragment {
    /// Clone a random span of `graph`
    pub fn extract<R: Rng>(graph: &NodeGraph, rng: &mut R) -> Option<Fragment> {
        let span = random_subgraph(graph, rng)?;
        Some(Self::from_span(graph, &span))
    }

    pub fn from_span(graph: &NodeGraph, span: &[NodeId]) -> Fragment {
        Fragment {
            nodes: span.iter().map(|&id| graph[id].clone_detached()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn head(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn tail(&self) -> Option<&Node> {
        self.nodes.last()
    }

    /// Shape leaving the tail once the head is fed `input`
    pub fn output_for(&self, input: &[usize]) -> Shape {
        self.nodes
            .iter()
            .fold(input.to_vec(), |shape, node| node.kind().infer_output_shape(&shape))
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

/// An edge the fragment can be spliced into, with the adapters each side needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPoint {
    pub from: NodeId,
    pub to: NodeId,
    pub input_adapters: Vec<NodeKind>,
    pub output_adapters: Vec<NodeKind>,
}

/// Adapters that splice a path between `source` and `target`, given the
/// path's head and a function simulating the path's output for an input.
pub(crate) fn bridge(
    source: &Node,
    head: &Node,
    path_output: impl Fn(&[usize]) -> Shape,
    tail_kind: &NodeKind,
    target: &Node,
    tentative: bool,
) -> Option<(Vec<NodeKind>, Vec<NodeKind>)> {
    let input_adapters = resolve_link(source.kind(), source.output_shape(), head, false)?;
    let head_input = simulate_chain(&input_adapters, source.output_shape());
    let tail_output = path_output(&head_input);
    if is_degenerate(&tail_output) {
        return None;
    }
    let output_adapters = resolve_link(tail_kind, &tail_output, target, tentative)?;
    Some((input_adapters, output_adapters))
}

/// Every edge accepted by `allow` where the fragment fits on both sides
pub fn insertion_points(
    graph: &NodeGraph,
    fragment: &Fragment,
    allow: impl Fn(NodeId, NodeId) -> bool,
) -> Vec<InsertionPoint> {
    let (Some(head), Some(tail)) = (fragment.head(), fragment.tail()) else {
        return Vec::new();
    };

    graph
        .edges()
        .into_iter()
        .filter(|&(from, to)| allow(from, to))
        .filter_map(|(from, to)| {
            let fitted = bridge(&graph[from], head, |s| fragment.output_for(s), tail.kind(), &graph[to], true);
            trace!("insertion point {} -> {}: {}", from, to, fitted.is_some());
            let (input_adapters, output_adapters) = fitted?;
            Some(InsertionPoint {
                from,
                to,
                input_adapters,
                output_adapters,
            })
        })
        .collect()
}

/// One uniformly chosen insertion point, if any edge fits
pub fn find_insertion_point<R: Rng>(graph: &NodeGraph, fragment: &Fragment, rng: &mut R) -> Option<InsertionPoint> {
    let mut points = insertion_points(graph, fragment, |_, _| true);
    if points.is_empty() {
        return None;
    }
    let pick = rng.gen_range(0..points.len());
    Some(points.swap_remove(pick))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::genome::Genome;
    use crate::nodes::{DenseParams, LineageCounter};
    use crate::types::Activation;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dense(units: usize) -> NodeKind {
        NodeKind::Dense(DenseParams { units, activation: Activation::Relu, use_bias: true })
    }

    fn mlp(lineage: &LineageCounter) -> Genome {
        Genome::sequential(vec![16], vec![dense(32), dense(64), dense(10)], vec![10], lineage).unwrap()
    }

    #[test]
    fn test_linear_chain_skips_io() {
        let genome = mlp(&LineageCounter::new());
        let chains = linear_chains(genome.graph());
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 3);
    }

    #[test]
    fn test_random_subgraph_is_contiguous() {
        let genome = mlp(&LineageCounter::new());
        let chain = &linear_chains(genome.graph())[0];
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..20 {
            let span = random_subgraph(genome.graph(), &mut rng).unwrap();
            let start = chain.iter().position(|id| *id == span[0]).unwrap();
            assert_eq!(&chain[start..start + span.len()], span.as_slice());
        }
    }

    #[test]
    fn test_no_chain_means_no_subgraph() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![16], vec![dense(8)], vec![8], &lineage).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(random_subgraph(genome.graph(), &mut rng).is_none());
    }

    #[test]
    fn test_every_edge_accepts_a_dense_fragment() {
        let lineage = LineageCounter::new();
        let recipient = mlp(&lineage);
        let donor = mlp(&lineage);
        let span = &linear_chains(donor.graph())[0][..1];
        let fragment = Fragment::from_span(donor.graph(), span);

        let points = insertion_points(recipient.graph(), &fragment, |_, _| true);
        assert_eq!(points.len(), recipient.graph().edges().len());
        assert!(points.iter().all(|p| p.input_adapters.is_empty()));
    }
}
