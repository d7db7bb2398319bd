use crate::error::Result;
use crate::graph::{GraphBuilder, NodeGraph};
use crate::nodes::{LineageCounter, LineageId, Node, NodeId, NodeKind};
use crate::types::{GenomeResources, Shape};
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

/// A candidate network architecture
///
/// A genome owns one [`NodeGraph`] and the two frontiers derived from it:
/// - **input frontier**: nodes with no predecessors
/// - **output frontier**: nodes with no successors
///
/// Genomes are snapshots. Every crossover and mutation operator reads its
/// parents and assembles a brand-new graph, so a parent is never modified.
///
/// # Validity
///
/// A genome is valid when it has at least one input and one output, every
/// node without predecessors is an `Input` and every node without successors
/// is an `Output`. Operators may produce invalid genomes; they report it in
/// [`Offspring::is_valid`] and leave the decision to the caller.
#[derive(Debug, Clone)]
pub struct Genome {
    graph: NodeGraph,
    input_frontier: Vec<NodeId>,
    output_frontier: Vec<NodeId>,
}

/// Result of a successful operator application
#[derive(Debug, Clone)]
pub struct Offspring {
    pub genome: Genome,
    pub is_valid: bool,
}

impl Genome {
    pub fn from_graph(graph: NodeGraph) -> Self {
        let input_frontier = graph.ids().filter(|&id| graph[id].predecessors().is_empty()).collect();
        let output_frontier = graph.ids().filter(|&id| graph[id].successors().is_empty()).collect();
        Self {
            graph,
            input_frontier,
            output_frontier,
        }
    }

    /// Straight chain `Input -> layers... -> Output`
    pub fn sequential(
        input_shape: Shape,
        layers: impl IntoIterator<Item = NodeKind>,
        output_shape: Shape,
        lineage: &LineageCounter,
    ) -> Result<Self> {
        let mut builder = GraphBuilder::new();
        let input = builder.add(Node::input(input_shape, lineage));
        let hidden: Vec<Node> = layers.into_iter().map(|kind| Node::new(kind, lineage)).collect();
        let output = builder.add(Node::output(output_shape, lineage));
        builder.splice(input, hidden, output);
        Ok(Self::from_graph(builder.build()?))
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn into_graph(self) -> NodeGraph {
        self.graph
    }

    pub fn nodes(&self) -> &[Node] {
        self.graph.nodes()
    }

    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    pub fn input_frontier(&self) -> &[NodeId] {
        &self.input_frontier
    }

    pub fn output_frontier(&self) -> &[NodeId] {
        &self.output_frontier
    }

    pub fn is_valid(&self) -> bool {
        !self.input_frontier.is_empty()
            && !self.output_frontier.is_empty()
            && self.input_frontier.iter().all(|&id| self.graph[id].kind().is_input())
            && self.output_frontier.iter().all(|&id| self.graph[id].kind().is_output())
    }

    /// Every node connected to the input frontier, breadth-first over both
    /// predecessors and successors. This is the canonical node order used by
    /// serialization and homology matching.
    pub fn reachable(&self) -> Vec<NodeId> {
        let mut seen: HashSet<NodeId> = self.input_frontier.iter().copied().collect();
        let mut queue: VecDeque<NodeId> = self.input_frontier.iter().copied().collect();
        let mut order = Vec::with_capacity(self.graph.len());

        while let Some(id) = queue.pop_front() {
            order.push(id);
            let node = &self.graph[id];
            for &next in node.predecessors().iter().chain(node.successors()) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Lineage id to the first reachable node carrying it
    pub fn lineage_index(&self) -> HashMap<LineageId, NodeId> {
        let mut index = HashMap::new();
        for id in self.reachable() {
            index.entry(self.graph[id].lineage_id()).or_insert(id);
        }
        index
    }

    /// Summed cost of every reachable node
    pub fn resources(&self, dtype_bytes: u64) -> GenomeResources {
        let mut result = GenomeResources::default();
        for id in self.reachable() {
            result.totals += self.graph[id].resources(dtype_bytes);
            result.node_count += 1;
        }
        result
    }
}

/// Final gate every operator result goes through.
///
/// Rejects graphs whose shapes or merges no longer line up and enforces the
/// node budget by discarding the whole result.
pub(crate) fn finish_graph(graph: NodeGraph, max_nodes: Option<usize>, operator: &str) -> Option<Offspring> {
    if !graph.is_acyclic() {
        debug!("{}: discarded, graph has a cycle", operator);
        return None;
    }
    if !graph.merges_are_consistent() {
        debug!("{}: discarded, merge inputs disagree", operator);
        return None;
    }
    if graph.has_degenerate_shapes() {
        debug!("{}: discarded, degenerate tensor shape", operator);
        return None;
    }
    if let Some(limit) = max_nodes {
        if graph.len() > limit {
            debug!("{}: discarded, {} nodes over budget of {}", operator, graph.len(), limit);
            return None;
        }
    }

    let genome = Genome::from_graph(graph);
    let is_valid = genome.is_valid();
    debug!("{}: produced {} nodes (valid: {})", operator, genome.node_count(), is_valid);
    Some(Offspring { genome, is_valid })
}

/// Wire a builder and hand the result to [`finish_graph`]
pub(crate) fn finish(builder: GraphBuilder, max_nodes: Option<usize>, operator: &str) -> Option<Offspring> {
    match builder.build() {
        Ok(graph) => finish_graph(graph, max_nodes, operator),
        Err(e) => {
            debug!("{}: discarded while wiring: {}", operator, e);
            None
        }
    }
}
