use super::node_graph::NodeGraph;
use crate::error::{GenomeError, Result};
use crate::nodes::{Node, NodeId};
use std::collections::{HashMap, VecDeque};

/// Collects detached nodes and edges, then wires them in one pass.
///
/// Edges are applied in topological order of the final graph, so every
/// source already carries its final output shape when its outgoing edges are
/// connected and shapes never have to be repaired afterwards.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<(NodeId, NodeId)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, mut node: Node) -> NodeId {
        node.predecessors.clear();
        node.successors.clear();
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn link(&mut self, from: NodeId, to: NodeId) {
        if !self.edges.contains(&(from, to)) {
            self.edges.push((from, to));
        }
    }

    /// Add `nodes` as a path, link it between `from` and `to`, and return the
    /// new ids. An empty path links `from` straight to `to`.
    pub fn splice(&mut self, from: NodeId, nodes: impl IntoIterator<Item = Node>, to: NodeId) -> Vec<NodeId> {
        let ids: Vec<NodeId> = nodes.into_iter().map(|n| self.add(n)).collect();
        let mut prev = from;
        for &id in &ids {
            self.link(prev, id);
            prev = id;
        }
        self.link(prev, to);
        ids
    }

    /// Clone every node of `graph` not rejected by `skip_node`, and every edge
    /// between kept nodes not rejected by `skip_edge`. Returns the old-to-new id map.
    pub fn import(
        &mut self,
        graph: &NodeGraph,
        skip_node: impl Fn(NodeId) -> bool,
        skip_edge: impl Fn(NodeId, NodeId) -> bool,
    ) -> HashMap<NodeId, NodeId> {
        let mut map = HashMap::with_capacity(graph.len());
        for id in graph.ids().filter(|&id| !skip_node(id)) {
            map.insert(id, self.add(graph[id].clone_detached()));
        }
        for (from, to) in graph.edges() {
            if skip_edge(from, to) {
                continue;
            }
            if let (Some(&a), Some(&b)) = (map.get(&from), map.get(&to)) {
                self.link(a, b);
            }
        }
        map
    }

    /// Kahn's algorithm over the collected edges. Each popped node has its
    /// outgoing edges connected in insertion order. A leftover edge means the
    /// edge set contains a cycle.
    pub fn build(self) -> Result<NodeGraph> {
        let mut outgoing: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        let mut in_degree = vec![0usize; self.nodes.len()];
        for &(from, to) in &self.edges {
            if from.0 >= self.nodes.len() {
                return Err(GenomeError::UnknownNode(from.0));
            }
            if to.0 >= self.nodes.len() {
                return Err(GenomeError::UnknownNode(to.0));
            }
            outgoing[from.0].push(to);
            in_degree[to.0] += 1;
        }

        let mut graph = NodeGraph::new();
        for node in self.nodes {
            graph.add_node(node);
        }

        let mut queue: VecDeque<NodeId> = graph.ids().filter(|id| in_degree[id.0] == 0).collect();
        let mut wired = 0;
        while let Some(from) = queue.pop_front() {
            for &to in &outgoing[from.0] {
                graph.connect(from, to)?;
                wired += 1;
                in_degree[to.0] -= 1;
                if in_degree[to.0] == 0 {
                    queue.push_back(to);
                }
            }
        }

        if wired < self.edges.len() {
            let (from, to) = self
                .edges
                .iter()
                .copied()
                .find(|&(from, to)| !graph.contains_edge(from, to))
                .unwrap_or((NodeId(0), NodeId(0)));
            return Err(GenomeError::CycleDetected { from: from.0, to: to.0 });
        }
        Ok(graph)
    }
}
