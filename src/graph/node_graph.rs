use crate::error::{GenomeError, Result};
use crate::nodes::{Node, NodeId, NodeKind};
use crate::types::{is_degenerate, Shape};
use std::collections::{HashSet, VecDeque};
use std::ops::Index;

/// Arena of nodes with index-based adjacency.
///
/// All edge edits go through this type so that `b ∈ a.successors ⟺ a ∈
/// b.predecessors` always holds and every output shape is re-derived from the
/// current inputs after each change.
#[derive(Debug, Default)]
pub struct NodeGraph {
    nodes: Vec<Node>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Move a node into the arena. Any adjacency it carried is dropped.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        node.predecessors.clear();
        node.successors.clear();
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(GenomeError::UnknownNode(id.0))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Every edge, grouped by source in arena order
    pub fn edges(&self) -> Vec<(NodeId, NodeId)> {
        self.ids()
            .flat_map(|from| self[from].successors.iter().map(move |&to| (from, to)))
            .collect()
    }

    pub fn contains_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.nodes
            .get(from.0)
            .map(|n| n.successors.contains(&to))
            .unwrap_or(false)
    }

    /// Append `from -> to` and re-derive shapes downstream of `to`.
    ///
    /// Fails without touching the graph when the edge would close a cycle, or
    /// when `to` is an Add node whose first input has a different shape.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        self.get(from)?;
        self.get(to)?;
        if self.contains_edge(from, to) {
            return Ok(());
        }
        if self.reaches(to, from) {
            return Err(GenomeError::CycleDetected { from: from.0, to: to.0 });
        }

        let target = &self[to];
        if matches!(target.kind(), NodeKind::Add) && !target.predecessors.is_empty() {
            let expected = self[target.predecessors[0]].output_shape.clone();
            let actual = self[from].output_shape.clone();
            if expected != actual {
                return Err(GenomeError::ShapeMismatch {
                    target: to.0,
                    expected,
                    actual,
                });
            }
        }

        self.nodes[from.0].successors.push(to);
        self.nodes[to.0].predecessors.push(from);
        self.refresh(to);
        self.propagate_from(to);
        Ok(())
    }

    /// Remove `from -> to` from both sides; returns whether the edge existed
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> bool {
        if !self.contains_edge(from, to) {
            return false;
        }
        self.nodes[from.0].successors.retain(|&n| n != to);
        self.nodes[to.0].predecessors.retain(|&n| n != from);
        self.refresh(to);
        self.propagate_from(to);
        true
    }

    pub fn clear_all_connections(&mut self, id: NodeId) {
        let successors = self[id].successors.clone();
        for next in successors {
            self.disconnect(id, next);
        }
        let predecessors = self[id].predecessors.clone();
        for prev in predecessors {
            self.disconnect(prev, id);
        }
    }

    /// Detach a node and take it out of the arena.
    ///
    /// The last node is moved into the freed slot, so any `NodeId` equal to
    /// the old last index now refers to `id`.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        self.get(id)?;
        self.clear_all_connections(id);

        let last = NodeId(self.nodes.len() - 1);
        let removed = self.nodes.swap_remove(id.0);
        if last != id {
            for node in &mut self.nodes {
                for n in node.predecessors.iter_mut().chain(node.successors.iter_mut()) {
                    if *n == last {
                        *n = id;
                    }
                }
            }
        }
        Ok(removed)
    }

    /// Depth-first walk from `start` with a recursion stack; false as soon as a
    /// node already on the stack is reached again.
    pub fn is_acyclic_from(&self, start: NodeId) -> bool {
        fn dfs(graph: &NodeGraph, node: NodeId, visited: &mut HashSet<NodeId>, stack: &mut HashSet<NodeId>) -> bool {
            if stack.contains(&node) {
                return false;
            }
            if !visited.insert(node) {
                return true;
            }
            stack.insert(node);
            for &next in &graph[node].successors {
                if !dfs(graph, next, visited, stack) {
                    return false;
                }
            }
            stack.remove(&node);
            true
        }

        dfs(self, start, &mut HashSet::new(), &mut HashSet::new())
    }

    pub fn is_acyclic(&self) -> bool {
        self.ids().all(|id| self.is_acyclic_from(id))
    }

    /// Whether `to` can be reached from `from` following successors (a node reaches itself)
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            for &next in &self[node].successors {
                if next == to {
                    return true;
                }
                stack.push(next);
            }
        }
        false
    }

    /// `to` accepts a new edge from `from` and the graph stays acyclic
    pub fn check_compatibility(&self, from: NodeId, to: NodeId) -> bool {
        self[to].can_accept_connection_from(&self[from], false) && !self.reaches(to, from)
    }

    /// Like [`NodeGraph::check_compatibility`], for a swap of `to`'s existing input
    pub fn check_compatibility_disconnected(&self, from: NodeId, to: NodeId) -> bool {
        self[to].can_accept_connection_from(&self[from], true) && !self.reaches(to, from)
    }

    /// Nodes strictly downstream of `id`
    pub fn downstream_of(&self, id: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<NodeId> = self[id].successors.iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            if seen.insert(node) {
                queue.extend(self[node].successors.iter().copied());
            }
        }
        seen
    }

    /// Kahn's algorithm; `None` if the graph has a cycle
    pub fn topological_order(&self) -> Option<Vec<NodeId>> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut queue: VecDeque<NodeId> = self.ids().filter(|id| in_degree[id.0] == 0).collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &next in &self[node].successors {
                in_degree[next.0] -= 1;
                if in_degree[next.0] == 0 {
                    queue.push_back(next);
                }
            }
        }

        (order.len() == self.nodes.len()).then_some(order)
    }

    /// Input and output shape of `id` derived from its current predecessors
    pub fn derived_shapes(&self, id: NodeId) -> (Shape, Shape) {
        let node = &self[id];
        let first = node.predecessors.first().map(|&p| self[p].output_shape.clone());

        match (node.kind(), first) {
            (NodeKind::Input { shape }, _) => (shape.clone(), shape.clone()),
            (NodeKind::Concat, Some(first)) => {
                let inputs: Vec<&Shape> = node.predecessors.iter().map(|&p| &self[p].output_shape).collect();
                if inputs.iter().any(|s| s.len() != 3) {
                    return (first, Vec::new());
                }
                let Some(channels) = inputs.iter().try_fold(0usize, |acc, s| acc.checked_add(s[2])) else {
                    return (first, Vec::new());
                };
                (vec![first[0], first[1], 0], vec![first[0], first[1], channels])
            }
            (kind, Some(first)) => {
                let output = kind.infer_output_shape(&first);
                (first, output)
            }
            (kind, None) => (node.input_shape.clone(), kind.infer_output_shape(&node.input_shape)),
        }
    }

    /// Output shape `id` would have if recomputed right now
    pub fn recomputed_output_shape(&self, id: NodeId) -> Shape {
        self.derived_shapes(id).1
    }

    fn refresh(&mut self, id: NodeId) {
        let (input, output) = self.derived_shapes(id);
        let node = &mut self.nodes[id.0];
        node.input_shape = input;
        node.output_shape = output;
    }

    /// Re-derive every node downstream of `start`, visiting each once in
    /// topological order so diamonds see their final inputs.
    fn propagate_from(&mut self, start: NodeId) {
        let downstream = self.downstream_of(start);
        if downstream.is_empty() {
            return;
        }
        match self.topological_order() {
            Some(order) => {
                for id in order.into_iter().filter(|id| downstream.contains(id)) {
                    self.refresh(id);
                }
            }
            None => {
                // Only reachable if a cycle was forced in; fall back to a guarded DFS
                let mut visited = HashSet::new();
                let mut stack = vec![start];
                while let Some(node) = stack.pop() {
                    for next in self[node].successors.clone() {
                        if visited.insert(next) {
                            self.refresh(next);
                            stack.push(next);
                        }
                    }
                }
            }
        }
    }

    /// Every stored output shape equals a fresh recomputation
    pub fn shapes_are_fresh(&self) -> bool {
        self.ids()
            .all(|id| self[id].output_shape == self.recomputed_output_shape(id))
    }

    pub fn adjacency_is_symmetric(&self) -> bool {
        self.ids().all(|a| {
            self[a].successors.iter().all(|&b| self[b].predecessors.contains(&a))
                && self[a].predecessors.iter().all(|&b| self[b].successors.contains(&a))
        })
    }

    /// Add inputs all share one shape; Concat inputs are 3-D with one spatial extent
    pub fn merges_are_consistent(&self) -> bool {
        self.nodes.iter().all(|node| {
            let inputs: Vec<&Shape> = node.predecessors.iter().map(|&p| &self[p].output_shape).collect();
            match (node.kind(), inputs.first()) {
                (NodeKind::Add, Some(first)) => inputs.iter().all(|s| s == first),
                (NodeKind::Concat, Some(first)) => inputs
                    .iter()
                    .all(|s| s.len() == 3 && first.len() == 3 && s[..2] == first[..2]),
                _ => true,
            }
        })
    }

    pub fn has_degenerate_shapes(&self) -> bool {
        self.nodes.iter().any(|n| is_degenerate(&n.output_shape))
    }
}

/// Same indices, same edges, fresh node identities
impl Clone for NodeGraph {
    fn clone(&self) -> Self {
        let nodes = self
            .nodes
            .iter()
            .map(|node| {
                let mut copy = node.clone_detached();
                copy.predecessors = node.predecessors.clone();
                copy.successors = node.successors.clone();
                copy
            })
            .collect();
        Self { nodes }
    }
}

impl Index<NodeId> for NodeGraph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}
