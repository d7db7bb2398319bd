//! Structural crossover between two genomes.
//!
//! Every operator leaves its parents untouched and returns a freshly built
//! genome, or `None` when no legal recombination was found this attempt.

use super::adapter::materialize;
use super::genome::{finish, finish_graph, Genome, Offspring};
use super::subgraph::{bridge, insertion_points, random_subgraph, Fragment};
use crate::error::Result;
use crate::graph::{GraphBuilder, NodeGraph};
use crate::nodes::{LineageCounter, Node, NodeId, NodeKind};
use log::{debug, trace};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::ops::RangeInclusive;

/// Path `adapters + fragment + adapters` ready to be spliced
fn spliced_path(
    input_adapters: Vec<NodeKind>,
    fragment: Vec<Node>,
    output_adapters: Vec<NodeKind>,
    lineage: &LineageCounter,
) -> Vec<Node> {
    let mut path = materialize(input_adapters, lineage);
    path.extend(fragment);
    path.extend(materialize(output_adapters, lineage));
    path
}

/// Subgraph-insertion crossover.
///
/// A random linear fragment of `donor` is spliced into a uniformly chosen
/// compatible edge of a copy of `recipient`. Other branches of the cut edge's
/// endpoints are kept.
pub fn breed<R: Rng>(
    recipient: &Genome,
    donor: &Genome,
    lineage: &LineageCounter,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    let Some(fragment) = Fragment::extract(donor.graph(), rng) else {
        debug!("breed: donor has no linear chain to extract");
        return None;
    };

    let mut points = insertion_points(recipient.graph(), &fragment, |_, _| true);
    if points.is_empty() {
        debug!("breed: no edge accepts a fragment of {} nodes", fragment.len());
        return None;
    }
    let point = points.swap_remove(rng.gen_range(0..points.len()));
    trace!("breed: splicing into {} -> {}", point.from, point.to);

    let mut builder = GraphBuilder::new();
    let cut = (point.from, point.to);
    let map = builder.import(recipient.graph(), |_| false, |a, b| (a, b) == cut);
    let path = spliced_path(point.input_adapters, fragment.into_nodes(), point.output_adapters, lineage);
    builder.splice(map[&point.from], path, map[&point.to]);

    finish(builder, max_nodes, "breed")
}

/// Subgraph-replacement crossover.
///
/// A span of `recipient` with a single node before and after it is cut out
/// and a donor fragment is spliced in its place. The whole attempt is retried
/// up to `attempts` times.
pub fn breed_by_replacement<R: Rng>(
    recipient: &Genome,
    donor: &Genome,
    attempts: usize,
    lineage: &LineageCounter,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    let graph = recipient.graph();

    for attempt in 1..=attempts {
        let Some(span) = random_subgraph(graph, rng) else {
            debug!("breed_by_replacement: recipient has no linear chain");
            return None;
        };
        let Some(fragment) = Fragment::extract(donor.graph(), rng) else {
            debug!("breed_by_replacement: donor has no linear chain");
            return None;
        };
        let (Some(&first), Some(&last)) = (span.first(), span.last()) else {
            continue;
        };
        let before = graph[first].predecessors()[0];
        let after = graph[last].successors()[0];

        let (Some(head), Some(tail)) = (fragment.head(), fragment.tail()) else {
            continue;
        };
        let Some((input_adapters, output_adapters)) =
            bridge(&graph[before], head, |s| fragment.output_for(s), tail.kind(), &graph[after], true)
        else {
            trace!("breed_by_replacement: attempt {} found no bridge", attempt);
            continue;
        };

        let removed: HashSet<NodeId> = span.iter().copied().collect();
        let mut builder = GraphBuilder::new();
        let map = builder.import(graph, |id| removed.contains(&id), |_, _| false);
        let path = spliced_path(input_adapters, fragment.into_nodes(), output_adapters, lineage);
        builder.splice(map[&before], path, map[&after]);

        if let Some(offspring) = finish(builder, max_nodes, "breed_by_replacement") {
            return Some(offspring);
        }
    }

    debug!("breed_by_replacement: gave up after {} attempts", attempts);
    None
}

/// NEAT-style crossover.
///
/// Looks for a linear donor node whose lineage the recipient lacks but whose
/// neighbours' lineages the recipient has. That node is transplanted between
/// the matching anchors, replacing their direct edge when one exists and
/// branching in otherwise. Without such a node the result is an unchanged
/// copy of the recipient.
pub fn breed_neat_style<R: Rng>(
    recipient: &Genome,
    donor: &Genome,
    lineage: &LineageCounter,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    let graph = recipient.graph();
    let known = recipient.lineage_index();
    let donor_graph = donor.graph();

    let mut disjoint: Vec<NodeId> = donor
        .reachable()
        .into_iter()
        .filter(|&id| {
            let node = &donor_graph[id];
            node.is_linear()
                && !node.kind().is_input()
                && !node.kind().is_output()
                && !known.contains_key(&node.lineage_id())
        })
        .collect();
    disjoint.shuffle(rng);

    for candidate in disjoint {
        let node = &donor_graph[candidate];
        let prev = &donor_graph[node.predecessors()[0]];
        let next = &donor_graph[node.successors()[0]];
        let (Some(&anchor_in), Some(&anchor_out)) = (known.get(&prev.lineage_id()), known.get(&next.lineage_id()))
        else {
            continue;
        };
        if anchor_in == anchor_out || graph.reaches(anchor_out, anchor_in) {
            continue;
        }

        let replaces_edge = graph.contains_edge(anchor_in, anchor_out);
        let transplant = node.clone_detached();
        let Some((input_adapters, output_adapters)) = bridge(
            &graph[anchor_in],
            &transplant,
            |s| transplant.kind().infer_output_shape(s),
            transplant.kind(),
            &graph[anchor_out],
            replaces_edge,
        ) else {
            trace!("breed_neat_style: {} does not fit between its anchors", node.lineage_id());
            continue;
        };

        let mut builder = GraphBuilder::new();
        let cut = (anchor_in, anchor_out);
        let map = builder.import(graph, |_| false, |a, b| replaces_edge && (a, b) == cut);
        let path = spliced_path(input_adapters, vec![transplant], output_adapters, lineage);
        builder.splice(map[&anchor_in], path, map[&anchor_out]);

        if let Some(offspring) = finish(builder, max_nodes, "breed_neat_style") {
            return Some(offspring);
        }
    }

    debug!("breed_neat_style: no disjoint node with homologous anchors, returning a copy");
    let mut builder = GraphBuilder::new();
    builder.import(graph, |_| false, |_, _| false);
    finish(builder, max_nodes, "breed_neat_style")
}

/// Multi-point crossover.
///
/// Between `fragments.start()` and `fragments.end()` donor fragments are
/// spliced one after another into a single working copy of the recipient, each
/// into an edge chosen from the graph as it stands after the previous splice.
/// Edges touching adapter nodes created earlier in the same call are not
/// eligible.
pub fn breed_multi_point<R: Rng>(
    recipient: &Genome,
    donor: &Genome,
    fragments: RangeInclusive<usize>,
    lineage: &LineageCounter,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    if fragments.is_empty() {
        return None;
    }
    let count = rng.gen_range(fragments);
    let pieces: Vec<Fragment> = (0..count)
        .filter_map(|_| Fragment::extract(donor.graph(), rng))
        .collect();
    if pieces.is_empty() {
        debug!("breed_multi_point: donor has no linear chain");
        return None;
    }

    let mut graph = recipient.graph().clone();
    let mut adapters: HashSet<NodeId> = HashSet::new();
    let mut applied = 0;

    for fragment in pieces {
        let mut points = insertion_points(&graph, &fragment, |a, b| {
            !adapters.contains(&a) && !adapters.contains(&b)
        });
        if points.is_empty() {
            trace!("breed_multi_point: fragment of {} nodes has no live edge", fragment.len());
            continue;
        }
        let point = points.swap_remove(rng.gen_range(0..points.len()));

        let adapter_count = point.input_adapters.len();
        let trailing = point.output_adapters.len();
        let path = spliced_path(point.input_adapters, fragment.into_nodes(), point.output_adapters, lineage);
        let path_len = path.len();

        let ids = match splice_in_place(&mut graph, point.from, path, point.to) {
            Ok(ids) => ids,
            Err(e) => {
                debug!("breed_multi_point: splice failed: {}", e);
                return None;
            }
        };
        adapters.extend(ids[..adapter_count].iter().copied());
        adapters.extend(ids[path_len - trailing..].iter().copied());
        applied += 1;
    }

    if applied == 0 {
        debug!("breed_multi_point: no fragment could be placed");
        return None;
    }
    finish_graph(graph, max_nodes, "breed_multi_point")
}

/// Replace edge `from -> to` of a live graph with `from -> path... -> to`
fn splice_in_place(
    graph: &mut NodeGraph,
    from: NodeId,
    path: Vec<Node>,
    to: NodeId,
) -> Result<Vec<NodeId>> {
    graph.disconnect(from, to);
    let ids: Vec<NodeId> = path.into_iter().map(|node| graph.add_node(node)).collect();
    let mut prev = from;
    for &id in &ids {
        graph.connect(prev, id)?;
        prev = id;
    }
    graph.connect(prev, to)?;
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::DenseParams;
    use crate::types::Activation;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dense(units: usize) -> NodeKind {
        NodeKind::Dense(DenseParams { units, activation: Activation::Relu, use_bias: true })
    }

    #[test]
    fn test_breed_grows_recipient() {
        let lineage = LineageCounter::new();
        let recipient = Genome::sequential(vec![8], vec![dense(16), dense(4)], vec![4], &lineage).unwrap();
        let donor = Genome::sequential(vec![8], vec![dense(32), dense(32), dense(4)], vec![4], &lineage).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let child = breed(&recipient, &donor, &lineage, &mut rng, None).unwrap();
        assert!(child.is_valid);
        assert!(child.genome.node_count() > recipient.node_count());
        assert_eq!(recipient.node_count(), 4);
    }

    #[test]
    fn test_splice_in_place_keeps_symmetry() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![8], vec![dense(16)], vec![16], &lineage).unwrap();
        let mut graph = genome.graph().clone();
        let (from, to) = graph.edges()[0];

        let ids = splice_in_place(&mut graph, from, vec![Node::new(dense(3), &lineage)], to).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(!graph.contains_edge(from, to));
        assert!(graph.adjacency_is_symmetric());
        assert!(graph.shapes_are_fresh());
    }
}
