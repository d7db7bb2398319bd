//! Structural and hyperparameter mutation of a single genome.

use super::adapter::{create_adapter, materialize, resolve_link, simulate_chain, AdapterPlan};
use super::genome::{finish, Genome, Offspring};
use super::sampler::{mutate_kind, random_layer, random_replacement};
use super::subgraph::bridge;
use crate::config::{LayerSamplingConfig, MutationOptions};
use crate::graph::GraphBuilder;
use crate::nodes::{LayerFamily, LineageCounter, Node, NodeId, NodeKind};
use log::{debug, trace};
use rand::seq::SliceRandom;
use rand::Rng;

/// Excise one linear hidden layer and reconnect its neighbours.
///
/// Candidates are shuffled; the first whose predecessor can feed its successor,
/// directly or through adapters, is removed. Flatten layers are kept because
/// removing one always breaks the rank of everything after it.
pub fn mutate_remove_node<R: Rng>(
    genome: &Genome,
    lineage: &LineageCounter,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    let graph = genome.graph();
    let mut candidates: Vec<NodeId> = graph
        .ids()
        .filter(|&id| {
            let node = &graph[id];
            node.is_linear() && !matches!(node.kind(), NodeKind::Input { .. } | NodeKind::Output | NodeKind::Flatten)
        })
        .collect();
    candidates.shuffle(rng);

    for candidate in candidates {
        let before = graph[candidate].predecessors()[0];
        let after = graph[candidate].successors()[0];

        let already_linked = graph.contains_edge(before, after);
        let adapters = if already_linked {
            Vec::new()
        } else {
            let source = &graph[before];
            match resolve_link(source.kind(), source.output_shape(), &graph[after], true) {
                Some(adapters) => adapters,
                None => {
                    trace!("mutate_remove_node: {} leaves an unbridgeable gap", candidate);
                    continue;
                }
            }
        };

        let mut builder = GraphBuilder::new();
        let map = builder.import(graph, |id| id == candidate, |_, _| false);
        if !already_linked {
            builder.splice(map[&before], materialize(adapters, lineage), map[&after]);
        }

        if let Some(offspring) = finish(builder, max_nodes, "mutate_remove_node") {
            return Some(offspring);
        }
    }

    debug!("mutate_remove_node: no removable node");
    None
}

/// Splice a freshly sampled layer into a random edge
pub fn mutate_add_node<R: Rng>(
    genome: &Genome,
    layers: &LayerSamplingConfig,
    lineage: &LineageCounter,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    let graph = genome.graph();
    let mut edges = graph.edges();
    edges.shuffle(rng);

    for (from, to) in edges {
        let source = &graph[from];
        let Some(kind) = random_layer(source.output_shape().len(), layers, rng) else {
            continue;
        };
        let layer = Node::with_input_shape(kind, source.output_shape().to_vec(), lineage);

        let Some((input_adapters, output_adapters)) = bridge(
            source,
            &layer,
            |s| layer.kind().infer_output_shape(s),
            layer.kind(),
            &graph[to],
            true,
        ) else {
            trace!("mutate_add_node: {} does not fit into {} -> {}", layer.kind(), from, to);
            continue;
        };

        let mut path = materialize(input_adapters, lineage);
        path.push(layer);
        path.extend(materialize(output_adapters, lineage));

        let mut builder = GraphBuilder::new();
        let map = builder.import(graph, |_| false, |a, b| (a, b) == (from, to));
        builder.splice(map[&from], path, map[&to]);

        if let Some(offspring) = finish(builder, max_nodes, "mutate_add_node") {
            return Some(offspring);
        }
    }

    debug!("mutate_add_node: no edge accepts a new layer");
    None
}

/// Route an earlier node into a later one through a new Add node.
///
/// The target's single existing input and the new source both feed the Add,
/// which then feeds the target. The source must reach the same shape as that
/// existing input, directly or through an exact adapter chain.
pub fn mutate_add_skip_connection<R: Rng>(
    genome: &Genome,
    lineage: &LineageCounter,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    let graph = genome.graph();
    let mut pairs: Vec<(NodeId, NodeId)> = Vec::new();
    for source in graph.ids() {
        for target in graph.downstream_of(source) {
            let node = &graph[target];
            if graph[source].successors().contains(&target)
                || node.predecessors().len() != 1
                || node.kind().is_input()
                || node.kind().is_output()
            {
                continue;
            }
            pairs.push((source, target));
        }
    }
    pairs.sort();
    pairs.shuffle(rng);

    for (source, target) in pairs {
        let existing = graph[target].predecessors()[0];
        let wanted = graph[existing].output_shape();
        let produced = graph[source].output_shape();

        let adapters = if produced == wanted {
            Vec::new()
        } else {
            match create_adapter(produced, wanted) {
                AdapterPlan::Chain(kinds) if simulate_chain(&kinds, produced) == wanted => kinds,
                _ => {
                    trace!("mutate_add_skip_connection: {} cannot match {}", source, existing);
                    continue;
                }
            }
        };

        let mut builder = GraphBuilder::new();
        let map = builder.import(graph, |_| false, |a, b| (a, b) == (existing, target));
        let merge = builder.add(Node::new(NodeKind::Add, lineage));
        builder.link(map[&existing], merge);
        builder.splice(map[&source], materialize(adapters, lineage), merge);
        builder.link(merge, map[&target]);

        if let Some(offspring) = finish(builder, max_nodes, "mutate_add_skip_connection") {
            return Some(offspring);
        }
    }

    debug!("mutate_add_skip_connection: no eligible pair");
    None
}

/// Swap a layer for one of a different family that takes the same input rank.
///
/// Predecessors feed the replacement directly; every successor gets its own
/// adapters and all of them must resolve.
pub fn mutate_change_layer_type<R: Rng>(
    genome: &Genome,
    layers: &LayerSamplingConfig,
    lineage: &LineageCounter,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    let graph = genome.graph();
    let mut candidates: Vec<NodeId> = graph
        .ids()
        .filter(|&id| {
            matches!(
                graph[id].kind().family(),
                LayerFamily::Dense | LayerFamily::Convolution | LayerFamily::Pooling
            )
        })
        .collect();
    candidates.shuffle(rng);

    'candidates: for candidate in candidates {
        let old = &graph[candidate];
        let Some(kind) = random_replacement(old.kind(), layers, rng) else {
            continue;
        };
        let replacement = Node::with_input_shape(kind, old.input_shape().to_vec(), lineage);

        if old.predecessors().len() > 1 {
            continue;
        }
        if let Some(&prev) = old.predecessors().first() {
            if !replacement.can_accept_connection_from(&graph[prev], false) {
                continue;
            }
        }

        let mut per_child = Vec::with_capacity(old.successors().len());
        for &child in old.successors() {
            match resolve_link(replacement.kind(), replacement.output_shape(), &graph[child], true) {
                Some(adapters) => per_child.push((child, adapters)),
                None => {
                    trace!("mutate_change_layer_type: {} cannot feed {}", replacement.kind(), child);
                    continue 'candidates;
                }
            }
        }

        let predecessors = old.predecessors().to_vec();
        let mut builder = GraphBuilder::new();
        let map = builder.import(graph, |id| id == candidate, |_, _| false);
        let new_id = builder.add(replacement);
        for prev in predecessors {
            builder.link(map[&prev], new_id);
        }
        for (child, adapters) in per_child {
            builder.splice(new_id, materialize(adapters, lineage), map[&child]);
        }

        if let Some(offspring) = finish(builder, max_nodes, "mutate_change_layer_type") {
            return Some(offspring);
        }
    }

    debug!("mutate_change_layer_type: no swappable layer");
    None
}

/// Resample hyperparameters of individual layers.
///
/// Each mutated node keeps its lineage id since it is still the same logical
/// layer. The rebuilt graph must pass the same shape checks as any structural
/// edit; a genome in which nothing was resampled comes back as a plain copy.
pub fn mutate_parameters<R: Rng>(
    genome: &Genome,
    options: &MutationOptions,
    rng: &mut R,
    max_nodes: Option<usize>,
) -> Option<Offspring> {
    let graph = genome.graph();
    let mut builder = GraphBuilder::new();
    let mut changed = 0;

    for id in graph.ids() {
        let node = &graph[id];
        let copy = match mutate_kind(node.kind(), options, rng) {
            Some(kind) => {
                changed += 1;
                node.clone_with_kind(kind)
            }
            None => node.clone_detached(),
        };
        builder.add(copy);
    }
    for (from, to) in graph.edges() {
        builder.link(from, to);
    }

    debug!("mutate_parameters: resampled {} layers", changed);
    finish(builder, max_nodes, "mutate_parameters")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Conv2DParams, DenseParams};
    use crate::types::{Activation, KernelSize};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dense(units: usize) -> NodeKind {
        NodeKind::Dense(DenseParams { units, activation: Activation::Relu, use_bias: true })
    }

    fn conv(filters: usize) -> NodeKind {
        NodeKind::Conv2D(Conv2DParams {
            filters,
            kernel_size: KernelSize::square(3),
            stride: 1,
            padding: 1,
            dilation: 1,
            use_bias: true,
        })
    }

    #[test]
    fn test_remove_node_shrinks_mlp() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![8], vec![dense(16), dense(4)], vec![4], &lineage).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let child = mutate_remove_node(&genome, &lineage, &mut rng, None).unwrap();
        assert_eq!(child.genome.node_count(), 3);
        assert!(child.is_valid);
    }

    #[test]
    fn test_remove_keeps_flatten() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![4, 4, 1], vec![NodeKind::Flatten], vec![16], &lineage).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(mutate_remove_node(&genome, &lineage, &mut rng, None).is_none());
    }

    #[test]
    fn test_add_node_matches_rank() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![8, 8, 3], vec![conv(4), NodeKind::Flatten], vec![256], &lineage).unwrap();
        let layers = LayerSamplingConfig::default();
        let mut rng = StdRng::seed_from_u64(4);

        let child = mutate_add_node(&genome, &layers, &lineage, &mut rng, None).unwrap();
        assert_eq!(child.genome.node_count(), 5);
        assert!(child.genome.graph().shapes_are_fresh());
    }

    #[test]
    fn test_skip_connection_adds_merge() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![8, 8, 3], vec![conv(8), conv(8), conv(8)], vec![8, 8, 8], &lineage).unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        let child = mutate_add_skip_connection(&genome, &lineage, &mut rng, None).unwrap();
        let adds = child
            .genome
            .nodes()
            .iter()
            .filter(|n| matches!(n.kind(), NodeKind::Add))
            .count();
        assert_eq!(adds, 1);
        assert!(child.genome.graph().merges_are_consistent());
    }

    #[test]
    fn test_change_layer_type_swaps_conv_for_pooling() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![8, 8, 3], vec![conv(8), NodeKind::Flatten], vec![10], &lineage).unwrap();
        let layers = LayerSamplingConfig::default();
        let mut rng = StdRng::seed_from_u64(6);

        let child = mutate_change_layer_type(&genome, &layers, &lineage, &mut rng, None).unwrap();
        assert!(child.genome.nodes().iter().any(|n| matches!(n.kind(), NodeKind::Pooling(_))));
        assert!(!child.genome.nodes().iter().any(|n| matches!(n.kind(), NodeKind::Conv2D(_))));
    }

    #[test]
    fn test_change_layer_type_skips_dense_only_graphs() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![8], vec![dense(4)], vec![4], &lineage).unwrap();
        let mut rng = StdRng::seed_from_u64(6);
        let layers = LayerSamplingConfig::default();
        assert!(mutate_change_layer_type(&genome, &layers, &lineage, &mut rng, None).is_none());
    }

    #[test]
    fn test_parameter_mutation_keeps_lineage() {
        let lineage = LineageCounter::new();
        let genome = Genome::sequential(vec![8], vec![dense(16), dense(4)], vec![4], &lineage).unwrap();
        let options = MutationOptions {
            dense_units: 1.0,
            ..MutationOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(8);

        let child = mutate_parameters(&genome, &options, &mut rng, None).unwrap();
        let before: Vec<_> = genome.nodes().iter().map(|n| n.lineage_id()).collect();
        let after: Vec<_> = child.genome.nodes().iter().map(|n| n.lineage_id()).collect();
        assert_eq!(before, after);
        assert!(child.genome.graph().shapes_are_fresh());
    }
}
