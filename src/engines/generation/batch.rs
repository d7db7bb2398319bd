use super::crossover::{breed, breed_by_replacement, breed_multi_point, breed_neat_style};
use super::genome::{Genome, Offspring};
use super::mutation::{
    mutate_add_node, mutate_add_skip_connection, mutate_change_layer_type, mutate_parameters, mutate_remove_node,
};
use crate::config::AppConfig;
use crate::nodes::LineageCounter;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Every genetic operator, selectable at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Breed,
    BreedByReplacement,
    BreedNeatStyle,
    BreedMultiPoint,
    RemoveNode,
    AddNode,
    AddSkipConnection,
    ChangeLayerType,
    MutateParameters,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Breed,
        Operator::BreedByReplacement,
        Operator::BreedNeatStyle,
        Operator::BreedMultiPoint,
        Operator::RemoveNode,
        Operator::AddNode,
        Operator::AddSkipConnection,
        Operator::ChangeLayerType,
        Operator::MutateParameters,
    ];

    pub fn apply<R: Rng>(
        self,
        recipient: &Genome,
        donor: &Genome,
        config: &AppConfig,
        lineage: &LineageCounter,
        rng: &mut R,
    ) -> Option<Offspring> {
        let max_nodes = config.search.max_nodes;
        match self {
            Operator::Breed => breed(recipient, donor, lineage, rng, max_nodes),
            Operator::BreedByReplacement => breed_by_replacement(
                recipient,
                donor,
                config.search.replacement_attempts,
                lineage,
                rng,
                max_nodes,
            ),
            Operator::BreedNeatStyle => breed_neat_style(recipient, donor, lineage, rng, max_nodes),
            Operator::BreedMultiPoint => breed_multi_point(
                recipient,
                donor,
                config.search.min_fragments..=config.search.max_fragments,
                lineage,
                rng,
                max_nodes,
            ),
            Operator::RemoveNode => mutate_remove_node(recipient, lineage, rng, max_nodes),
            Operator::AddNode => mutate_add_node(recipient, &config.layers, lineage, rng, max_nodes),
            Operator::AddSkipConnection => mutate_add_skip_connection(recipient, lineage, rng, max_nodes),
            Operator::ChangeLayerType => mutate_change_layer_type(recipient, &config.layers, lineage, rng, max_nodes),
            Operator::MutateParameters => mutate_parameters(recipient, &config.mutation, rng, max_nodes),
        }
    }
}

/// Apply `operator` to every `(recipient, donor)` pair in parallel.
///
/// Pair `i` draws from its own `StdRng` seeded with `seed + i`, so results are
/// reproducible regardless of scheduling. All tasks share one lineage counter.
pub fn apply_batch(
    pairs: &[(Genome, Genome)],
    operator: Operator,
    config: &AppConfig,
    lineage: &LineageCounter,
    seed: u64,
) -> Vec<Option<Offspring>> {
    let results: Vec<Option<Offspring>> = pairs
        .par_iter()
        .enumerate()
        .map(|(index, (recipient, donor))| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
            operator.apply(recipient, donor, config, lineage, &mut rng)
        })
        .collect();

    let produced = results.iter().filter(|r| r.is_some()).count();
    debug!("{:?}: {} of {} pairs produced offspring", operator, produced, pairs.len());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{DenseParams, NodeKind};
    use crate::types::Activation;

    fn mlp(units: &[usize], lineage: &LineageCounter) -> Genome {
        let layers = units.iter().map(|&units| {
            NodeKind::Dense(DenseParams { units, activation: Activation::Relu, use_bias: true })
        });
        Genome::sequential(vec![8], layers, vec![4], lineage).unwrap()
    }

    #[test]
    fn test_batch_is_deterministic_per_index() {
        let lineage = LineageCounter::new();
        let pairs: Vec<(Genome, Genome)> = (0..8)
            .map(|_| (mlp(&[16, 16, 4], &lineage), mlp(&[32, 32, 4], &lineage)))
            .collect();
        let config = AppConfig::default();

        let first = apply_batch(&pairs, Operator::Breed, &config, &lineage, 42);
        let second = apply_batch(&pairs, Operator::Breed, &config, &lineage, 42);

        let sizes = |r: &[Option<Offspring>]| -> Vec<Option<usize>> {
            r.iter().map(|o| o.as_ref().map(|o| o.genome.node_count())).collect()
        };
        assert_eq!(sizes(&first), sizes(&second));
        assert!(first.iter().all(|o| o.is_some()));
    }

    #[test]
    fn test_every_operator_is_dispatched() {
        let lineage = LineageCounter::new();
        let recipient = mlp(&[16, 16, 4], &lineage);
        let donor = mlp(&[32, 32, 4], &lineage);
        let config = AppConfig::default();
        let mut rng = StdRng::seed_from_u64(0);

        for operator in Operator::ALL {
            if let Some(child) = operator.apply(&recipient, &donor, &config, &lineage, &mut rng) {
                assert!(child.genome.graph().is_acyclic(), "{:?}", operator);
            }
        }
    }
}
