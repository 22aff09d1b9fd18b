//! Checkpoint state structures
//!
//! Complete generational state for checkpointing and recovery.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;

use crate::diagnostics::GenerationStats;
use crate::policy::traits::Policy;
use crate::population::individual::{IdCounter, Individual};

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Complete evolution state for checkpointing
///
/// Captured between generations: the population is the reproduced,
/// not-yet-evaluated set the next generation starts from.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "P: Serialize", deserialize = "P: DeserializeOwned"))]
pub struct Checkpoint<P: Policy> {
    /// Schema version for forward compatibility
    pub version: u32,
    /// Generations completed
    pub generation: usize,
    /// Next id the counter will hand out
    pub next_id: i64,
    /// Total rollouts
    pub evaluations: usize,
    /// Seed the run was started with
    pub seed: u64,
    /// Population to resume from
    pub population: Vec<Individual<P>>,
    /// Statistics history
    pub statistics: Vec<GenerationStats>,
    /// Custom metadata
    pub metadata: HashMap<String, String>,
}

impl<P: Policy> Checkpoint<P> {
    /// Create a new checkpoint
    pub fn new(generation: usize, population: Vec<Individual<P>>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            generation,
            next_id: 0,
            evaluations: 0,
            seed: 0,
            population,
            statistics: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Record the id counter position
    pub fn with_id_counter(mut self, ids: &IdCounter) -> Self {
        self.next_id = ids.peek();
        self
    }

    /// Set the number of evaluations
    pub fn with_evaluations(mut self, evaluations: usize) -> Self {
        self.evaluations = evaluations;
        self
    }

    /// Set the run seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Add statistics history
    pub fn with_statistics(mut self, stats: Vec<GenerationStats>) -> Self {
        self.statistics = stats;
        self
    }

    /// Add custom metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// An id counter continuing where the checkpointed run stopped
    pub fn id_counter(&self) -> IdCounter {
        IdCounter::new(self.next_id)
    }

    /// Check if checkpoint is compatible with current version
    pub fn is_compatible(&self) -> bool {
        self.version <= CHECKPOINT_VERSION
    }

    /// Get the checkpoint version
    pub fn version(&self) -> u32 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::mlp::{MlpPolicy, OutputActivation};

    fn population(n: usize) -> Vec<Individual<MlpPolicy>> {
        (0..n)
            .map(|i| {
                let policy = MlpPolicy::from_parameters(
                    vec![1, 1],
                    vec![i as f64, 0.5],
                    OutputActivation::Tanh,
                )
                .unwrap();
                Individual::new(vec![policy.clone(), policy], i as i64)
            })
            .collect()
    }

    #[test]
    fn test_checkpoint_builder_methods() {
        let ids = IdCounter::new(17);
        let checkpoint = Checkpoint::new(4, population(3))
            .with_id_counter(&ids)
            .with_evaluations(120)
            .with_seed(9)
            .with_metadata("strategy", "difference_credit");

        assert_eq!(checkpoint.generation, 4);
        assert_eq!(checkpoint.next_id, 17);
        assert_eq!(checkpoint.evaluations, 120);
        assert_eq!(checkpoint.seed, 9);
        assert_eq!(
            checkpoint.metadata.get("strategy").map(String::as_str),
            Some("difference_credit")
        );
        assert!(checkpoint.is_compatible());
    }

    #[test]
    fn test_id_counter_resumes() {
        let ids = IdCounter::new(0);
        for _ in 0..5 {
            ids.next_id();
        }
        let checkpoint = Checkpoint::new(1, population(1)).with_id_counter(&ids);
        assert_eq!(checkpoint.id_counter().next_id(), 5);
    }

    #[test]
    fn test_json_serde() {
        let checkpoint = Checkpoint::new(2, population(2)).with_evaluations(8);
        let json = serde_json::to_string(&checkpoint).unwrap();
        let back: Checkpoint<MlpPolicy> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.population.len(), 2);
        assert_eq!(back.population[1].joint_policy, checkpoint.population[1].joint_policy);
    }
}
