//! Experiment configuration
//!
//! Loaded from JSON and validated before any population is constructed.
//! Unknown fields, unknown domain names and out-of-range values are all
//! configuration errors.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algorithms::strategy::SelectionStrategy;
use crate::env::beach::{BeachConfig, BeachDomain};
use crate::error::{EvoResult, EvolutionError};
use crate::operators::crossover::DEFAULT_SBX_ETA;
use crate::pareto::hypervolume::DEFAULT_REFERENCE_OFFSET;
use crate::policy::mlp::MlpConfig;
use crate::record::TrajectoryLogPolicy;

/// Smallest population the generational loop supports
pub const MIN_POPULATION_SIZE: usize = 4;

/// Generational loop configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvolutionConfig {
    /// Individuals per generation (per subpopulation when coevolving)
    pub population_size: usize,
    /// Generations to run
    pub num_generations: usize,
    /// Seed for the single run RNG
    pub seed: u64,
    /// Parent-selection rule
    pub strategy: SelectionStrategy,
    /// SBX distribution index
    pub crossover_eta: f64,
    /// Per-parameter mutation probability
    pub mutation_rate: f64,
    /// Half-width of the mutation interval
    pub mutation_scale: f64,
    /// Reference point offset above the origin
    pub reference_offset: f64,
    /// Run rollouts and counterfactuals on the rayon pool
    pub parallel_evaluation: bool,
    /// Keep trajectories in records every N generations (and in the last one)
    pub trajectory_log_interval: Option<usize>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            num_generations: 100,
            seed: 2024,
            strategy: SelectionStrategy::default(),
            crossover_eta: DEFAULT_SBX_ETA,
            mutation_rate: 0.1,
            mutation_scale: 0.1,
            reference_offset: DEFAULT_REFERENCE_OFFSET,
            parallel_evaluation: true,
            trajectory_log_interval: None,
        }
    }
}

impl EvolutionConfig {
    /// Set the population size
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Set the number of generations
    pub fn with_num_generations(mut self, generations: usize) -> Self {
        self.num_generations = generations;
        self
    }

    /// Set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the selection strategy
    pub fn with_strategy(mut self, strategy: SelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the SBX distribution index
    pub fn with_crossover_eta(mut self, eta: f64) -> Self {
        self.crossover_eta = eta;
        self
    }

    /// Set mutation rate and scale
    pub fn with_mutation(mut self, rate: f64, scale: f64) -> Self {
        self.mutation_rate = rate;
        self.mutation_scale = scale;
        self
    }

    /// Set the reference point offset
    pub fn with_reference_offset(mut self, offset: f64) -> Self {
        self.reference_offset = offset;
        self
    }

    /// Enable or disable parallel evaluation
    pub fn with_parallel_evaluation(mut self, enabled: bool) -> Self {
        self.parallel_evaluation = enabled;
        self
    }

    /// Keep trajectories every `interval` generations
    pub fn with_trajectory_log_interval(mut self, interval: usize) -> Self {
        self.trajectory_log_interval = Some(interval);
        self
    }

    /// Trajectory logging derived from this configuration
    pub fn trajectory_log_policy(&self) -> TrajectoryLogPolicy {
        match self.trajectory_log_interval {
            Some(interval) => {
                TrajectoryLogPolicy::every(interval).with_final(self.num_generations)
            }
            None => TrajectoryLogPolicy::never(),
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> EvoResult<()> {
        if self.population_size < MIN_POPULATION_SIZE {
            return Err(EvolutionError::Configuration(format!(
                "population_size must be at least {}, got {}",
                MIN_POPULATION_SIZE, self.population_size
            )));
        }
        if !(self.crossover_eta >= 0.0 && self.crossover_eta.is_finite()) {
            return Err(EvolutionError::Configuration(format!(
                "crossover_eta must be a non-negative number, got {}",
                self.crossover_eta
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EvolutionError::Configuration(format!(
                "mutation_rate must be in [0, 1], got {}",
                self.mutation_rate
            )));
        }
        if !(self.mutation_scale >= 0.0 && self.mutation_scale.is_finite()) {
            return Err(EvolutionError::Configuration(format!(
                "mutation_scale must be a non-negative number, got {}",
                self.mutation_scale
            )));
        }
        if !(self.reference_offset >= 0.0 && self.reference_offset.is_finite()) {
            return Err(EvolutionError::Configuration(format!(
                "reference_offset must be a non-negative number, got {}",
                self.reference_offset
            )));
        }
        if self.trajectory_log_interval == Some(0) {
            return Err(EvolutionError::Configuration(
                "trajectory_log_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which bundled domain to run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainConfig {
    /// Multi-objective beach problem
    Beach(BeachConfig),
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self::Beach(BeachConfig::default())
    }
}

impl DomainConfig {
    /// Domain name as written in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            Self::Beach(_) => "beach",
        }
    }

    /// Build the beach domain, failing for any other domain
    pub fn beach(&self) -> EvoResult<BeachDomain> {
        match self {
            Self::Beach(config) => BeachDomain::new(config.clone()),
        }
    }
}

/// Complete experiment configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Generational loop
    pub evolution: EvolutionConfig,
    /// Policy network
    pub policy: MlpConfig,
    /// Domain and its parameters
    pub domain: DomainConfig,
}

impl ExperimentConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> EvoResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EvolutionError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> EvoResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EvolutionError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Check every section
    pub fn validate(&self) -> EvoResult<()> {
        self.evolution.validate()?;
        self.policy.validate()?;
        match &self.domain {
            DomainConfig::Beach(config) => BeachDomain::new(config.clone()).map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_validate() {
        assert!(ExperimentConfig::default().validate().is_ok());
        assert_eq!(EvolutionConfig::default().crossover_eta, 15.0);
        assert_eq!(EvolutionConfig::default().reference_offset, 1e-6);
    }

    #[test]
    fn test_parse_full_document() {
        let json = r#"{
            "evolution": {
                "population_size": 8,
                "num_generations": 3,
                "seed": 7,
                "strategy": "k_parent",
                "mutation_rate": 0.2,
                "trajectory_log_interval": 2
            },
            "policy": { "hidden_layers": [8, 8], "output_activation": "softmax" },
            "domain": { "domain": "beach", "capacity": 2.0, "episode_length": 5 }
        }"#;
        let config = ExperimentConfig::from_json_str(json).unwrap();

        assert_eq!(config.evolution.population_size, 8);
        assert_eq!(config.evolution.strategy, SelectionStrategy::KParent);
        assert_eq!(config.evolution.mutation_scale, 0.1);
        assert_eq!(config.policy.hidden_layers, vec![8, 8]);
        match &config.domain {
            DomainConfig::Beach(beach) => {
                assert_eq!(beach.capacity, 2.0);
                assert_eq!(beach.sections.len(), 5);
            }
        }
        assert!(config.evolution.trajectory_log_policy().includes(3));
        assert!(config.evolution.trajectory_log_policy().includes(2));
        assert!(!config.evolution.trajectory_log_policy().includes(1));
    }

    #[test]
    fn test_unknown_domain_rejected() {
        let json = r#"{ "domain": { "domain": "rover" } }"#;
        let err = ExperimentConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, EvolutionError::Configuration(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{ "evolution": { "pop_size": 10 } }"#;
        assert!(ExperimentConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_small_population_rejected() {
        let json = r#"{ "evolution": { "population_size": 3 } }"#;
        assert!(ExperimentConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert!(EvolutionConfig::default()
            .with_mutation(1.5, 0.1)
            .validate()
            .is_err());
        assert!(EvolutionConfig::default()
            .with_crossover_eta(-1.0)
            .validate()
            .is_err());
        assert!(EvolutionConfig::default()
            .with_reference_offset(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_invalid_domain_values_rejected() {
        let json = r#"{ "domain": { "domain": "beach", "capacity": 0.0 } }"#;
        assert!(ExperimentConfig::from_json_str(json).is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("experiment.json");
        std::fs::write(&path, r#"{ "evolution": { "seed": 11 } }"#).unwrap();

        let config = ExperimentConfig::from_path(&path).unwrap();
        assert_eq!(config.evolution.seed, 11);
        assert!(ExperimentConfig::from_path(dir.path().join("missing.json")).is_err());
    }
}
