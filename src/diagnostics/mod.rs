//! Diagnostics and statistics
//!
//! This module provides per-generation front statistics and the run-level
//! history.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EvoResult;
use crate::fitness::traits::Fitness;
use crate::pareto::dominance::fast_non_dominated_sort;
use crate::pareto::hypervolume::Hypervolume;
use crate::policy::traits::Policy;
use crate::population::individual::Individual;
use crate::population::population::{fitnesses_of, Population};

/// Statistics for a single generation
///
/// Objective values use the internal lower-is-better convention.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation number
    pub generation: usize,
    /// Total rollouts so far
    pub evaluations: usize,
    /// Number of non-dominated fronts
    pub num_fronts: usize,
    /// Size of the first front
    pub front_size: usize,
    /// Hypervolume of the first front
    pub hypervolume: f64,
    /// Lowest value seen on each objective
    pub best_objectives: Vec<f64>,
    /// Mean per-slot parameter distance
    pub diversity: f64,
    /// Timing information
    pub timing: TimingStats,
}

/// Timing statistics
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    /// Time spent on rollouts (ms)
    pub evaluation_ms: f64,
    /// Time spent sorting and truncating (ms)
    pub ranking_ms: f64,
    /// Time spent on credit assignment (ms)
    pub credit_ms: f64,
    /// Time spent building offspring (ms)
    pub reproduction_ms: f64,
    /// Total generation time (ms)
    pub total_ms: f64,
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

impl TimingStats {
    /// Create new timing stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Set evaluation time
    pub fn with_evaluation(mut self, duration: Duration) -> Self {
        self.evaluation_ms = millis(duration);
        self
    }

    /// Set ranking time
    pub fn with_ranking(mut self, duration: Duration) -> Self {
        self.ranking_ms = millis(duration);
        self
    }

    /// Set credit assignment time
    pub fn with_credit(mut self, duration: Duration) -> Self {
        self.credit_ms = millis(duration);
        self
    }

    /// Set reproduction time
    pub fn with_reproduction(mut self, duration: Duration) -> Self {
        self.reproduction_ms = millis(duration);
        self
    }

    /// Set total time
    pub fn with_total(mut self, duration: Duration) -> Self {
        self.total_ms = millis(duration);
        self
    }
}

impl GenerationStats {
    /// Compute statistics from evaluated individuals
    pub fn from_individuals<P: Policy>(
        individuals: &[Individual<P>],
        generation: usize,
        evaluations: usize,
        hypervolume: &Hypervolume,
    ) -> EvoResult<Self> {
        let fitnesses = fitnesses_of(individuals)?;
        Self::from_fitnesses(&fitnesses, generation, evaluations, hypervolume)
    }

    /// Compute statistics from an evaluated population
    pub fn from_population<P: Policy>(
        population: &Population<P>,
        evaluations: usize,
        hypervolume: &Hypervolume,
    ) -> EvoResult<Self> {
        let mut stats = Self::from_individuals(
            population.individuals(),
            population.generation(),
            evaluations,
            hypervolume,
        )?;
        stats.diversity = population.diversity();
        Ok(stats)
    }

    /// Compute statistics from fitness vectors alone
    pub fn from_fitnesses(
        fitnesses: &[&Fitness],
        generation: usize,
        evaluations: usize,
        hypervolume: &Hypervolume,
    ) -> EvoResult<Self> {
        let partition = fast_non_dominated_sort(fitnesses);
        let front: Vec<&Fitness> = partition.first().iter().map(|&i| fitnesses[i]).collect();

        let num_objectives = fitnesses.first().map_or(0, |f| f.num_objectives());
        let best_objectives = (0..num_objectives)
            .map(|k| {
                fitnesses
                    .iter()
                    .map(|f| f.objectives()[k])
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();

        Ok(Self {
            generation,
            evaluations,
            num_fronts: partition.len(),
            front_size: front.len(),
            hypervolume: hypervolume.compute(&front)?,
            best_objectives,
            diversity: 0.0,
            timing: TimingStats::default(),
        })
    }

    /// Set timing information
    pub fn with_timing(mut self, timing: TimingStats) -> Self {
        self.timing = timing;
        self
    }
}

/// Statistics collector for an entire evolution run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EvolutionStats {
    /// Statistics per generation
    pub generations: Vec<GenerationStats>,
    /// Total runtime in milliseconds
    pub total_runtime_ms: f64,
    /// Reason for termination
    pub termination_reason: Option<String>,
}

impl EvolutionStats {
    /// Create a new stats collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a generation's statistics
    pub fn record(&mut self, stats: GenerationStats) {
        self.generations.push(stats);
    }

    /// Get the number of generations recorded
    pub fn num_generations(&self) -> usize {
        self.generations.len()
    }

    /// Largest first-front hypervolume of the run
    pub fn best_hypervolume(&self) -> Option<f64> {
        self.generations
            .iter()
            .map(|g| g.hypervolume)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// First-front hypervolume of the last recorded generation
    pub fn final_hypervolume(&self) -> Option<f64> {
        self.generations.last().map(|g| g.hypervolume)
    }

    /// First-front hypervolume per generation
    pub fn hypervolume_history(&self) -> Vec<f64> {
        self.generations.iter().map(|g| g.hypervolume).collect()
    }

    /// First-front size per generation
    pub fn front_size_history(&self) -> Vec<usize> {
        self.generations.iter().map(|g| g.front_size).collect()
    }

    /// Get the history of diversity values
    pub fn diversity_history(&self) -> Vec<f64> {
        self.generations.iter().map(|g| g.diversity).collect()
    }

    /// Set the termination reason
    pub fn set_termination_reason(&mut self, reason: &str) {
        self.termination_reason = Some(reason.to_string());
    }

    /// Set the total runtime
    pub fn set_runtime(&mut self, duration: Duration) {
        self.total_runtime_ms = millis(duration);
    }

    /// Get a summary of the evolution run
    pub fn summary(&self) -> String {
        format!(
            "Evolution Summary:\n\
             - Generations: {}\n\
             - Best hypervolume: {:.6}\n\
             - Final hypervolume: {:.6}\n\
             - Final front size: {}\n\
             - Runtime: {:.2}ms\n\
             - Termination: {}",
            self.num_generations(),
            self.best_hypervolume().unwrap_or(0.0),
            self.final_hypervolume().unwrap_or(0.0),
            self.generations.last().map_or(0, |g| g.front_size),
            self.total_runtime_ms,
            self.termination_reason.as_deref().unwrap_or("unknown")
        )
    }
}

/// Result of an evolution run
#[derive(Clone, Debug)]
pub struct EvolutionResult<P: Policy> {
    /// Final evaluated population
    pub population: Population<P>,
    /// Members of the final first front
    pub pareto_front: Vec<Individual<P>>,
    /// Number of generations completed
    pub generations: usize,
    /// Total rollouts
    pub evaluations: usize,
    /// Statistics for the run
    pub stats: EvolutionStats,
}

impl<P: Policy> EvolutionResult<P> {
    /// Create a new evolution result, extracting the first front
    pub fn new(population: Population<P>, generations: usize, evaluations: usize) -> EvoResult<Self> {
        let pareto_front = population.pareto_front()?.into_iter().cloned().collect();
        Ok(Self {
            population,
            pareto_front,
            generations,
            evaluations,
            stats: EvolutionStats::new(),
        })
    }

    /// Add statistics to the result
    pub fn with_stats(mut self, stats: EvolutionStats) -> Self {
        self.stats = stats;
        self
    }
}

pub mod prelude {
    pub use super::{EvolutionResult, EvolutionStats, GenerationStats, TimingStats};
}
