//! Population type
//!
//! This module provides the flat Population container used by the centralised
//! algorithms.

use rand::seq::SliceRandom;
use rand::Rng;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::env::traits::Environment;
use crate::error::{EvoResult, EvolutionError};
use crate::fitness::traits::Fitness;
use crate::pareto::dominance::fast_non_dominated_sort;
use crate::policy::traits::{Policy, PolicyShape};
use crate::population::individual::{IdCounter, Individual};

/// A population of individuals
#[derive(Clone, Debug)]
pub struct Population<P: Policy> {
    individuals: Vec<Individual<P>>,
    generation: usize,
}

impl<P: Policy> Default for Population<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Policy> Population<P> {
    /// Create an empty population
    pub fn new() -> Self {
        Self {
            individuals: Vec::new(),
            generation: 0,
        }
    }

    /// Create a population from a vector of individuals
    pub fn from_individuals(individuals: Vec<Individual<P>>) -> Self {
        Self {
            individuals,
            generation: 0,
        }
    }

    /// Create a random population, assigning every member a fresh id
    pub fn random<R: Rng + ?Sized>(
        size: usize,
        config: &P::Config,
        shape: PolicyShape,
        team_size: usize,
        ids: &IdCounter,
        rng: &mut R,
    ) -> Self {
        let individuals = (0..size)
            .map(|_| Individual::generate(config, shape, team_size, ids, rng))
            .collect();
        Self::from_individuals(individuals)
    }

    /// Get the current generation
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Set the generation number
    pub fn set_generation(&mut self, generation: usize) {
        self.generation = generation;
    }

    /// Get the population size
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Check if the population is empty
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Get an individual by index
    pub fn get(&self, index: usize) -> Option<&Individual<P>> {
        self.individuals.get(index)
    }

    /// Add an individual to the population
    pub fn push(&mut self, individual: Individual<P>) {
        self.individuals.push(individual);
    }

    /// Get an iterator over the individuals
    pub fn iter(&self) -> impl Iterator<Item = &Individual<P>> {
        self.individuals.iter()
    }

    /// Get the underlying slice of individuals
    pub fn individuals(&self) -> &[Individual<P>] {
        &self.individuals
    }

    /// Get mutable access to the underlying vector
    pub fn individuals_mut(&mut self) -> &mut Vec<Individual<P>> {
        &mut self.individuals
    }

    /// Take the individuals out of this population
    pub fn into_individuals(self) -> Vec<Individual<P>> {
        self.individuals
    }

    /// Randomise member order
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.individuals.shuffle(rng);
    }

    /// Check if all individuals have been evaluated
    pub fn all_evaluated(&self) -> bool {
        self.individuals.iter().all(|i| i.is_evaluated())
    }

    /// Fitness vectors in member order
    ///
    /// Fails if any member has not been evaluated.
    pub fn fitnesses(&self) -> EvoResult<Vec<&Fitness>> {
        fitnesses_of(&self.individuals)
    }

    /// Evaluate every individual with a fresh rollout (sequential)
    pub fn evaluate<E: Environment>(&mut self, env: &E) -> EvoResult<()> {
        let result = self
            .individuals
            .iter_mut()
            .try_for_each(|individual| individual.evaluate(env));
        self.discard_on_error(result)
    }

    /// A failed evaluation leaves no member evaluated
    fn discard_on_error(&mut self, result: EvoResult<()>) -> EvoResult<()> {
        if result.is_err() {
            for individual in &mut self.individuals {
                individual.reset_fitness();
            }
        }
        result
    }

    /// Members of the first non-dominated front
    pub fn pareto_front(&self) -> EvoResult<Vec<&Individual<P>>> {
        let fitnesses = self.fitnesses()?;
        let partition = fast_non_dominated_sort(&fitnesses);
        Ok(partition
            .first()
            .iter()
            .map(|&i| &self.individuals[i])
            .collect())
    }

    /// Mean pairwise parameter distance per team slot, averaged over slots
    pub fn diversity(&self) -> f64 {
        if self.len() < 2 {
            return 0.0;
        }

        let mut total_distance = 0.0;
        let mut count = 0;

        for i in 0..self.len() {
            for j in (i + 1)..self.len() {
                for (a, b) in self.individuals[i]
                    .joint_policy
                    .iter()
                    .zip(self.individuals[j].joint_policy.iter())
                {
                    total_distance += a.distance(b);
                    count += 1;
                }
            }
        }

        if count == 0 {
            0.0
        } else {
            total_distance / count as f64
        }
    }
}

/// Fitness vectors of a slice of individuals, in order
pub fn fitnesses_of<P: Policy>(individuals: &[Individual<P>]) -> EvoResult<Vec<&Fitness>> {
    individuals
        .iter()
        .map(|i| {
            i.fitness().ok_or(EvolutionError::InvalidState {
                expected: "evaluated",
                found: "unevaluated",
            })
        })
        .collect()
}

/// Parallel evaluation support (requires `parallel` feature)
#[cfg(feature = "parallel")]
impl<P: Policy> Population<P> {
    /// Evaluate every individual with a fresh rollout (parallel)
    pub fn evaluate_parallel<E: Environment>(&mut self, env: &E) -> EvoResult<()> {
        let result = self
            .individuals
            .par_iter_mut()
            .try_for_each(|individual| individual.evaluate(env));
        self.discard_on_error(result)
    }
}

/// Sequential fallback for parallel evaluation (when `parallel` feature is disabled)
#[cfg(not(feature = "parallel"))]
impl<P: Policy> Population<P> {
    /// Evaluate every individual with a fresh rollout (sequential fallback)
    pub fn evaluate_parallel<E: Environment>(&mut self, env: &E) -> EvoResult<()> {
        self.evaluate(env)
    }
}

impl<P: Policy> std::ops::Index<usize> for Population<P> {
    type Output = Individual<P>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.individuals[index]
    }
}
