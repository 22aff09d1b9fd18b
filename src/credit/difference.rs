//! Difference credit (DMO)
//!
//! For every front of a set of evaluated individuals, each agent's credit is
//! the hypervolume the front loses when that agent's stream is removed from
//! its team's trajectory and the remainder is re-scored.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::env::traits::{Environment, Trajectory};
use crate::error::{EvoResult, EvolutionError};
use crate::fitness::traits::Fitness;
use crate::pareto::dominance::fast_non_dominated_sort;
use crate::pareto::hypervolume::{Hypervolume, ReferencePoint};
use crate::policy::traits::Policy;
use crate::population::individual::Individual;
use crate::population::population::fitnesses_of;

/// Per-(individual, slot) difference values
///
/// Row `i` belongs to the `i`-th individual of the slice the matrix was
/// computed from; column `p` to team slot `p`. Higher is better.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifferenceMatrix {
    values: Vec<f64>,
    num_individuals: usize,
    team_size: usize,
}

impl DifferenceMatrix {
    /// All-zero matrix
    pub fn zeros(num_individuals: usize, team_size: usize) -> Self {
        Self {
            values: vec![0.0; num_individuals * team_size],
            num_individuals,
            team_size,
        }
    }

    /// Number of rows
    pub fn num_individuals(&self) -> usize {
        self.num_individuals
    }

    /// Number of columns
    pub fn team_size(&self) -> usize {
        self.team_size
    }

    /// Value for an individual's slot
    pub fn get(&self, individual: usize, slot: usize) -> f64 {
        self.values[individual * self.team_size + slot]
    }

    /// Set the value for an individual's slot
    pub fn set(&mut self, individual: usize, slot: usize, value: f64) {
        self.values[individual * self.team_size + slot] = value;
    }

    /// All slot values of one individual
    pub fn row(&self, individual: usize) -> &[f64] {
        let start = individual * self.team_size;
        &self.values[start..start + self.team_size]
    }

    /// One slot's values across all individuals
    pub fn column(&self, slot: usize) -> Vec<f64> {
        (0..self.num_individuals)
            .map(|i| self.get(i, slot))
            .collect()
    }
}

/// Fitness of a trajectory with one agent's stream removed
///
/// The environment re-scores the remaining streams; rewards go through the
/// same negation as rollout rewards.
pub fn counterfactual_fitness<E: Environment>(
    trajectory: &Trajectory,
    slot: usize,
    env: &E,
) -> EvoResult<Fitness> {
    if slot >= trajectory.team_size() {
        return Err(EvolutionError::TeamSizeMismatch {
            expected: slot + 1,
            actual: trajectory.team_size(),
        });
    }
    let rewards = env.evaluate_trajectory(&trajectory.without_agent(slot))?;
    Fitness::from_rewards(&rewards, env.num_objectives())
}

/// One front of the set being credited
struct FrontView<'a> {
    /// Indices into the credited slice
    members: &'a [usize],
    /// Fitness of each member, in member order
    points: Vec<&'a Fitness>,
    /// Hypervolume of `points`
    volume: f64,
}

/// Difference credit assignment over Pareto fronts
#[derive(Clone, Debug)]
pub struct DifferenceCredit {
    hypervolume: Hypervolume,
}

impl DifferenceCredit {
    /// Credit engine using a reference point `offset` above the origin
    pub fn new(num_objectives: usize, offset: f64) -> Self {
        Self::with_reference(ReferencePoint::with_offset(num_objectives, offset))
    }

    /// Credit engine with an explicit reference point
    pub fn with_reference(reference: ReferencePoint) -> Self {
        Self {
            hypervolume: Hypervolume::new(reference),
        }
    }

    /// The hypervolume indicator used for every front
    pub fn hypervolume(&self) -> &Hypervolume {
        &self.hypervolume
    }

    /// Difference values for every (individual, slot) pair
    ///
    /// Individuals must all be evaluated and carry their rollout trajectory.
    /// Fronts are taken over `individuals` alone.
    pub fn compute<P: Policy, E: Environment>(
        &self,
        individuals: &[Individual<P>],
        env: &E,
    ) -> EvoResult<DifferenceMatrix> {
        let team_size = env.team_size();
        let mut matrix = DifferenceMatrix::zeros(individuals.len(), team_size);
        if individuals.is_empty() {
            return Ok(matrix);
        }

        for individual in individuals {
            if individual.team_size() != team_size {
                return Err(EvolutionError::TeamSizeMismatch {
                    expected: team_size,
                    actual: individual.team_size(),
                });
            }
        }

        let fitnesses = fitnesses_of(individuals)?;
        let partition = fast_non_dominated_sort(&fitnesses);

        for (rank, members) in partition.fronts().iter().enumerate() {
            let points: Vec<&Fitness> = members.iter().map(|&i| fitnesses[i]).collect();
            let volume = self.hypervolume.compute(&points)?;
            trace!(rank, size = members.len(), hypervolume = volume, "front hypervolume");

            let front = FrontView {
                members,
                points,
                volume,
            };
            let pairs: Vec<(usize, usize)> = (0..members.len())
                .flat_map(|pos| (0..team_size).map(move |slot| (pos, slot)))
                .collect();

            let values = self.score_pairs(&pairs, &front, individuals, env)?;
            for (&(pos, slot), value) in pairs.iter().zip(values) {
                matrix.set(members[pos], slot, value);
            }
        }

        debug!(
            individuals = individuals.len(),
            fronts = partition.len(),
            "difference credit assigned"
        );
        Ok(matrix)
    }

    /// `H - H_cf` for one member of a front and one of its slots
    fn pair_value<P: Policy, E: Environment>(
        &self,
        pos: usize,
        slot: usize,
        front: &FrontView<'_>,
        individuals: &[Individual<P>],
        env: &E,
    ) -> EvoResult<f64> {
        let individual = &individuals[front.members[pos]];
        let trajectory = individual
            .trajectory
            .as_ref()
            .ok_or(EvolutionError::InvalidState {
                expected: "trajectory recorded",
                found: "no trajectory",
            })?;

        let cf = counterfactual_fitness(trajectory, slot, env)?;
        let cf_points: Vec<&Fitness> = front
            .points
            .iter()
            .enumerate()
            .map(|(i, &f)| if i == pos { &cf } else { f })
            .collect();

        Ok(front.volume - self.hypervolume.compute(&cf_points)?)
    }
}

#[cfg(feature = "parallel")]
impl DifferenceCredit {
    fn score_pairs<P: Policy, E: Environment>(
        &self,
        pairs: &[(usize, usize)],
        front: &FrontView<'_>,
        individuals: &[Individual<P>],
        env: &E,
    ) -> EvoResult<Vec<f64>> {
        pairs
            .par_iter()
            .map(|&(pos, slot)| self.pair_value(pos, slot, front, individuals, env))
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
impl DifferenceCredit {
    fn score_pairs<P: Policy, E: Environment>(
        &self,
        pairs: &[(usize, usize)],
        front: &FrontView<'_>,
        individuals: &[Individual<P>],
        env: &E,
    ) -> EvoResult<Vec<f64>> {
        pairs
            .iter()
            .map(|&(pos, slot)| self.pair_value(pos, slot, front, individuals, env))
            .collect()
    }
}
