//! Multi-objective beach domain
//!
//! Tourists of two types occupy a row of beach sections and move one section
//! left, right, or stay each timestep. Two team objectives are rewarded every
//! timestep and summed over the episode:
//!
//! - capacity: `Σ n·exp(−n/cap)` over sections, peaking when each section holds `cap` tourists
//! - mixture: `Σ min(n₀, n₁) / ((n₀ + n₁)·S)` over occupied sections, rewarding type balance
//!
//! Recorded positions are the ones scored at each timestep, so re-scoring a full
//! trajectory reproduces the rollout's rewards exactly.

use serde::{Deserialize, Serialize};

use crate::env::traits::{Environment, Rollout, Trajectory, Transition};
use crate::error::{EvoResult, EvolutionError};
use crate::policy::traits::Policy;

/// Starting occupancy of one section
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionConfig {
    /// Type-0 tourists starting here
    pub num_type0_agents: usize,
    /// Type-1 tourists starting here
    pub num_type1_agents: usize,
}

/// Beach domain configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BeachConfig {
    /// Sections, left to right
    pub sections: Vec<SectionConfig>,
    /// Ideal occupancy per section
    pub capacity: f64,
    /// Timesteps per episode
    pub episode_length: usize,
}

impl Default for BeachConfig {
    fn default() -> Self {
        Self {
            sections: vec![
                SectionConfig {
                    num_type0_agents: 1,
                    num_type1_agents: 1,
                };
                5
            ],
            capacity: 3.0,
            episode_length: 10,
        }
    }
}

/// Number of discrete moves: left, stay, right
const NUM_MOVES: usize = 3;

/// The beach environment
#[derive(Clone, Debug)]
pub struct BeachDomain {
    config: BeachConfig,
    start_positions: Vec<usize>,
    types: Vec<u32>,
}

impl BeachDomain {
    /// Create a new beach domain
    pub fn new(config: BeachConfig) -> EvoResult<Self> {
        if config.sections.is_empty() {
            return Err(EvolutionError::Configuration(
                "beach domain needs at least one section".to_string(),
            ));
        }
        if config.capacity.is_nan() || config.capacity <= 0.0 {
            return Err(EvolutionError::Configuration(format!(
                "beach capacity must be positive, got {}",
                config.capacity
            )));
        }

        let mut start_positions = Vec::new();
        let mut types = Vec::new();
        for (i, section) in config.sections.iter().enumerate() {
            for _ in 0..section.num_type0_agents {
                start_positions.push(i);
                types.push(0);
            }
            for _ in 0..section.num_type1_agents {
                start_positions.push(i);
                types.push(1);
            }
        }
        if start_positions.is_empty() {
            return Err(EvolutionError::Configuration(
                "beach domain needs at least one tourist".to_string(),
            ));
        }

        Ok(Self {
            config,
            start_positions,
            types,
        })
    }

    /// Number of sections
    pub fn num_sections(&self) -> usize {
        self.config.sections.len()
    }

    /// Capacity reward of a single section holding `n` tourists
    pub fn capacity_reward(&self, n: usize) -> f64 {
        let n = n as f64;
        n * (-n / self.config.capacity).exp()
    }

    /// Mixture reward of a single section
    pub fn mixture_reward(&self, n0: usize, n1: usize) -> f64 {
        let total = n0 + n1;
        if total == 0 {
            return 0.0;
        }
        n0.min(n1) as f64 / (total * self.num_sections()) as f64
    }

    /// Team rewards `[capacity, mixture]` for one snapshot of positions
    pub fn global_rewards(&self, positions: &[usize], types: &[u32]) -> Vec<f64> {
        let mut occupancy = vec![[0usize; 2]; self.num_sections()];
        for (&p, &t) in positions.iter().zip(types) {
            occupancy[p][(t as usize).min(1)] += 1;
        }

        let capacity = occupancy
            .iter()
            .map(|o| self.capacity_reward(o[0] + o[1]))
            .sum();
        let mixture = occupancy
            .iter()
            .map(|o| self.mixture_reward(o[0], o[1]))
            .sum();
        vec![capacity, mixture]
    }

    /// Observation for every agent: section occupancy fractions followed by a
    /// one-hot encoding of the agent's own section
    fn observations(&self, positions: &[usize]) -> Vec<Vec<f64>> {
        let sections = self.num_sections();
        let team = positions.len() as f64;
        let mut occupancy = vec![0.0; sections];
        for &p in positions {
            occupancy[p] += 1.0 / team;
        }

        positions
            .iter()
            .map(|&p| {
                let mut obs = occupancy.clone();
                obs.extend((0..sections).map(|s| if s == p { 1.0 } else { 0.0 }));
                obs
            })
            .collect()
    }

    fn apply_move(&self, position: usize, delta: i64) -> usize {
        let last = self.num_sections() as i64 - 1;
        (position as i64 + delta).clamp(0, last) as usize
    }
}

/// Index of the first maximum
fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
        .0
}

impl Environment for BeachDomain {
    fn name(&self) -> &'static str {
        "beach"
    }

    fn team_size(&self) -> usize {
        self.start_positions.len()
    }

    fn state_size(&self) -> usize {
        2 * self.num_sections()
    }

    fn action_size(&self) -> usize {
        NUM_MOVES
    }

    fn num_objectives(&self) -> usize {
        2
    }

    fn rollout<P: Policy>(&self, joint_policy: &[P]) -> EvoResult<Rollout> {
        if joint_policy.len() != self.team_size() {
            return Err(EvolutionError::TeamSizeMismatch {
                expected: self.team_size(),
                actual: joint_policy.len(),
            });
        }

        let mut positions = self.start_positions.clone();
        let mut trajectory = Trajectory::with_team_size(self.team_size());
        let mut rewards = vec![0.0; self.num_objectives()];

        for _ in 0..self.config.episode_length {
            let observations = self.observations(&positions);

            let moves: Vec<i64> = joint_policy
                .iter()
                .zip(observations.iter())
                .map(|(policy, obs)| argmax(&policy.act(obs)) as i64 - 1)
                .collect();

            for (i, &delta) in moves.iter().enumerate() {
                positions[i] = self.apply_move(positions[i], delta);
            }

            for (i, (obs, &delta)) in observations.into_iter().zip(moves.iter()).enumerate() {
                trajectory.push(
                    i,
                    Transition {
                        state: obs,
                        action: vec![delta as f64],
                        position: vec![positions[i] as f64],
                        kind: Some(self.types[i]),
                    },
                );
            }

            for (total, r) in rewards
                .iter_mut()
                .zip(self.global_rewards(&positions, &self.types))
            {
                *total += r;
            }
        }

        Ok(Rollout {
            trajectory,
            rewards,
        })
    }

    fn evaluate_trajectory(&self, trajectory: &Trajectory) -> EvoResult<Vec<f64>> {
        let mut rewards = vec![0.0; self.num_objectives()];

        for step in trajectory.timesteps() {
            let mut positions = Vec::with_capacity(step.len());
            let mut types = Vec::with_capacity(step.len());
            for transition in step {
                let section = transition
                    .position
                    .first()
                    .map(|p| p.round())
                    .filter(|p| *p >= 0.0 && (*p as usize) < self.num_sections())
                    .ok_or_else(|| {
                        EvolutionError::Environment(format!(
                            "invalid beach position {:?}",
                            transition.position
                        ))
                    })?;
                let kind = transition.kind.ok_or_else(|| {
                    EvolutionError::Environment("beach transition is missing a tourist type".to_string())
                })?;
                positions.push(section as usize);
                types.push(kind);
            }

            for (total, r) in rewards.iter_mut().zip(self.global_rewards(&positions, &types)) {
                *total += r;
            }
        }

        Ok(rewards)
    }
}
