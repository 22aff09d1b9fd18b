//! Additive single-step environment for unit tests
//!
//! Every agent observes `[1.0]` once and its action, rescaled from `[-1, 1]`
//! to `[0, 1]`, becomes its position. Team reward per objective is the sum of
//! positions, so removing an agent never increases any reward.

use crate::env::traits::{Environment, Rollout, Trajectory, Transition};
use crate::error::{EvoResult, EvolutionError};
use crate::policy::traits::Policy;

#[derive(Clone, Debug)]
pub(crate) struct AdditiveEnv {
    pub team_size: usize,
    pub num_objectives: usize,
}

impl AdditiveEnv {
    pub fn new(team_size: usize, num_objectives: usize) -> Self {
        Self {
            team_size,
            num_objectives,
        }
    }

    /// Trajectory whose single timestep places each agent at the given point
    pub fn trajectory(positions: &[Vec<f64>]) -> Trajectory {
        Trajectory::new(
            positions
                .iter()
                .map(|p| {
                    vec![Transition {
                        state: vec![1.0],
                        action: p.clone(),
                        position: p.clone(),
                        kind: None,
                    }]
                })
                .collect(),
        )
    }
}

impl Environment for AdditiveEnv {
    fn name(&self) -> &'static str {
        "additive"
    }

    fn team_size(&self) -> usize {
        self.team_size
    }

    fn state_size(&self) -> usize {
        1
    }

    fn action_size(&self) -> usize {
        self.num_objectives
    }

    fn num_objectives(&self) -> usize {
        self.num_objectives
    }

    fn rollout<P: Policy>(&self, joint_policy: &[P]) -> EvoResult<Rollout> {
        if joint_policy.len() != self.team_size {
            return Err(EvolutionError::TeamSizeMismatch {
                expected: self.team_size,
                actual: joint_policy.len(),
            });
        }
        let positions: Vec<Vec<f64>> = joint_policy
            .iter()
            .map(|p| p.act(&[1.0]).iter().map(|a| (a + 1.0) / 2.0).collect())
            .collect();
        let trajectory = Self::trajectory(&positions);
        let rewards = self.evaluate_trajectory(&trajectory)?;
        Ok(Rollout {
            trajectory,
            rewards,
        })
    }

    fn evaluate_trajectory(&self, trajectory: &Trajectory) -> EvoResult<Vec<f64>> {
        let mut rewards = vec![0.0; self.num_objectives];
        for step in trajectory.timesteps() {
            for transition in step {
                for (total, x) in rewards.iter_mut().zip(&transition.position) {
                    *total += x;
                }
            }
        }
        Ok(rewards)
    }
}
