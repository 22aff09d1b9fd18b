//! Environment capability
//!
//! The environment simulates whole episodes for a joint policy and re-scores
//! recorded trajectories without simulating. Rewards returned here are in the
//! environment's own (maximising) convention.

use serde::{Deserialize, Serialize};

use crate::error::EvoResult;
use crate::policy::traits::{Policy, PolicyShape};

/// One agent's record for one timestep
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Observation the agent acted on
    pub state: Vec<f64>,
    /// Action the agent took
    pub action: Vec<f64>,
    /// Agent position scored at this timestep
    pub position: Vec<f64>,
    /// Optional agent type (domain specific)
    #[serde(default)]
    pub kind: Option<u32>,
}

/// Per-agent ordered sequence of transitions
pub type AgentTrajectory = Vec<Transition>;

/// Team trajectory: one stream per agent, in team-slot order
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    agents: Vec<AgentTrajectory>,
}

impl Trajectory {
    /// Create from per-agent streams
    pub fn new(agents: Vec<AgentTrajectory>) -> Self {
        Self { agents }
    }

    /// Empty streams for a team of the given size
    pub fn with_team_size(team_size: usize) -> Self {
        Self {
            agents: vec![Vec::new(); team_size],
        }
    }

    /// Number of agent streams
    pub fn team_size(&self) -> usize {
        self.agents.len()
    }

    /// Number of timesteps every stream covers
    pub fn num_timesteps(&self) -> usize {
        self.agents.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// A single agent's stream
    pub fn agent(&self, slot: usize) -> Option<&AgentTrajectory> {
        self.agents.get(slot)
    }

    /// All agent streams
    pub fn agents(&self) -> &[AgentTrajectory] {
        &self.agents
    }

    /// Append a transition to an agent's stream
    pub fn push(&mut self, slot: usize, transition: Transition) {
        self.agents[slot].push(transition);
    }

    /// Counterfactual trajectory with one agent's stream removed
    pub fn without_agent(&self, slot: usize) -> Self {
        Self {
            agents: self
                .agents
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != slot)
                .map(|(_, a)| a.clone())
                .collect(),
        }
    }

    /// Iterate timesteps, yielding every agent's transition at that step
    pub fn timesteps(&self) -> impl Iterator<Item = Vec<&Transition>> + '_ {
        (0..self.num_timesteps()).map(move |t| self.agents.iter().map(|a| &a[t]).collect())
    }
}

/// Result of simulating one episode
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rollout {
    /// Per-agent trajectory
    pub trajectory: Trajectory,
    /// Raw team reward per objective (maximising)
    pub rewards: Vec<f64>,
}

/// Multi-agent, multi-objective environment
pub trait Environment: Send + Sync {
    /// Short identifier used in logs and records
    fn name(&self) -> &'static str;

    /// Number of agents in a team
    fn team_size(&self) -> usize;

    /// Observation length per agent
    fn state_size(&self) -> usize;

    /// Action length per agent
    fn action_size(&self) -> usize;

    /// Number of objectives
    fn num_objectives(&self) -> usize;

    /// Simulate a full episode for the joint policy
    fn rollout<P: Policy>(&self, joint_policy: &[P]) -> EvoResult<Rollout>;

    /// Re-score a trajectory without simulating
    ///
    /// Must accept trajectories with fewer agent streams than the team size.
    fn evaluate_trajectory(&self, trajectory: &Trajectory) -> EvoResult<Vec<f64>>;

    /// Policy dimensions for this environment
    fn policy_shape(&self) -> PolicyShape {
        PolicyShape::new(self.state_size(), self.action_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(position: f64) -> Transition {
        Transition {
            state: vec![],
            action: vec![],
            position: vec![position],
            kind: None,
        }
    }

    #[test]
    fn test_without_agent_drops_one_stream() {
        let trajectory = Trajectory::new(vec![
            vec![step(0.0), step(1.0)],
            vec![step(2.0), step(3.0)],
            vec![step(4.0), step(5.0)],
        ]);
        let cf = trajectory.without_agent(1);

        assert_eq!(cf.team_size(), 2);
        assert_eq!(cf.agent(0).unwrap()[1].position, vec![1.0]);
        assert_eq!(cf.agent(1).unwrap()[0].position, vec![4.0]);
        assert_eq!(trajectory.team_size(), 3);
    }

    #[test]
    fn test_timesteps() {
        let trajectory = Trajectory::new(vec![vec![step(0.0), step(1.0)], vec![step(2.0), step(3.0)]]);
        let steps: Vec<Vec<&Transition>> = trajectory.timesteps().collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1][1].position, vec![3.0]);
    }

    #[test]
    fn test_empty_trajectory() {
        let trajectory = Trajectory::with_team_size(0);
        assert_eq!(trajectory.num_timesteps(), 0);
        assert_eq!(trajectory.timesteps().count(), 0);
    }
}
