//! Individual wrapper type
//!
//! An individual is one candidate team: a joint policy (one policy per team
//! slot, in slot order), plus the fitness and trajectory of its latest rollout.

use std::sync::atomic::{AtomicI64, Ordering};

use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::env::traits::{Environment, Trajectory};
use crate::error::{EvoResult, EvolutionError};
use crate::fitness::traits::Fitness;
use crate::policy::traits::{Policy, PolicyShape};

/// Id carried by individuals that have not been assigned one
pub const UNASSIGNED_ID: i64 = -1;

/// Process-wide source of unique individual ids
///
/// Shared by reference; `next` is a single atomic increment.
#[derive(Debug, Default)]
pub struct IdCounter(AtomicI64);

impl IdCounter {
    /// Create a counter whose first id is `start`
    pub fn new(start: i64) -> Self {
        Self(AtomicI64::new(start))
    }

    /// Take the next id
    pub fn next_id(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next call to `next_id` will return
    pub fn peek(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// An individual in the population
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "P: Serialize", deserialize = "P: DeserializeOwned"))]
pub struct Individual<P: Policy> {
    /// Unique id, or [`UNASSIGNED_ID`]
    pub id: i64,
    /// One policy per team slot
    pub joint_policy: Vec<P>,
    /// Fitness of the latest rollout (None if not yet evaluated)
    pub fitness: Option<Fitness>,
    /// Trajectory of the latest rollout
    pub trajectory: Option<Trajectory>,
    /// Generation when this individual was created
    pub birth_generation: usize,
}

impl<P: Policy> Individual<P> {
    /// Create a new unevaluated individual
    pub fn new(joint_policy: Vec<P>, id: i64) -> Self {
        Self {
            id,
            joint_policy,
            fitness: None,
            trajectory: None,
            birth_generation: 0,
        }
    }

    /// Create an individual without an id (e.g. a compound parent)
    pub fn unassigned(joint_policy: Vec<P>) -> Self {
        Self::new(joint_policy, UNASSIGNED_ID)
    }

    /// Create a random individual with a fresh id
    pub fn generate<R: Rng + ?Sized>(
        config: &P::Config,
        shape: PolicyShape,
        team_size: usize,
        ids: &IdCounter,
        rng: &mut R,
    ) -> Self {
        let joint_policy = (0..team_size)
            .map(|_| P::generate(config, shape, rng))
            .collect();
        Self::new(joint_policy, ids.next_id())
    }

    /// Set the birth generation
    pub fn with_generation(mut self, generation: usize) -> Self {
        self.birth_generation = generation;
        self
    }

    /// Number of team slots
    pub fn team_size(&self) -> usize {
        self.joint_policy.len()
    }

    /// Policy at a team slot
    pub fn policy(&self, slot: usize) -> Option<&P> {
        self.joint_policy.get(slot)
    }

    /// Check if this individual has been evaluated
    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness of the latest rollout
    pub fn fitness(&self) -> Option<&Fitness> {
        self.fitness.as_ref()
    }

    /// Forget the previous evaluation
    pub fn reset_fitness(&mut self) {
        self.fitness = None;
        self.trajectory = None;
    }

    /// Run a rollout and record its fitness and trajectory
    pub fn evaluate<E: Environment>(&mut self, env: &E) -> EvoResult<()> {
        if self.team_size() != env.team_size() {
            return Err(EvolutionError::TeamSizeMismatch {
                expected: env.team_size(),
                actual: self.team_size(),
            });
        }
        self.reset_fitness();
        let rollout = env.rollout(&self.joint_policy)?;
        self.fitness = Some(Fitness::from_rewards(
            &rollout.rewards,
            env.num_objectives(),
        )?);
        self.trajectory = Some(rollout.trajectory);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::beach::{BeachConfig, BeachDomain};
    use crate::policy::mlp::{MlpConfig, MlpPolicy};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_id_counter_unique() {
        let ids = IdCounter::new(0);
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.peek(), 2);
    }

    #[test]
    fn test_id_counter_concurrent() {
        let ids = IdCounter::new(0);
        let mut seen: Vec<i64> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| (0..100).map(|_| ids.next_id()).collect::<Vec<_>>()))
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 400);
    }

    #[test]
    fn test_generate_and_evaluate() {
        let mut rng = StdRng::seed_from_u64(5);
        let domain = BeachDomain::new(BeachConfig::default()).unwrap();
        let ids = IdCounter::new(0);
        let mut individual: Individual<MlpPolicy> = Individual::generate(
            &MlpConfig::default(),
            domain.policy_shape(),
            domain.team_size(),
            &ids,
            &mut rng,
        );

        assert_eq!(individual.id, 0);
        assert_eq!(individual.team_size(), 10);
        assert!(!individual.is_evaluated());

        individual.evaluate(&domain).unwrap();
        assert!(individual.is_evaluated());
        assert_eq!(individual.fitness().unwrap().num_objectives(), 2);
        assert!(individual.trajectory.is_some());
    }

    #[test]
    fn test_evaluate_rejects_wrong_team_size() {
        let mut rng = StdRng::seed_from_u64(5);
        let domain = BeachDomain::new(BeachConfig::default()).unwrap();
        let ids = IdCounter::new(0);
        let mut individual: Individual<MlpPolicy> = Individual::generate(
            &MlpConfig::default(),
            domain.policy_shape(),
            3,
            &ids,
            &mut rng,
        );
        assert!(individual.evaluate(&domain).is_err());
    }

    #[test]
    fn test_unassigned_id() {
        let individual: Individual<MlpPolicy> = Individual::unassigned(vec![]);
        assert_eq!(individual.id, UNASSIGNED_ID);
    }
}
