//! Mutation operators
//!
//! This module provides the parameter perturbation applied to offspring.

use rand::Rng;

use crate::error::OperatorError;
use crate::operators::traits::MutationOperator;
use crate::policy::traits::Policy;
use crate::population::individual::Individual;

/// Uniform perturbation mutation
///
/// Each parameter independently, with probability `rate`, gets a value drawn
/// from `Uniform[-scale, scale]` added to it.
#[derive(Clone, Debug)]
pub struct PerturbationMutation {
    /// Per-parameter mutation probability
    pub rate: f64,
    /// Half-width of the perturbation interval
    pub scale: f64,
}

impl PerturbationMutation {
    /// Create a new perturbation mutation
    pub fn new(rate: f64, scale: f64) -> Self {
        assert!((0.0..=1.0).contains(&rate), "Rate must be in [0, 1]");
        assert!(scale >= 0.0, "Scale must be non-negative");
        Self { rate, scale }
    }

    /// Create a perturbation mutation, rejecting out-of-range settings
    pub fn try_new(rate: f64, scale: f64) -> Result<Self, OperatorError> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(OperatorError::InvalidConfiguration(format!(
                "mutation rate must be in [0, 1], got {rate}"
            )));
        }
        if !scale.is_finite() || scale < 0.0 {
            return Err(OperatorError::InvalidConfiguration(format!(
                "mutation scale must be finite and non-negative, got {scale}"
            )));
        }
        Ok(Self { rate, scale })
    }

    /// Mutate every policy of an offspring individual
    pub fn mutate_individual<P: Policy, R: Rng + ?Sized>(
        &self,
        individual: &mut Individual<P>,
        rng: &mut R,
    ) -> Result<(), OperatorError> {
        for policy in &mut individual.joint_policy {
            self.mutate(policy, rng)?;
        }
        Ok(())
    }
}

impl<P: Policy> MutationOperator<P> for PerturbationMutation {
    fn mutate<R: Rng + ?Sized>(&self, policy: &mut P, rng: &mut R) -> Result<(), OperatorError> {
        policy.perturb(self.rate, self.scale, rng)?;
        Ok(())
    }
}
