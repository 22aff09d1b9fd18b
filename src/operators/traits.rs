//! Operator traits
//!
//! This module defines the core operator traits. Operators work on policies
//! only through their flat parameter vectors.

use rand::Rng;

use crate::error::{OperatorError, OperatorResult};
use crate::policy::traits::Policy;

/// Selection operator trait
///
/// Picks one member of a pool given one score per member (higher is better).
pub trait SelectionOperator: Send + Sync {
    /// Select a single index from the pool
    fn select<R: Rng + ?Sized>(&self, scores: &[f64], rng: &mut R) -> Result<usize, OperatorError>;

    /// Select multiple indices from the pool
    fn select_many<R: Rng + ?Sized>(
        &self,
        scores: &[f64],
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>, OperatorError> {
        (0..count).map(|_| self.select(scores, rng)).collect()
    }
}

/// Crossover operator trait
///
/// Combines two parent policies into two brand-new offspring policies.
pub trait CrossoverOperator<P: Policy>: Send + Sync {
    /// Apply crossover to two parents and produce two offspring
    fn crossover<R: Rng + ?Sized>(&self, parent1: &P, parent2: &P, rng: &mut R)
        -> OperatorResult<(P, P)>;
}

/// Mutation operator trait
///
/// Applies random changes to a policy in place.
pub trait MutationOperator<P: Policy>: Send + Sync {
    /// Apply mutation to a policy in place
    fn mutate<R: Rng + ?Sized>(&self, policy: &mut P, rng: &mut R) -> Result<(), OperatorError>;
}

/// Check that two parents expose parameter vectors of equal length
pub(crate) fn check_parameter_counts<P: Policy>(
    parent1: &P,
    parent2: &P,
) -> Result<(), OperatorError> {
    if parent1.num_parameters() != parent2.num_parameters() {
        return Err(OperatorError::CrossoverFailed(format!(
            "parent parameter counts differ: {} vs {}",
            parent1.num_parameters(),
            parent2.num_parameters()
        )));
    }
    Ok(())
}
