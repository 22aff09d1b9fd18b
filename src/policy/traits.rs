//! Policy capability
//!
//! A policy maps one agent's observation to an action. The engine never looks
//! inside a policy: it only evaluates it, reads its flat parameter vector, and
//! writes parameters back during crossover and mutation.

use std::fmt::Debug;

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{EvoResult, OperatorError};

/// Input/output dimensions of a policy, queried once from the environment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyShape {
    /// Observation length
    pub input_size: usize,
    /// Action length
    pub output_size: usize,
}

impl PolicyShape {
    /// Create a new shape
    pub fn new(input_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            output_size,
        }
    }
}

/// Core policy abstraction
///
/// `Clone` must produce a deep, independent copy: offspring never alias a
/// parent's parameters.
pub trait Policy: Clone + Debug + Send + Sync + 'static {
    /// Representation-specific configuration (layer sizes, init ranges, ...)
    type Config: Clone + Debug + Send + Sync;

    /// Reject a configuration that `generate` cannot honour
    fn validate_config(_config: &Self::Config) -> EvoResult<()> {
        Ok(())
    }

    /// Construct a freshly initialised random policy
    fn generate<R: Rng + ?Sized>(config: &Self::Config, shape: PolicyShape, rng: &mut R) -> Self;

    /// Forward-evaluate an observation into an action
    fn act(&self, observation: &[f64]) -> Vec<f64>;

    /// Ordered parameter vector
    fn parameters(&self) -> &[f64];

    /// Overwrite a single parameter
    fn set_parameter(&mut self, index: usize, value: f64);

    /// Number of parameters
    fn num_parameters(&self) -> usize {
        self.parameters().len()
    }

    /// Overwrite all parameters in order
    fn set_parameters(&mut self, values: &[f64]) {
        for (i, &v) in values.iter().enumerate() {
            self.set_parameter(i, v);
        }
    }

    /// Add `Uniform[-scale, scale]` noise to each parameter with probability `rate`
    ///
    /// Returns the number of parameters changed. A perturbed value that is not
    /// finite aborts the mutation with the earlier parameters already written.
    fn perturb<R: Rng + ?Sized>(
        &mut self,
        rate: f64,
        scale: f64,
        rng: &mut R,
    ) -> Result<usize, OperatorError> {
        if !scale.is_finite() || scale < 0.0 {
            return Err(OperatorError::InvalidConfiguration(format!(
                "perturbation scale must be finite and non-negative, got {scale}"
            )));
        }
        if rate == 0.0 || scale == 0.0 {
            return Ok(0);
        }
        let noise = Uniform::new_inclusive(-scale, scale);

        let mut changed = 0;
        for i in 0..self.num_parameters() {
            if rng.gen::<f64>() < rate {
                let value = self.parameters()[i] + noise.sample(rng);
                if !value.is_finite() {
                    return Err(OperatorError::MutationFailed(format!(
                        "parameter {i} became {value}"
                    )));
                }
                self.set_parameter(i, value);
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Euclidean distance in parameter space
    fn distance(&self, other: &Self) -> f64 {
        self.parameters()
            .iter()
            .zip(other.parameters().iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}
