//! Multilayer perceptron policy
//!
//! All weights and biases live in one flat parameter vector. Each layer is laid
//! out as its weight matrix (column-major, `outputs x inputs`) followed by its
//! bias vector; hidden layers use `tanh`.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{EvoResult, EvolutionError};
use crate::policy::traits::{Policy, PolicyShape};

/// Activation applied to the output layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputActivation {
    /// Continuous actions in [-1, 1]
    #[default]
    Tanh,
    /// A probability distribution over discrete actions
    Softmax,
}

/// Configuration for [`MlpPolicy`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MlpConfig {
    /// Hidden layer widths
    pub hidden_layers: Vec<usize>,
    /// Weights are drawn uniformly from `[-weight_init_limit, weight_init_limit]`
    pub weight_init_limit: f64,
    /// Biases are drawn uniformly from `[-bias_init_limit, bias_init_limit]`
    pub bias_init_limit: f64,
    /// Output layer activation
    pub output_activation: OutputActivation,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![16],
            weight_init_limit: 0.5,
            bias_init_limit: 0.5,
            output_activation: OutputActivation::Tanh,
        }
    }
}

impl MlpConfig {
    /// Set the hidden layer widths
    pub fn with_hidden_layers(mut self, hidden_layers: Vec<usize>) -> Self {
        self.hidden_layers = hidden_layers;
        self
    }

    /// Set the output activation
    pub fn with_output_activation(mut self, activation: OutputActivation) -> Self {
        self.output_activation = activation;
        self
    }

    /// Set the weight and bias initialisation limits
    pub fn with_init_limits(mut self, weight: f64, bias: f64) -> Self {
        self.weight_init_limit = weight;
        self.bias_init_limit = bias;
        self
    }

    /// Check layer widths and initialisation limits
    pub fn validate(&self) -> EvoResult<()> {
        if self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(EvolutionError::Configuration(
                "hidden layer widths must be positive".to_string(),
            ));
        }
        for (name, limit) in [
            ("weight_init_limit", self.weight_init_limit),
            ("bias_init_limit", self.bias_init_limit),
        ] {
            if !(limit >= 0.0 && limit.is_finite()) {
                return Err(EvolutionError::Configuration(format!(
                    "{name} must be a non-negative number, got {limit}"
                )));
            }
        }
        Ok(())
    }
}

/// Feed-forward tanh network over a flat parameter vector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpPolicy {
    layer_sizes: Vec<usize>,
    params: Vec<f64>,
    output_activation: OutputActivation,
}

impl MlpPolicy {
    /// Build a policy from explicit parameters
    ///
    /// Returns `None` if `params` does not match the layer layout.
    pub fn from_parameters(
        layer_sizes: Vec<usize>,
        params: Vec<f64>,
        output_activation: OutputActivation,
    ) -> Option<Self> {
        if layer_sizes.len() < 2 || params.len() != Self::parameter_count(&layer_sizes) {
            return None;
        }
        Some(Self {
            layer_sizes,
            params,
            output_activation,
        })
    }

    /// Number of parameters needed for the given layer sizes
    pub fn parameter_count(layer_sizes: &[usize]) -> usize {
        layer_sizes
            .windows(2)
            .map(|w| w[0] * w[1] + w[1])
            .sum()
    }

    /// Layer widths, input first
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    fn softmax(v: DVector<f64>) -> DVector<f64> {
        let max = v.max();
        let exp = v.map(|x| (x - max).exp());
        let total = exp.sum();
        exp / total
    }
}

impl Policy for MlpPolicy {
    type Config = MlpConfig;

    fn validate_config(config: &MlpConfig) -> EvoResult<()> {
        config.validate()
    }

    fn generate<R: Rng + ?Sized>(config: &MlpConfig, shape: PolicyShape, rng: &mut R) -> Self {
        let mut layer_sizes = Vec::with_capacity(config.hidden_layers.len() + 2);
        layer_sizes.push(shape.input_size);
        layer_sizes.extend(config.hidden_layers.iter().copied());
        layer_sizes.push(shape.output_size);

        let weight_dist = Uniform::new_inclusive(-config.weight_init_limit, config.weight_init_limit);
        let bias_dist = Uniform::new_inclusive(-config.bias_init_limit, config.bias_init_limit);

        let mut params = Vec::with_capacity(Self::parameter_count(&layer_sizes));
        for w in layer_sizes.windows(2) {
            params.extend((0..w[0] * w[1]).map(|_| weight_dist.sample(rng)));
            params.extend((0..w[1]).map(|_| bias_dist.sample(rng)));
        }

        Self {
            layer_sizes,
            params,
            output_activation: config.output_activation,
        }
    }

    fn act(&self, observation: &[f64]) -> Vec<f64> {
        let mut x = DVector::from_column_slice(observation);
        let num_layers = self.layer_sizes.len() - 1;
        let mut offset = 0;

        for (layer, w) in self.layer_sizes.windows(2).enumerate() {
            let (n_in, n_out) = (w[0], w[1]);
            let weights =
                DMatrix::from_column_slice(n_out, n_in, &self.params[offset..offset + n_in * n_out]);
            offset += n_in * n_out;
            let bias = DVector::from_column_slice(&self.params[offset..offset + n_out]);
            offset += n_out;

            let z = weights * x + bias;
            x = if layer + 1 < num_layers {
                z.map(f64::tanh)
            } else {
                match self.output_activation {
                    OutputActivation::Tanh => z.map(f64::tanh),
                    OutputActivation::Softmax => Self::softmax(z),
                }
            };
        }

        x.as_slice().to_vec()
    }

    fn parameters(&self) -> &[f64] {
        &self.params
    }

    fn set_parameter(&mut self, index: usize, value: f64) {
        self.params[index] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_parameter_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = MlpConfig::default().with_hidden_layers(vec![4, 3]);
        let policy = MlpPolicy::generate(&config, PolicyShape::new(5, 2), &mut rng);

        assert_eq!(policy.layer_sizes(), &[5, 4, 3, 2]);
        assert_eq!(policy.num_parameters(), 5 * 4 + 4 + 4 * 3 + 3 + 3 * 2 + 2);
    }

    #[test]
    fn test_init_within_limits() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = MlpConfig {
            hidden_layers: vec![8],
            weight_init_limit: 0.1,
            bias_init_limit: 0.1,
            output_activation: OutputActivation::Tanh,
        };
        let policy = MlpPolicy::generate(&config, PolicyShape::new(3, 2), &mut rng);
        assert!(policy.parameters().iter().all(|p| p.abs() <= 0.1));
    }

    #[test]
    fn test_act_output_size_and_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let policy = MlpPolicy::generate(&MlpConfig::default(), PolicyShape::new(4, 3), &mut rng);
        let action = policy.act(&[0.1, -0.2, 0.3, 0.0]);
        assert_eq!(action.len(), 3);
        assert!(action.iter().all(|a| (-1.0..=1.0).contains(a)));
    }

    #[test]
    fn test_softmax_output_sums_to_one() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = MlpConfig::default().with_output_activation(OutputActivation::Softmax);
        let policy = MlpPolicy::generate(&config, PolicyShape::new(2, 3), &mut rng);
        let action = policy.act(&[1.0, -1.0]);
        assert_relative_eq!(action.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_layer_known_weights() {
        // Single layer, 2 inputs -> 1 output: tanh(0.5*x0 - 1.0*x1 + 0.25)
        let policy =
            MlpPolicy::from_parameters(vec![2, 1], vec![0.5, -1.0, 0.25], OutputActivation::Tanh)
                .unwrap();
        let out = policy.act(&[1.0, 0.5]);
        assert_relative_eq!(out[0], (0.5f64 - 0.5 + 0.25).tanh());
    }

    #[test]
    fn test_from_parameters_rejects_bad_layout() {
        assert!(MlpPolicy::from_parameters(vec![2, 1], vec![0.0; 2], OutputActivation::Tanh)
            .is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut rng = StdRng::seed_from_u64(11);
        let original = MlpPolicy::generate(&MlpConfig::default(), PolicyShape::new(2, 2), &mut rng);
        let mut copy = original.clone();
        copy.set_parameter(0, 123.0);
        assert_ne!(original.parameters()[0], 123.0);
    }

    #[test]
    fn test_config_rejects_bad_init_limits() {
        assert!(MlpConfig::default().validate().is_ok());
        for limit in [-0.1, f64::NAN, f64::INFINITY] {
            let config = MlpConfig::default().with_init_limits(limit, 0.5);
            assert!(matches!(
                MlpPolicy::validate_config(&config),
                Err(EvolutionError::Configuration(_))
            ));
        }
        let config = MlpConfig::default().with_hidden_layers(vec![4, 0]);
        assert!(config.validate().is_err());
    }
}
