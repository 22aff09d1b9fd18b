//! Crossover operators
//!
//! Simulated binary crossover over policy parameter vectors, and its lift to
//! whole joint policies (slot by slot).

use rand::Rng;

use crate::error::{EvoResult, OperatorError, OperatorResult};
use crate::operators::traits::{check_parameter_counts, CrossoverOperator};
use crate::policy::traits::Policy;
use crate::population::individual::{IdCounter, Individual};

/// Default SBX distribution index
pub const DEFAULT_SBX_ETA: f64 = 15.0;

/// Simulated Binary Crossover (SBX)
///
/// SBX generates offspring from parents using a spread factor that
/// simulates single-point crossover for binary strings. Every parameter draws
/// its own `u`.
///
/// Reference: Deb, K., & Agrawal, R. B. (1995). Simulated Binary Crossover
/// for Continuous Search Space.
#[derive(Clone, Debug)]
pub struct SbxCrossover {
    /// Distribution index
    /// Higher values = offspring closer to parents
    pub eta: f64,
}

impl Default for SbxCrossover {
    fn default() -> Self {
        Self::new(DEFAULT_SBX_ETA)
    }
}

impl SbxCrossover {
    /// Create a new SBX crossover with the given distribution index
    pub fn new(eta: f64) -> Self {
        assert!(eta >= 0.0, "Distribution index must be non-negative");
        Self { eta }
    }

    /// Create an SBX crossover, rejecting a negative or non-finite index
    pub fn try_new(eta: f64) -> Result<Self, OperatorError> {
        if !eta.is_finite() || eta < 0.0 {
            return Err(OperatorError::InvalidConfiguration(format!(
                "distribution index must be finite and non-negative, got {eta}"
            )));
        }
        Ok(Self { eta })
    }

    /// Compute the spread factor β from a uniform random value
    pub fn spread_factor(&self, u: f64) -> f64 {
        if u <= 0.5 {
            (2.0 * u).powf(1.0 / (self.eta + 1.0))
        } else {
            (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (self.eta + 1.0))
        }
    }

    /// Combine one parameter pair for a given draw `u`
    pub fn blend(&self, x1: f64, x2: f64, u: f64) -> (f64, f64) {
        let beta = self.spread_factor(u);
        (
            0.5 * ((1.0 + beta) * x1 + (1.0 - beta) * x2),
            0.5 * ((1.0 - beta) * x1 + (1.0 + beta) * x2),
        )
    }

    /// Apply SBX to two parameter slices
    fn apply_sbx<R: Rng + ?Sized>(
        &self,
        parent1: &[f64],
        parent2: &[f64],
        rng: &mut R,
    ) -> (Vec<f64>, Vec<f64>) {
        parent1
            .iter()
            .zip(parent2.iter())
            .map(|(&x1, &x2)| {
                // u in [0, 1), so β stays finite
                let u: f64 = rng.gen();
                self.blend(x1, x2, u)
            })
            .unzip()
    }

    /// Cross two individuals slot by slot
    ///
    /// Offspring are brand-new individuals with fresh ids; parents are untouched.
    /// Mismatched joint-policy lengths are a structural error.
    pub fn crossover_individuals<P: Policy, R: Rng + ?Sized>(
        &self,
        parent1: &Individual<P>,
        parent2: &Individual<P>,
        ids: &IdCounter,
        rng: &mut R,
    ) -> EvoResult<(Individual<P>, Individual<P>)> {
        if parent1.team_size() != parent2.team_size() {
            return Err(OperatorError::CrossoverFailed(format!(
                "joint policy lengths differ: {} vs {}",
                parent1.team_size(),
                parent2.team_size()
            ))
            .into());
        }

        let mut joint1 = Vec::with_capacity(parent1.team_size());
        let mut joint2 = Vec::with_capacity(parent2.team_size());
        for (p1, p2) in parent1.joint_policy.iter().zip(parent2.joint_policy.iter()) {
            let (c1, c2) = self.crossover(p1, p2, rng).into_result()?;
            joint1.push(c1);
            joint2.push(c2);
        }

        Ok((
            Individual::new(joint1, ids.next_id()),
            Individual::new(joint2, ids.next_id()),
        ))
    }
}

impl<P: Policy> CrossoverOperator<P> for SbxCrossover {
    fn crossover<R: Rng + ?Sized>(
        &self,
        parent1: &P,
        parent2: &P,
        rng: &mut R,
    ) -> OperatorResult<(P, P)> {
        if let Err(e) = check_parameter_counts(parent1, parent2) {
            return OperatorResult::Failed(e);
        }

        let (genes1, genes2) = self.apply_sbx(parent1.parameters(), parent2.parameters(), rng);

        let mut child1 = parent1.clone();
        let mut child2 = parent2.clone();
        child1.set_parameters(&genes1);
        child2.set_parameters(&genes2);

        OperatorResult::Success((child1, child2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::mlp::{MlpPolicy, OutputActivation};
    use crate::policy::traits::Policy;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(params: Vec<f64>) -> MlpPolicy {
        // one input: n = out weights + out biases
        let n = params.len();
        MlpPolicy::from_parameters(vec![1, n / 2], params, OutputActivation::Tanh).unwrap()
    }

    #[test]
    fn test_spread_factor_midpoint() {
        let sbx = SbxCrossover::new(15.0);
        assert_relative_eq!(sbx.spread_factor(0.5), 1.0);
    }

    #[test]
    fn test_try_new_rejects_bad_index() {
        assert!(SbxCrossover::try_new(15.0).is_ok());
        for eta in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                SbxCrossover::try_new(eta),
                Err(OperatorError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_blend_preserves_mean() {
        let sbx = SbxCrossover::default();
        for &u in &[0.01, 0.3, 0.5, 0.77, 0.99] {
            let (c1, c2) = sbx.blend(1.0, 3.0, u);
            assert_relative_eq!(c1 + c2, 4.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_blend_swapped_parents_swap_children() {
        let sbx = SbxCrossover::default();
        let (a1, a2) = sbx.blend(0.2, -1.5, 0.8);
        let (b1, b2) = sbx.blend(-1.5, 0.2, 0.8);
        assert_relative_eq!(a1, b2);
        assert_relative_eq!(a2, b1);
    }

    #[test]
    fn test_sbx_swapped_parents_same_seed() {
        let sbx = SbxCrossover::default();
        let p1 = policy(vec![1.0, 2.0, 3.0, 4.0]);
        let p2 = policy(vec![-1.0, 0.5, 2.0, 8.0]);

        let (a1, a2) = sbx
            .crossover(&p1, &p2, &mut StdRng::seed_from_u64(9))
            .value()
            .unwrap();
        let (b1, b2) = sbx
            .crossover(&p2, &p1, &mut StdRng::seed_from_u64(9))
            .value()
            .unwrap();

        for i in 0..4 {
            assert_relative_eq!(a1.parameters()[i], b2.parameters()[i], epsilon = 1e-12);
            assert_relative_eq!(a2.parameters()[i], b1.parameters()[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_sbx_does_not_touch_parents() {
        let sbx = SbxCrossover::default();
        let p1 = policy(vec![1.0, 2.0, 3.0, 4.0]);
        let p2 = policy(vec![-1.0, 0.5, 2.0, 8.0]);
        let before = (p1.clone(), p2.clone());
        let _ = sbx.crossover(&p1, &p2, &mut StdRng::seed_from_u64(1));
        assert_eq!(before.0, p1);
        assert_eq!(before.1, p2);
    }

    #[test]
    fn test_crossover_individuals_fresh_ids() {
        let sbx = SbxCrossover::default();
        let ids = IdCounter::new(10);
        let a = Individual::new(vec![policy(vec![0.0; 4]), policy(vec![1.0; 4])], 0);
        let b = Individual::new(vec![policy(vec![2.0; 4]), policy(vec![3.0; 4])], 1);

        let (c1, c2) = sbx
            .crossover_individuals(&a, &b, &ids, &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!((c1.id, c2.id), (10, 11));
        assert_eq!(c1.team_size(), 2);
        assert!(!c1.is_evaluated());
    }

    #[test]
    fn test_crossover_individuals_rejects_mismatched_teams() {
        let sbx = SbxCrossover::default();
        let ids = IdCounter::new(0);
        let a = Individual::new(vec![policy(vec![0.0; 4]), policy(vec![1.0; 4])], 0);
        let b = Individual::new(vec![policy(vec![2.0; 4])], 1);

        assert!(sbx
            .crossover_individuals(&a, &b, &ids, &mut StdRng::seed_from_u64(2))
            .is_err());
    }
}
