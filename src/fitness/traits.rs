//! Fitness vectors
//!
//! Objectives are positional and, internally, minimised. Raw environment rewards
//! are maximised, so they are negated exactly once, in [`Fitness::from_rewards`].

use serde::{Deserialize, Serialize};

use crate::error::{EvoResult, EvolutionError};
use crate::pareto::dominance::dominates;

/// Multi-objective fitness vector (lower is better on every objective)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fitness {
    objectives: Vec<f64>,
}

impl Fitness {
    /// Create a fitness vector from values already in the internal convention
    pub fn new(objectives: Vec<f64>) -> Self {
        Self { objectives }
    }

    /// Ingest a raw reward vector from an environment
    ///
    /// Fails if the environment produced the wrong number of objectives; the
    /// vector is never truncated or padded.
    pub fn from_rewards(rewards: &[f64], expected: usize) -> EvoResult<Self> {
        if rewards.len() != expected {
            return Err(EvolutionError::ObjectiveMismatch {
                expected,
                actual: rewards.len(),
            });
        }
        if rewards.iter().any(|r| !r.is_finite()) {
            tracing::warn!(?rewards, "non-finite reward ingested");
        }
        Ok(Self {
            objectives: rewards.iter().map(|r| -r).collect(),
        })
    }

    /// Objective values (internal convention)
    pub fn objectives(&self) -> &[f64] {
        &self.objectives
    }

    /// Objective values converted back to the environment's reward convention
    pub fn to_rewards(&self) -> Vec<f64> {
        self.objectives.iter().map(|o| -o).collect()
    }

    /// Number of objectives
    pub fn num_objectives(&self) -> usize {
        self.objectives.len()
    }

    /// Check if this fitness Pareto-dominates another
    pub fn dominates(&self, other: &Self) -> bool {
        dominates(&self.objectives, &other.objectives)
    }

    /// Element-wise difference `self - other`
    pub fn difference(&self, other: &Self) -> Vec<f64> {
        self.objectives
            .iter()
            .zip(other.objectives.iter())
            .map(|(a, b)| a - b)
            .collect()
    }
}

impl AsRef<[f64]> for Fitness {
    fn as_ref(&self) -> &[f64] {
        &self.objectives
    }
}

impl From<Vec<f64>> for Fitness {
    fn from(objectives: Vec<f64>) -> Self {
        Self::new(objectives)
    }
}
