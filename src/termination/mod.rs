//! Termination criteria
//!
//! This module provides termination criteria for the generational drivers.

/// Evolution state for termination checking
#[derive(Clone, Debug)]
pub struct EvolutionState<'a> {
    /// Generations completed so far
    pub generation: usize,
    /// Total rollouts so far
    pub evaluations: usize,
    /// Hypervolume of the latest first front
    pub hypervolume: f64,
    /// First-front hypervolume per generation
    pub hypervolume_history: &'a [f64],
}

/// Termination criterion trait
pub trait TerminationCriterion: Send + Sync {
    /// Check if evolution should terminate
    fn should_terminate(&self, state: &EvolutionState<'_>) -> bool;

    /// Get a description of why termination occurred
    fn reason(&self) -> &'static str;
}

/// Terminate after a maximum number of generations
#[derive(Clone, Debug)]
pub struct MaxGenerations(pub usize);

impl MaxGenerations {
    /// Create a new max generations criterion
    pub fn new(max: usize) -> Self {
        Self(max)
    }
}

impl TerminationCriterion for MaxGenerations {
    fn should_terminate(&self, state: &EvolutionState<'_>) -> bool {
        state.generation >= self.0
    }

    fn reason(&self) -> &'static str {
        "Maximum generations reached"
    }
}

/// Terminate after a maximum number of rollouts
#[derive(Clone, Debug)]
pub struct MaxEvaluations(pub usize);

impl MaxEvaluations {
    /// Create a new max evaluations criterion
    pub fn new(max: usize) -> Self {
        Self(max)
    }
}

impl TerminationCriterion for MaxEvaluations {
    fn should_terminate(&self, state: &EvolutionState<'_>) -> bool {
        state.evaluations >= self.0
    }

    fn reason(&self) -> &'static str {
        "Maximum evaluations reached"
    }
}

/// Terminate when first-front hypervolume stops moving
#[derive(Clone, Debug)]
pub struct HypervolumeStagnation {
    /// Number of generations to look back
    pub window: usize,
    /// Minimum change threshold
    pub epsilon: f64,
}

impl HypervolumeStagnation {
    /// Create a new stagnation criterion
    pub fn new(window: usize, epsilon: f64) -> Self {
        Self { window, epsilon }
    }
}

impl TerminationCriterion for HypervolumeStagnation {
    fn should_terminate(&self, state: &EvolutionState<'_>) -> bool {
        let history = state.hypervolume_history;
        if self.window == 0 || history.len() < self.window {
            return false;
        }

        let window = &history[history.len() - self.window..];
        let (lo, hi) = window
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        hi - lo < self.epsilon
    }

    fn reason(&self) -> &'static str {
        "Hypervolume stagnation detected"
    }
}

/// Terminate once the first front reaches a target hypervolume
#[derive(Clone, Debug)]
pub struct TargetHypervolume(pub f64);

impl TargetHypervolume {
    /// Create a new target criterion
    pub fn new(target: f64) -> Self {
        Self(target)
    }
}

impl TerminationCriterion for TargetHypervolume {
    fn should_terminate(&self, state: &EvolutionState<'_>) -> bool {
        state.hypervolume >= self.0
    }

    fn reason(&self) -> &'static str {
        "Target hypervolume reached"
    }
}

/// Combine criteria with OR logic (any one triggers termination)
pub struct AnyOf {
    criteria: Vec<Box<dyn TerminationCriterion>>,
}

impl AnyOf {
    /// Create a new AnyOf combinator
    pub fn new(criteria: Vec<Box<dyn TerminationCriterion>>) -> Self {
        Self { criteria }
    }
}

impl TerminationCriterion for AnyOf {
    fn should_terminate(&self, state: &EvolutionState<'_>) -> bool {
        self.criteria.iter().any(|c| c.should_terminate(state))
    }

    fn reason(&self) -> &'static str {
        "One of multiple criteria met"
    }
}

/// Combine criteria with AND logic (all must trigger for termination)
pub struct AllOf {
    criteria: Vec<Box<dyn TerminationCriterion>>,
}

impl AllOf {
    /// Create a new AllOf combinator
    pub fn new(criteria: Vec<Box<dyn TerminationCriterion>>) -> Self {
        Self { criteria }
    }
}

impl TerminationCriterion for AllOf {
    fn should_terminate(&self, state: &EvolutionState<'_>) -> bool {
        !self.criteria.is_empty() && self.criteria.iter().all(|c| c.should_terminate(state))
    }

    fn reason(&self) -> &'static str {
        "All criteria met"
    }
}

pub mod prelude {
    pub use super::{
        AllOf, AnyOf, EvolutionState, HypervolumeStagnation, MaxEvaluations, MaxGenerations,
        TargetHypervolume, TerminationCriterion,
    };
}
