//! Error types for dmo-evo
//!
//! This module defines all error types used throughout the library.
//! Every failure here is a programming or configuration error; nothing is retried.

use thiserror::Error;

/// Error type for operator failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OperatorError {
    /// Crossover operation failed
    #[error("Crossover failed: {0}")]
    CrossoverFailed(String),

    /// Mutation operation failed
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// Selection operation failed
    #[error("Selection failed: {0}")]
    SelectionFailed(String),

    /// Invalid operator configuration
    #[error("Invalid operator configuration: {0}")]
    InvalidConfiguration(String),
}

/// Error type for checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// IO error during checkpoint
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Checkpoint version mismatch
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Checkpoint file not found
    #[error("Checkpoint not found: {0}")]
    NotFound(String),
}

/// Top-level error type for evolution operations
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// Operator error
    #[error("Operator error: {0}")]
    Operator(#[from] OperatorError),

    /// Checkpoint error
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The environment returned a fitness vector of the wrong dimensionality
    #[error("Objective count mismatch: expected {expected}, got {actual}")]
    ObjectiveMismatch { expected: usize, actual: usize },

    /// A joint policy or trajectory does not match the configured team size
    #[error("Team size mismatch: expected {expected}, got {actual}")]
    TeamSizeMismatch { expected: usize, actual: usize },

    /// The environment rejected a rollout or re-scoring request
    #[error("Environment error: {0}")]
    Environment(String),

    /// Writing an evaluation record failed
    #[error("Record error: {0}")]
    Record(String),

    /// Empty population
    #[error("Empty population")]
    EmptyPopulation,

    /// A generation phase was invoked out of order
    #[error("Invalid generation state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
}

/// Result type alias for evolution operations
pub type EvoResult<T> = Result<T, EvolutionError>;

/// Result of an operator application
#[derive(Debug, Clone)]
pub enum OperatorResult<T> {
    /// Operation succeeded
    Success(T),
    /// Operation failed unrecoverably
    Failed(OperatorError),
}

impl<T> OperatorResult<T> {
    /// Returns the value if successful, None if failed
    pub fn value(self) -> Option<T> {
        match self {
            Self::Success(v) => Some(v),
            Self::Failed(_) => None,
        }
    }

    /// Returns true if the operation was successful
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Converts into a `Result`, surfacing the operator error
    pub fn into_result(self) -> Result<T, OperatorError> {
        match self {
            Self::Success(v) => Ok(v),
            Self::Failed(e) => Err(e),
        }
    }
}
