//! Pareto machinery
//!
//! Dominance, non-dominated fronts, crowding distance and the hypervolume indicator.

pub mod dominance;
pub mod hypervolume;

pub mod prelude {
    pub use super::dominance::*;
    pub use super::hypervolume::*;
}
