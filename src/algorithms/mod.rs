//! Evolutionary algorithms
//!
//! This module provides the centralised population manager, its selection
//! strategies, and the per-slot coevolutionary variant.

pub mod centralised;
pub mod coevolution;
pub mod strategy;

pub mod prelude {
    pub use super::centralised::*;
    pub use super::coevolution::*;
    pub use super::strategy::*;
}
