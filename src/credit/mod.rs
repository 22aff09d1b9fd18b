//! Credit assignment
//!
//! Counterfactual per-agent credit computed from hypervolume contributions.

pub mod difference;

pub mod prelude {
    pub use super::difference::*;
}
