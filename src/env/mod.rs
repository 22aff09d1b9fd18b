//! Environments
//!
//! The environment capability consumed by the engine and a bundled
//! multi-objective beach domain.

pub mod beach;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub mod prelude {
    pub use super::beach::*;
    pub use super::traits::*;
}
