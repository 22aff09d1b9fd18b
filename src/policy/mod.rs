//! Policies
//!
//! The policy capability consumed by the engine and a bundled MLP implementation.

pub mod mlp;
pub mod traits;

pub mod prelude {
    pub use super::mlp::*;
    pub use super::traits::*;
}
