//! Fitness representation
//!
//! This module provides the objective-vector fitness used throughout the engine.

pub mod traits;

pub mod prelude {
    pub use super::traits::*;
}
