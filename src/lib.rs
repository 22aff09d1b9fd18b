//! # dmo-evo
//!
//! Multi-objective evolution of multi-agent joint policies with
//! difference-based hypervolume credit assignment.
//!
//! A population of teams (one policy per team slot) is rolled out in a
//! multi-objective environment, ranked by non-dominated sorting, halved, and
//! refilled. Parent policies are picked slot by slot: each agent is credited
//! with how much its team front's hypervolume shrinks when the agent is
//! removed from the recorded trajectory and the episode is re-scored.
//!
//! ## Core Concepts
//!
//! - **Lower is better**: environment rewards are negated once, on ingestion
//! - **Capabilities**: the engine only needs [`env::traits::Environment`] and
//!   [`policy::traits::Policy`]; a beach domain and an MLP policy are bundled
//! - **Strategies**: NSGA-II, k-parent and difference-credit selection share
//!   one [`algorithms::centralised::PopulationManager`]; per-slot
//!   coevolution lives in [`algorithms::coevolution`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dmo_evo::prelude::*;
//!
//! let config = ExperimentConfig::from_path("experiment.json")?;
//! let env = config.domain.beach()?;
//! let mut manager =
//!     PopulationManager::<MlpPolicy, _>::new(config.evolution, env, config.policy)?;
//! let result = manager.run()?;
//! println!("{}", result.stats.summary());
//! ```

pub mod algorithms;
#[cfg(feature = "checkpoint")]
pub mod checkpoint;
pub mod config;
pub mod credit;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod fitness;
pub mod operators;
pub mod pareto;
pub mod policy;
pub mod population;
pub mod record;
pub mod termination;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithms::prelude::*;
    #[cfg(feature = "checkpoint")]
    pub use crate::checkpoint::prelude::*;
    pub use crate::config::*;
    pub use crate::credit::prelude::*;
    pub use crate::diagnostics::prelude::*;
    pub use crate::env::prelude::*;
    pub use crate::error::*;
    pub use crate::fitness::prelude::*;
    pub use crate::operators::prelude::*;
    pub use crate::pareto::prelude::*;
    pub use crate::policy::prelude::*;
    pub use crate::population::prelude::*;
    pub use crate::record::prelude::*;
    pub use crate::termination::prelude::*;
}
