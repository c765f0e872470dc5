//! Synthetic dataset generation strategies.
//!
//! [`generate`] dispatches on [`synth_model::GenerationMethod`]:
//!
//! - [`distribution`]: multivariate normal per (arm, visit) stratum
//! - [`resampling`]: stratified bootstrap with optional jitter
//! - [`graphical`]: discrete Bayesian network over binned variables
//! - [`imputation`]: masked template refilled by chained equations
//! - realistic: the multi-stage simulation in `synth_scenario`
//!
//! Reference statistics are memoised in a process-wide [`StatisticsCache`].

pub mod cache;
mod common;
pub mod distribution;
pub mod graphical;
pub mod imputation;
pub mod resampling;
pub mod stats;
pub mod strategy;

pub use cache::{CacheStats, StatisticsCache};
pub use distribution::{DistributionGenerator, DistributionParameters};
pub use graphical::{GraphicalGenerator, GraphicalModel};
pub use imputation::ImputationGenerator;
pub use resampling::ResamplingGenerator;
pub use stats::ReferenceStatistics;
pub use strategy::{Generator, generate};
