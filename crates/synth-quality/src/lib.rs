//! Fidelity metrics: marginal distances, correlation preservation and
//! two-sample tests, combined into a [`synth_model::QualityReport`].

pub mod comparator;
pub mod config;
pub mod correlation;
pub mod hypothesis;
pub mod similarity;

pub use comparator::{QualityComparator, compare};
pub use config::QualityConfig;
