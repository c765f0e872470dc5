//! Cross-method comparison: min-max normalised ranking, recommendations,
//! per-method rationale and a parallel benchmark runner.

pub mod benchmark;
pub mod rationale;
pub mod ranking;

pub use benchmark::{Benchmark, BenchmarkCase, benchmark};
pub use ranking::{min_max, privacy_benefit, rank_methods};
