//! Shared utilities for the synthetic trial crates.

pub mod labels;
pub mod linalg;
pub mod rng;

pub use labels::{reference_arm, site_label, subject_label};
pub use linalg::Matrix;
pub use rng::{Stream, SynthRng, stream_rng, substream_rng};
