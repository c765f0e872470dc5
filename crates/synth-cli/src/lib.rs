//! Library half of the `trial-synth` command-line tool: logging setup,
//! run settings and result tables.

pub mod logging;
pub mod settings;
pub mod summary;
