//! Re-identification risk of synthetic data: k-anonymity, l-diversity and
//! three simulated attacks (singling-out, linkability, attribute
//! inference), summarised in a [`synth_model::PrivacyReport`].

pub mod anonymity;
pub mod assessor;
pub mod attacks;
pub mod config;
pub mod encoding;

pub use assessor::{PrivacyAssessor, assess};
pub use config::PrivacyConfig;
