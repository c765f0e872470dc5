use thiserror::Error;

/// Errors raised by generation, comparison and privacy assessment.
///
/// Degraded results are not errors: generators tag their output with a
/// [`DataFlag`](crate::DataFlag) and reports carry a
/// [`Validity`](crate::Validity) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SynthError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("insufficient reference data: {0}")]
    InsufficientReferenceData(String),

    #[error("imputation did not converge after {iterations} iterations (last change {last_change:.5})")]
    NonConvergence { iterations: usize, last_change: f64 },

    #[error("row {row} does not match schema: {message}")]
    SchemaMismatch { row: usize, message: String },

    #[error("dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),
}

impl SynthError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SynthError>;
