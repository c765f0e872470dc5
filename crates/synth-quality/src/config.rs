use serde::{Deserialize, Serialize};
use synth_model::{CompositeWeights, Result, SynthError};

/// Options of a fidelity comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Significance level of the per-variable two-sample tests.
    pub alpha: f64,
    pub weights: CompositeWeights,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            weights: CompositeWeights::default(),
        }
    }
}

impl QualityConfig {
    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    #[must_use]
    pub fn with_weights(mut self, weights: CompositeWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SynthError::invalid_config(format!(
                "significance level must lie in (0, 1), got {}",
                self.alpha
            )));
        }
        self.weights.validate()
    }
}
