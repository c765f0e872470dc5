use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use synth_model::{Result, SynthError};

/// Options of a privacy assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Attributes an attacker may know. Empty means the site plus every
    /// categorical variable shared by both datasets.
    pub quasi_identifiers: Vec<String>,
    /// Attribute the inference game tries to recover. `None` means the
    /// first shared continuous variable that is not a quasi-identifier.
    pub sensitive_attribute: Option<String>,
    /// Smallest acceptable equivalence-class size.
    pub k_floor: usize,
    /// Largest acceptable attack success rate.
    pub risk_ceiling: f64,
    /// Bucket width applied to numeric quasi-identifiers before grouping.
    pub generalization: BTreeMap<String, f64>,
    /// Cap on attacked records per game.
    pub max_targets: usize,
    /// Seed for choosing targets when a dataset exceeds `max_targets`.
    pub seed: u64,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            quasi_identifiers: Vec::new(),
            sensitive_attribute: None,
            k_floor: 5,
            risk_ceiling: 0.2,
            generalization: BTreeMap::new(),
            max_targets: 2_000,
            seed: 42,
        }
    }
}

impl PrivacyConfig {
    #[must_use]
    pub fn with_quasi_identifiers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quasi_identifiers = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_sensitive_attribute(mut self, name: impl Into<String>) -> Self {
        self.sensitive_attribute = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_k_floor(mut self, k_floor: usize) -> Self {
        self.k_floor = k_floor;
        self
    }

    #[must_use]
    pub fn with_risk_ceiling(mut self, ceiling: f64) -> Self {
        self.risk_ceiling = ceiling;
        self
    }

    #[must_use]
    pub fn with_generalization(mut self, name: impl Into<String>, width: f64) -> Self {
        self.generalization.insert(name.into(), width);
        self
    }

    #[must_use]
    pub fn with_max_targets(mut self, max_targets: usize) -> Self {
        self.max_targets = max_targets;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.k_floor == 0 {
            return Err(SynthError::invalid_config("k_floor must be positive"));
        }
        if !(0.0..=1.0).contains(&self.risk_ceiling) {
            return Err(SynthError::invalid_config(format!(
                "risk_ceiling must lie in [0, 1], got {}",
                self.risk_ceiling
            )));
        }
        if self.max_targets == 0 {
            return Err(SynthError::invalid_config("max_targets must be positive"));
        }
        if let Some((name, width)) = self
            .generalization
            .iter()
            .find(|(_, width)| !width.is_finite() || **width <= 0.0)
        {
            return Err(SynthError::invalid_config(format!(
                "generalization width of {name} must be positive, got {width}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PrivacyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.k_floor, 5);
        assert_eq!(config.max_targets, 2_000);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(PrivacyConfig::default().with_k_floor(0).validate().is_err());
        assert!(PrivacyConfig::default().with_risk_ceiling(1.2).validate().is_err());
        assert!(
            PrivacyConfig::default()
                .with_generalization("AGE", 0.0)
                .validate()
                .is_err()
        );
    }
}
