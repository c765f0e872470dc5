//! Run settings: an optional JSON file, then command-line overrides.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use synth_model::{EstimatorChoice, GenerationConfig, GenerationMethod};
use synth_privacy::PrivacyConfig;
use synth_quality::QualityConfig;

/// Everything a run can be configured with.
///
/// ```json
/// { "generation": { "method": "resampling", "n_per_arm": 80 },
///   "privacy": { "k_floor": 10 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    pub generation: GenerationConfig,
    pub quality: QualityConfig,
    pub privacy: PrivacyConfig,
}

/// Values given on the command line; each one set replaces the file value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub method: Option<GenerationMethod>,
    pub n_per_arm: Option<usize>,
    pub seed: Option<u64>,
    pub target_effect: Option<f64>,
    pub dropout_rate: Option<f64>,
    pub missing_rate: Option<f64>,
    pub n_sites: Option<usize>,
    pub estimator: Option<EstimatorChoice>,
    pub alpha: Option<f64>,
    pub quasi_identifiers: Vec<String>,
    pub sensitive_attribute: Option<String>,
}

impl RunSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read settings: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse settings: {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        let generation = &mut self.generation;
        if let Some(method) = overrides.method {
            generation.method = method;
        }
        if let Some(n_per_arm) = overrides.n_per_arm {
            generation.n_per_arm = n_per_arm;
        }
        if let Some(seed) = overrides.seed {
            generation.seed = seed;
        }
        if let Some(effect) = overrides.target_effect {
            generation.target_effect = effect;
        }
        if let Some(rate) = overrides.dropout_rate {
            generation.dropout_rate = rate;
        }
        if let Some(rate) = overrides.missing_rate {
            generation.missing_rate = rate;
        }
        if let Some(n_sites) = overrides.n_sites {
            generation.n_sites = n_sites;
        }
        if let Some(estimator) = overrides.estimator {
            generation.estimator_choice = estimator;
        }
        if let Some(alpha) = overrides.alpha {
            self.quality.alpha = alpha;
        }
        if !overrides.quasi_identifiers.is_empty() {
            self.privacy.quasi_identifiers = overrides.quasi_identifiers.clone();
        }
        if let Some(sensitive) = &overrides.sensitive_attribute {
            self.privacy.sensitive_attribute = Some(sensitive.clone());
        }
        self
    }

    /// Check the quality and privacy sections.
    ///
    /// Generation settings are validated against the reference when a
    /// generator runs.
    pub fn validate(&self) -> Result<()> {
        self.quality.validate().context("quality settings")?;
        self.privacy.validate().context("privacy settings")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_replace_file_values() {
        let file: RunSettings = serde_json::from_str(
            r#"{"generation": {"method": "graphical", "n_per_arm": 80, "seed": 5},
                "privacy": {"k_floor": 10}}"#,
        )
        .expect("settings");
        assert_eq!(file.generation.method, GenerationMethod::Graphical);
        assert_eq!(file.privacy.k_floor, 10);

        let merged = file.with_overrides(&Overrides {
            seed: Some(9),
            quasi_identifiers: vec!["SEX".into()],
            ..Overrides::default()
        });
        assert_eq!(merged.generation.n_per_arm, 80);
        assert_eq!(merged.generation.seed, 9);
        assert_eq!(merged.privacy.quasi_identifiers, ["SEX"]);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(serde_json::from_str::<RunSettings>(r#"{"generaton": {}}"#).is_err());
    }
}
