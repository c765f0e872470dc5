//! Configuration options for synthetic data generation.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{Result, SynthError};
use crate::graph::DependencyGraph;
use crate::schema::Schema;

/// Generation strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMethod {
    /// Parametric multivariate sampling.
    #[default]
    Distribution,
    /// Stratified resampling with Gaussian jitter.
    Resampling,
    /// Discretised Bayesian-network sampling.
    Graphical,
    /// Missingness injection followed by chained-equation imputation.
    Imputation,
    /// Multi-stage trial simulation.
    Realistic,
}

impl GenerationMethod {
    pub const ALL: [GenerationMethod; 5] = [
        GenerationMethod::Distribution,
        GenerationMethod::Resampling,
        GenerationMethod::Graphical,
        GenerationMethod::Imputation,
        GenerationMethod::Realistic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMethod::Distribution => "distribution",
            GenerationMethod::Resampling => "resampling",
            GenerationMethod::Graphical => "graphical",
            GenerationMethod::Imputation => "imputation",
            GenerationMethod::Realistic => "realistic",
        }
    }

    /// Methods that cannot run without a non-empty reference dataset.
    pub fn requires_reference(&self) -> bool {
        matches!(
            self,
            GenerationMethod::Resampling
                | GenerationMethod::Graphical
                | GenerationMethod::Imputation
        )
    }
}

impl fmt::Display for GenerationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        GenerationMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == normalized)
            .ok_or_else(|| format!("Unknown generation method: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPattern {
    /// Exponentially decaying enrollment rate.
    #[default]
    FrontLoaded,
    /// Uniform rate reduced during slow months.
    Seasonal,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropoutPattern {
    /// Hazard decays geometrically over visits.
    #[default]
    Exponential,
    EarlyWeighted,
    LateWeighted,
    Constant,
}

/// Per-column estimator used by chained-equation imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorChoice {
    /// Ridge-regularised linear regression.
    #[default]
    Linear,
    /// Bagged regression trees.
    Ensemble,
}

/// How the distribution-based generator draws its standard-normal block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Whiten each stratum's draws so sample moments equal the fitted ones.
    #[default]
    MomentMatched,
    /// Plain i.i.d. draws.
    Independent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmLabels {
    pub control: String,
    pub treatment: String,
}

impl Default for ArmLabels {
    fn default() -> Self {
        Self {
            control: "Placebo".to_string(),
            treatment: "Active".to_string(),
        }
    }
}

impl ArmLabels {
    pub fn both(&self) -> [&str; 2] {
        [self.control.as_str(), self.treatment.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Dirichlet smoothing added to every CPT cell.
    pub alpha: f64,
    pub max_parents: usize,
    /// Explicit structure; learned from the reference when absent.
    pub structure: Option<DependencyGraph>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_parents: 2,
            structure: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationSettings {
    pub max_iterations: usize,
    /// Largest allowed change of an imputed value, in column-sd units.
    pub tolerance: f64,
    pub passes: usize,
    /// Fail with `NonConvergence` instead of tagging the output.
    pub strict: bool,
}

impl Default for ImputationSettings {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-3,
            passes: 5,
            strict: false,
        }
    }
}

/// Immutable parameters of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub method: GenerationMethod,
    /// Subjects per treatment arm.
    pub n_per_arm: usize,
    /// Offset applied to the effect variable in the treatment arm.
    pub target_effect: f64,
    pub seed: u64,
    pub dropout_rate: f64,
    pub missing_rate: f64,
    pub site_heterogeneity: f64,
    pub enrollment_pattern: EnrollmentPattern,
    pub estimator_choice: EstimatorChoice,
    pub n_sites: usize,
    pub arms: ArmLabels,
    /// Explicit visit schedule; defaults to the reference visits.
    pub visits: Option<Vec<String>>,
    /// Variable receiving `target_effect`; defaults to the first continuous variable.
    pub effect_variable: Option<String>,
    /// Resampling jitter as a fraction of each variable's sd.
    pub jitter_frac: f64,
    pub sampling: SamplingMode,
    pub dropout_pattern: DropoutPattern,
    /// Fraction of subjects receiving protocol deviations.
    pub deviation_rate: f64,
    pub graph: GraphSettings,
    pub imputation: ImputationSettings,
    /// Schema for reference-free runs.
    pub schema: Option<Schema>,
    /// Subjects per scenario chunk.
    pub chunk_size: usize,
    pub study_start: NaiveDate,
    pub enrollment_days: u32,
}

/// Visit schedule used when neither the config nor a reference supplies one.
pub const DEFAULT_VISITS: [&str; 4] = ["Baseline", "Week 4", "Week 8", "Week 12"];

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            method: GenerationMethod::default(),
            n_per_arm: 50,
            target_effect: 0.0,
            seed: 42,
            dropout_rate: 0.15,
            missing_rate: 0.05,
            site_heterogeneity: 0.3,
            enrollment_pattern: EnrollmentPattern::default(),
            estimator_choice: EstimatorChoice::default(),
            n_sites: 5,
            arms: ArmLabels::default(),
            visits: None,
            effect_variable: None,
            jitter_frac: 0.05,
            sampling: SamplingMode::default(),
            dropout_pattern: DropoutPattern::default(),
            deviation_rate: 0.10,
            graph: GraphSettings::default(),
            imputation: ImputationSettings::default(),
            schema: None,
            chunk_size: 5_000,
            study_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            enrollment_days: 365,
        }
    }
}

impl GenerationConfig {
    pub fn new(method: GenerationMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_n_per_arm(mut self, n_per_arm: usize) -> Self {
        self.n_per_arm = n_per_arm;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_target_effect(mut self, effect: f64) -> Self {
        self.target_effect = effect;
        self
    }

    #[must_use]
    pub fn with_dropout_rate(mut self, rate: f64) -> Self {
        self.dropout_rate = rate;
        self
    }

    #[must_use]
    pub fn with_missing_rate(mut self, rate: f64) -> Self {
        self.missing_rate = rate;
        self
    }

    #[must_use]
    pub fn with_site_heterogeneity(mut self, heterogeneity: f64) -> Self {
        self.site_heterogeneity = heterogeneity;
        self
    }

    #[must_use]
    pub fn with_enrollment_pattern(mut self, pattern: EnrollmentPattern) -> Self {
        self.enrollment_pattern = pattern;
        self
    }

    #[must_use]
    pub fn with_estimator(mut self, estimator: EstimatorChoice) -> Self {
        self.estimator_choice = estimator;
        self
    }

    #[must_use]
    pub fn with_n_sites(mut self, n_sites: usize) -> Self {
        self.n_sites = n_sites;
        self
    }

    #[must_use]
    pub fn with_arms(mut self, control: impl Into<String>, treatment: impl Into<String>) -> Self {
        self.arms = ArmLabels {
            control: control.into(),
            treatment: treatment.into(),
        };
        self
    }

    #[must_use]
    pub fn with_visits<I, S>(mut self, visits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visits = Some(visits.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_effect_variable(mut self, name: impl Into<String>) -> Self {
        self.effect_variable = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_jitter_frac(mut self, jitter: f64) -> Self {
        self.jitter_frac = jitter;
        self
    }

    #[must_use]
    pub fn with_sampling(mut self, sampling: SamplingMode) -> Self {
        self.sampling = sampling;
        self
    }

    #[must_use]
    pub fn with_dropout_pattern(mut self, pattern: DropoutPattern) -> Self {
        self.dropout_pattern = pattern;
        self
    }

    #[must_use]
    pub fn with_deviation_rate(mut self, rate: f64) -> Self {
        self.deviation_rate = rate;
        self
    }

    #[must_use]
    pub fn with_graph(mut self, graph: GraphSettings) -> Self {
        self.graph = graph;
        self
    }

    #[must_use]
    pub fn with_imputation(mut self, imputation: ImputationSettings) -> Self {
        self.imputation = imputation;
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Fail fast on out-of-range options or a missing required reference.
    pub fn validate(&self, reference: Option<&Dataset>) -> Result<()> {
        if self.n_per_arm == 0 {
            return Err(SynthError::invalid_config("n_per_arm must be positive"));
        }
        if self.n_sites == 0 {
            return Err(SynthError::invalid_config("n_sites must be positive"));
        }
        if let Some(schema) = &self.schema {
            schema
                .check()
                .map_err(|error| SynthError::invalid_config(format!("schema: {error}")))?;
        }
        for (name, rate) in [
            ("dropout_rate", self.dropout_rate),
            ("missing_rate", self.missing_rate),
            ("site_heterogeneity", self.site_heterogeneity),
            ("deviation_rate", self.deviation_rate),
            ("jitter_frac", self.jitter_frac),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(SynthError::invalid_config(format!(
                    "{name} must lie in [0, 1], got {rate}"
                )));
            }
        }
        if !self.target_effect.is_finite() {
            return Err(SynthError::invalid_config("target_effect must be finite"));
        }
        if self.arms.control.trim().is_empty()
            || self.arms.treatment.trim().is_empty()
            || self.arms.control == self.arms.treatment
        {
            return Err(SynthError::invalid_config(
                "arm labels must be non-empty and distinct",
            ));
        }
        if let Some(visits) = &self.visits {
            let mut seen = std::collections::BTreeSet::new();
            if visits.is_empty() || !visits.iter().all(|visit| seen.insert(visit)) {
                return Err(SynthError::invalid_config(
                    "visit schedule must be non-empty and free of duplicates",
                ));
            }
        }
        if !self.graph.alpha.is_finite() || self.graph.alpha <= 0.0 {
            return Err(SynthError::invalid_config("graph smoothing alpha must be positive"));
        }
        let imputation = &self.imputation;
        if imputation.passes == 0 || imputation.max_iterations == 0 {
            return Err(SynthError::invalid_config(
                "imputation passes and max_iterations must be positive",
            ));
        }
        if imputation.tolerance.is_nan() || imputation.tolerance <= 0.0 {
            return Err(SynthError::invalid_config("imputation tolerance must be positive"));
        }
        if self.chunk_size == 0 || self.enrollment_days == 0 {
            return Err(SynthError::invalid_config(
                "chunk_size and enrollment_days must be positive",
            ));
        }
        if self.method.requires_reference() && reference.is_none_or(Dataset::is_empty) {
            return Err(SynthError::invalid_config(format!(
                "{} generation requires a non-empty reference dataset",
                self.method
            )));
        }
        Ok(())
    }

    /// Effective visit schedule: explicit, then reference, then the default.
    pub fn visit_schedule(&self, reference: Option<&Dataset>) -> Vec<String> {
        if let Some(visits) = &self.visits {
            return visits.clone();
        }
        match reference {
            Some(reference) if !reference.is_empty() => reference.visits(),
            _ => DEFAULT_VISITS.iter().map(|visit| (*visit).to_string()).collect(),
        }
    }

    /// Resolve the variable that receives `target_effect` in `schema`.
    pub fn resolve_effect_variable(&self, schema: &Schema) -> Result<Option<String>> {
        match &self.effect_variable {
            Some(name) => match schema.variable(name) {
                Some(variable) if variable.is_continuous() => Ok(Some(name.clone())),
                Some(_) => Err(SynthError::invalid_config(format!(
                    "effect variable {name} is not continuous"
                ))),
                None => Err(SynthError::UnknownVariable(name.clone())),
            },
            None => Ok(schema.continuous().next().map(|variable| variable.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_subjects_and_bad_rates() {
        let zero = GenerationConfig::default().with_n_per_arm(0);
        assert!(matches!(
            zero.validate(None),
            Err(SynthError::InvalidConfiguration(_))
        ));

        let rate = GenerationConfig::default().with_missing_rate(1.5);
        assert!(matches!(
            rate.validate(None),
            Err(SynthError::InvalidConfiguration(_))
        ));

        let nan = GenerationConfig::default().with_dropout_rate(f64::NAN);
        assert!(nan.validate(None).is_err());
    }

    #[test]
    fn schema_is_checked_however_it_was_built() {
        let inverted = Schema {
            variables: vec![crate::schema::VariableSpec::continuous("SYSBP", 200.0, 100.0, 0)],
        };
        let config = GenerationConfig::new(GenerationMethod::Realistic).with_schema(inverted);
        assert!(matches!(
            config.validate(None),
            Err(SynthError::InvalidConfiguration(message)) if message.contains("SYSBP")
        ));

        let parsed: GenerationConfig = serde_json::from_str(
            r#"{"schema": {"variables": [
                {"name": "X", "kind": {"type": "categorical", "levels": ["a"]}},
                {"name": "X", "kind": {"type": "categorical", "levels": ["b"]}}]}}"#,
        )
        .expect("parse");
        assert!(parsed.validate(None).is_err());
    }

    #[test]
    fn reference_methods_require_reference() {
        for method in GenerationMethod::ALL {
            let result = GenerationConfig::new(method).validate(None);
            assert_eq!(result.is_err(), method.requires_reference(), "{method}");
        }
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!(
            "Graphical".parse::<GenerationMethod>(),
            Ok(GenerationMethod::Graphical)
        );
        assert!("bogus".parse::<GenerationMethod>().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: GenerationConfig =
            serde_json::from_str(r#"{"method":"resampling","n_per_arm":10}"#).expect("parse");
        assert_eq!(config.method, GenerationMethod::Resampling);
        assert_eq!(config.n_per_arm, 10);
        assert_eq!(config.seed, 42);
        assert_eq!(config.arms, ArmLabels::default());
    }
}
