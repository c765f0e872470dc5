//! Fidelity and privacy reports produced for a candidate dataset.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

/// Whether a report's scores can be treated as authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Validity {
    #[default]
    Trusted,
    Degraded { reasons: Vec<String> },
}

impl Validity {
    /// `Trusted` when `reasons` is empty.
    pub fn from_reasons(reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Validity::Trusted
        } else {
            Validity::Degraded { reasons }
        }
    }

    pub fn is_trusted(&self) -> bool {
        matches!(self, Validity::Trusted)
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Validity::Trusted => &[],
            Validity::Degraded { reasons } => reasons,
        }
    }
}

/// Weights of the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeWeights {
    pub distribution: f64,
    pub correlation: f64,
    pub utility: f64,
    pub privacy: f64,
    pub performance: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            distribution: 0.30,
            correlation: 0.25,
            utility: 0.25,
            privacy: 0.10,
            performance: 0.10,
        }
    }
}

impl CompositeWeights {
    pub fn validate(&self) -> Result<()> {
        let weights = [
            self.distribution,
            self.correlation,
            self.utility,
            self.privacy,
            self.performance,
        ];
        if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
            return Err(SynthError::invalid_config(
                "composite weights must be finite and non-negative",
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(SynthError::invalid_config("composite weights sum to zero"));
        }
        Ok(())
    }

    /// Weighted mean of the three fidelity components.
    pub fn quality_composite(&self, distribution: f64, correlation: f64, utility: f64) -> f64 {
        let total = self.distribution + self.correlation + self.utility;
        if total <= 0.0 {
            return 0.0;
        }
        (self.distribution * distribution + self.correlation * correlation + self.utility * utility)
            / total
    }

    /// Full five-component weighted sum, normalised by the weight total.
    pub fn composite(
        &self,
        distribution: f64,
        correlation: f64,
        utility: f64,
        privacy: f64,
        performance: f64,
    ) -> f64 {
        let total =
            self.distribution + self.correlation + self.utility + self.privacy + self.performance;
        if total <= 0.0 {
            return 0.0;
        }
        (self.distribution * distribution
            + self.correlation * correlation
            + self.utility * utility
            + self.privacy * privacy
            + self.performance * performance)
            / total
    }
}

/// Fidelity metrics of one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMetrics {
    pub name: String,
    pub continuous: bool,
    /// Wasserstein-1 distance (continuous variables only).
    pub wasserstein: Option<f64>,
    /// Similarity in [0, 1]; `1 - TVD` for categorical variables.
    pub similarity: f64,
    pub ks_statistic: Option<f64>,
    pub p_value: Option<f64>,
    /// KS verdict at the configured significance level.
    pub same_distribution: Option<bool>,
    pub reference_mean: Option<f64>,
    pub candidate_mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub variables: Vec<VariableMetrics>,
    pub distribution_score: f64,
    /// Frobenius norm of the correlation-matrix difference.
    pub correlation_delta: f64,
    pub correlation_score: f64,
    pub utility_score: f64,
    pub composite: f64,
    pub validity: Validity,
}

impl QualityReport {
    pub fn variable(&self, name: &str) -> Option<&VariableMetrics> {
        self.variables.iter().find(|metrics| metrics.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// No shared quasi-identifiers; risk cannot be measured.
    Indeterminate,
}

impl RiskLevel {
    pub fn from_risk(risk: Option<f64>) -> Self {
        match risk {
            None => RiskLevel::Indeterminate,
            Some(value) if value < 0.1 => RiskLevel::Low,
            Some(value) if value < 0.3 => RiskLevel::Medium,
            Some(_) => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Success rates of the simulated attacks; `None` is indeterminate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttackResults {
    pub singling_out: Option<f64>,
    pub linkability: Option<f64>,
    pub attribute_inference: Option<f64>,
}

impl AttackResults {
    /// Largest determinate success rate.
    pub fn max_rate(&self) -> Option<f64> {
        [self.singling_out, self.linkability, self.attribute_inference]
            .into_iter()
            .flatten()
            .reduce(f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyReport {
    pub k_anonymity: usize,
    pub l_diversity: usize,
    /// Candidate row indices in groups smaller than the k floor.
    pub flagged_records: Vec<usize>,
    pub attacks: AttackResults,
    pub overall_risk: Option<f64>,
    pub risk_level: RiskLevel,
    pub safe_for_release: bool,
    /// Quasi-identifiers present in both datasets.
    pub quasi_identifiers: Vec<String>,
    pub validity: Validity,
}
