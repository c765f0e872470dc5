//! Variable definitions shared by every dataset in a study.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dataset::Value;
use crate::error::{Result, SynthError};

/// Row field holding the unique subject identifier.
pub const SUBJECT_FIELD: &str = "USUBJID";
/// Row field holding the site identifier.
pub const SITE_FIELD: &str = "SITEID";
/// Row field holding the treatment-arm label.
pub const ARM_FIELD: &str = "ARM";
/// Row field holding the visit label.
pub const VISIT_FIELD: &str = "VISIT";

/// Identifier fields every row carries outside the variable map.
pub const RESERVED_FIELDS: [&str; 4] = [SUBJECT_FIELD, SITE_FIELD, ARM_FIELD, VISIT_FIELD];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariableKind {
    /// Numeric measurement with a physiologically valid range.
    Continuous {
        min: f64,
        max: f64,
        /// Number of decimal places values are rounded to.
        #[serde(default)]
        precision: u32,
    },
    /// Categorical variable with an explicit level list.
    Categorical { levels: Vec<String> },
}

/// Closed interval used for clinical normal ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub low: f64,
    pub high: f64,
}

impl Range {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    pub fn midpoint(&self) -> f64 {
        (self.low + self.high) / 2.0
    }

    /// Distance from the interval, zero inside it.
    pub fn distance(&self, value: f64) -> f64 {
        if value < self.low {
            self.low - value
        } else if value > self.high {
            value - self.high
        } else {
            0.0
        }
    }
}

/// Default location and spread for a continuous variable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prior {
    pub mean: f64,
    pub sd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    pub kind: VariableKind,
    #[serde(default)]
    pub unit: Option<String>,
    /// Clinical normal range; drives abnormality scores and clinical bins.
    #[serde(default)]
    pub normal_range: Option<Range>,
    /// Interior cut points for discretisation, ascending.
    #[serde(default)]
    pub bins: Option<Vec<f64>>,
    #[serde(default)]
    pub prior: Option<Prior>,
}

impl VariableSpec {
    pub fn continuous(name: impl Into<String>, min: f64, max: f64, precision: u32) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Continuous {
                min,
                max,
                precision,
            },
            unit: None,
            normal_range: None,
            bins: None,
            prior: None,
        }
    }

    pub fn categorical<I, S>(name: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: VariableKind::Categorical {
                levels: levels.into_iter().map(Into::into).collect(),
            },
            unit: None,
            normal_range: None,
            bins: None,
            prior: None,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_normal_range(mut self, low: f64, high: f64) -> Self {
        self.normal_range = Some(Range::new(low, high));
        self
    }

    #[must_use]
    pub fn with_prior(mut self, mean: f64, sd: f64) -> Self {
        self.prior = Some(Prior { mean, sd });
        self
    }

    #[must_use]
    pub fn with_bins(mut self, cut_points: Vec<f64>) -> Self {
        self.bins = Some(cut_points);
        self
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self.kind, VariableKind::Continuous { .. })
    }

    /// Valid `(min, max)` range for continuous variables.
    pub fn valid_range(&self) -> Option<(f64, f64)> {
        match self.kind {
            VariableKind::Continuous { min, max, .. } => Some((min, max)),
            VariableKind::Categorical { .. } => None,
        }
    }

    pub fn precision(&self) -> u32 {
        match self.kind {
            VariableKind::Continuous { precision, .. } => precision,
            VariableKind::Categorical { .. } => 0,
        }
    }

    pub fn levels(&self) -> &[String] {
        match &self.kind {
            VariableKind::Categorical { levels } => levels,
            VariableKind::Continuous { .. } => &[],
        }
    }

    /// Clamp to the valid range and round to the declared precision.
    pub fn clip_and_round(&self, value: f64) -> f64 {
        match self.kind {
            VariableKind::Continuous {
                min,
                max,
                precision,
            } => round_to(value.clamp(min, max), precision),
            VariableKind::Categorical { .. } => value,
        }
    }

    /// Prior, or a range-derived default (midpoint, range / 6).
    pub fn prior_or_default(&self) -> Prior {
        if let Some(prior) = self.prior {
            return prior;
        }
        match self.kind {
            VariableKind::Continuous { min, max, .. } => Prior {
                mean: (min + max) / 2.0,
                sd: ((max - min) / 6.0).max(f64::EPSILON),
            },
            VariableKind::Categorical { .. } => Prior { mean: 0.0, sd: 1.0 },
        }
    }

    /// Distance outside the normal range in prior-sd units; zero when the
    /// variable has no normal range.
    pub fn abnormality(&self, value: f64) -> f64 {
        match self.normal_range {
            Some(range) => range.distance(value) / self.prior_or_default().sd,
            None => 0.0,
        }
    }

    pub fn admits(&self, value: &Value) -> bool {
        match (&self.kind, value) {
            (VariableKind::Continuous { min, max, .. }, Value::Num(v)) => {
                v.is_finite() && *v >= min - 1e-9 && *v <= max + 1e-9
            }
            (VariableKind::Categorical { levels }, Value::Cat(level)) => {
                levels.iter().any(|candidate| candidate == level)
            }
            _ => false,
        }
    }

    fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SynthError::InvalidSchema("variable name is empty".into()));
        }
        if RESERVED_FIELDS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(&self.name))
        {
            return Err(SynthError::InvalidSchema(format!(
                "{} is a reserved row field",
                self.name
            )));
        }
        match &self.kind {
            VariableKind::Continuous { min, max, .. } => {
                if !(min.is_finite() && max.is_finite() && min < max) {
                    return Err(SynthError::InvalidSchema(format!(
                        "{}: valid range [{min}, {max}] is empty",
                        self.name
                    )));
                }
            }
            VariableKind::Categorical { levels } => {
                if levels.is_empty() {
                    return Err(SynthError::InvalidSchema(format!(
                        "{}: categorical variable has no levels",
                        self.name
                    )));
                }
            }
        }
        if let Some(bins) = &self.bins
            && bins.windows(2).any(|pair| pair[0] >= pair[1])
        {
            return Err(SynthError::InvalidSchema(format!(
                "{}: bin cut points must be strictly ascending",
                self.name
            )));
        }
        Ok(())
    }
}

/// Round half away from zero to `precision` decimals.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub variables: Vec<VariableSpec>,
}

impl Schema {
    pub fn new(variables: Vec<VariableSpec>) -> Result<Self> {
        let schema = Self { variables };
        schema.check()?;
        Ok(schema)
    }

    /// Re-run the construction checks on a schema built another way, such as
    /// a struct literal or a deserialized settings file.
    pub fn check(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for variable in &self.variables {
            variable.check()?;
            if !seen.insert(variable.name.as_str()) {
                return Err(SynthError::InvalidSchema(format!(
                    "duplicate variable {}",
                    variable.name
                )));
            }
        }
        Ok(())
    }

    /// Built-in vital-signs schema used when no reference is supplied.
    pub fn vital_signs() -> Self {
        Self {
            variables: vec![
                VariableSpec::continuous("SYSBP", 70.0, 220.0, 0)
                    .with_unit("mmHg")
                    .with_normal_range(90.0, 140.0)
                    .with_prior(128.0, 15.0),
                VariableSpec::continuous("DIABP", 40.0, 130.0, 0)
                    .with_unit("mmHg")
                    .with_normal_range(60.0, 90.0)
                    .with_prior(80.0, 10.0),
                VariableSpec::continuous("PULSE", 40.0, 180.0, 0)
                    .with_unit("beats/min")
                    .with_normal_range(60.0, 100.0)
                    .with_prior(72.0, 11.0),
                VariableSpec::continuous("TEMP", 34.5, 41.5, 1)
                    .with_unit("C")
                    .with_normal_range(36.1, 37.5)
                    .with_prior(36.8, 0.35),
                VariableSpec::continuous("WEIGHT", 35.0, 200.0, 1)
                    .with_unit("kg")
                    .with_prior(78.0, 15.0),
            ],
        }
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .position(|variable| variable.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.variables
            .iter()
            .map(|variable| variable.name.as_str())
            .collect()
    }

    pub fn continuous(&self) -> impl Iterator<Item = &VariableSpec> {
        self.variables.iter().filter(|variable| variable.is_continuous())
    }

    pub fn categorical(&self) -> impl Iterator<Item = &VariableSpec> {
        self.variables
            .iter()
            .filter(|variable| !variable.is_continuous())
    }

    pub fn continuous_names(&self) -> Vec<String> {
        self.continuous().map(|variable| variable.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
