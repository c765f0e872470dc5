//! Side tables produced by the realistic-scenario generator.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub subject_id: String,
    pub site_id: String,
    pub arm: String,
    pub enrolled_on: NaiveDate,
}

/// A subject that left the study before the final visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropoutRecord {
    pub subject_id: String,
    /// Last visit the subject attended.
    pub last_visit: String,
    /// First scheduled visit that was not attended.
    pub dropout_visit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationKind {
    EligibilityViolation,
    VisitWindowViolation,
    ProhibitedMedication,
}

impl DeviationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviationKind::EligibilityViolation => "Eligibility violation",
            DeviationKind::VisitWindowViolation => "Visit window violation",
            DeviationKind::ProhibitedMedication => "Prohibited medication",
        }
    }
}

impl fmt::Display for DeviationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDeviation {
    pub subject_id: String,
    pub visit: String,
    pub kind: DeviationKind,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AeSeverity {
    Mild,
    Moderate,
    Severe,
}

impl AeSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AeSeverity::Mild => "MILD",
            AeSeverity::Moderate => "MODERATE",
            AeSeverity::Severe => "SEVERE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdverseEvent {
    pub subject_id: String,
    pub visit: String,
    pub arm: String,
    pub term: String,
    pub severity: AeSeverity,
    /// Vital-sign abnormality score of the row that triggered the event.
    pub abnormality: f64,
}

/// Values the realism scorer measured on the generated data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizedMetrics {
    pub dropout_rate: f64,
    pub missing_rate: f64,
    pub deviation_subject_rate: f64,
    pub deviation_count: usize,
    pub ae_vitals_correlation: f64,
}

/// Bounded 0-100 realism score with one sub-score per dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RealismScore {
    pub overall: f64,
    pub dropout: f64,
    pub missingness: f64,
    pub deviations: f64,
    pub ae_correlation: f64,
    pub realized: RealizedMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioArtifacts {
    pub enrollment: Vec<EnrollmentRecord>,
    pub site_sizes: Vec<usize>,
    pub dropouts: Vec<DropoutRecord>,
    pub deviations: Vec<ProtocolDeviation>,
    pub adverse_events: Vec<AdverseEvent>,
    pub realism: RealismScore,
}
