//! Data model for synthetic clinical-trial generation and validation.
//!
//! Every other crate in the workspace exchanges these types: the immutable
//! [`Dataset`], its [`Schema`], the per-request [`GenerationConfig`], and the
//! [`QualityReport`] / [`PrivacyReport`] / [`MethodComparison`] outputs.

pub mod comparison;
pub mod config;
pub mod dataset;
pub mod error;
pub mod graph;
pub mod ids;
pub mod metadata;
pub mod report;
pub mod scenario;
pub mod schema;

pub use comparison::{
    MethodComparison, MethodResult, NormalizedScores, PerformanceMetrics, RankedMethod,
    Recommendations,
};
pub use config::{
    ArmLabels, DEFAULT_VISITS, DropoutPattern, EnrollmentPattern, EstimatorChoice,
    GenerationConfig, GenerationMethod, GraphSettings, ImputationSettings, SamplingMode,
};
pub use dataset::{Dataset, Row, Value};
pub use error::{Result, SynthError};
pub use graph::{DependencyGraph, Edge};
pub use ids::DatasetFingerprint;
pub use metadata::{DataFlag, DatasetMetadata, ImputationDiagnostics};
pub use report::{
    AttackResults, CompositeWeights, PrivacyReport, QualityReport, RiskLevel, Validity,
    VariableMetrics,
};
pub use scenario::{
    AdverseEvent, AeSeverity, DeviationKind, DropoutRecord, EnrollmentRecord, ProtocolDeviation,
    RealismScore, RealizedMetrics, ScenarioArtifacts,
};
pub use schema::{
    ARM_FIELD, Prior, RESERVED_FIELDS, Range, SITE_FIELD, SUBJECT_FIELD, Schema, VISIT_FIELD,
    VariableKind, VariableSpec, round_to,
};
