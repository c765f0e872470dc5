use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::{EstimatorChoice, GenerationMethod};
use crate::graph::DependencyGraph;
use crate::scenario::ScenarioArtifacts;

/// Trust markers attached to generated data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFlag {
    /// The generator fell back to a prior or default distribution.
    Degraded,
    /// Iterative imputation stopped on its iteration budget.
    Unconverged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationDiagnostics {
    pub estimator: EstimatorChoice,
    pub passes: usize,
    /// Chained-equation sweeps used by each pass.
    pub iterations: Vec<usize>,
    pub converged: bool,
    pub imputed_cells: usize,
    /// Variance of the pass estimates per column, averaged over imputed cells.
    pub between_pass_variance: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub method: Option<GenerationMethod>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub flags: BTreeSet<DataFlag>,
    #[serde(default)]
    pub notes: Vec<String>,
    pub graph: Option<DependencyGraph>,
    pub imputation: Option<ImputationDiagnostics>,
    pub scenario: Option<ScenarioArtifacts>,
}

impl DatasetMetadata {
    pub fn generated(method: GenerationMethod, seed: u64) -> Self {
        Self {
            method: Some(method),
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Set a flag and record why.
    #[must_use]
    pub fn flagged(mut self, flag: DataFlag, note: impl Into<String>) -> Self {
        self.flags.insert(flag);
        self.notes.push(note.into());
        self
    }

    pub fn has_flag(&self, flag: DataFlag) -> bool {
        self.flags.contains(&flag)
    }
}
