use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::report::{CompositeWeights, PrivacyReport, QualityReport};

/// Cost of producing one candidate dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub elapsed_ms: f64,
    pub rows: usize,
}

impl PerformanceMetrics {
    pub fn rows_per_second(&self) -> f64 {
        if self.elapsed_ms <= 0.0 {
            return self.rows as f64;
        }
        self.rows as f64 / (self.elapsed_ms / 1000.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub quality: QualityReport,
    pub privacy: PrivacyReport,
    pub performance: PerformanceMetrics,
}

/// Per-method metrics after min-max normalisation across methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScores {
    pub distribution: f64,
    pub correlation: f64,
    pub utility: f64,
    pub privacy: f64,
    pub performance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMethod {
    /// 1-based position in the ranking.
    pub rank: usize,
    pub name: String,
    pub composite: f64,
    pub normalized: NormalizedScores,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub fastest: Option<String>,
    pub highest_fidelity: Option<String>,
    pub most_private: Option<String>,
    pub balanced: Option<String>,
}

/// Side-by-side evaluation of several generation methods.
///
/// Assembled by the ranking engine from `(method name -> MethodResult)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodComparison {
    pub results: BTreeMap<String, MethodResult>,
    pub ranking: Vec<RankedMethod>,
    pub recommendations: Recommendations,
    pub rationale: BTreeMap<String, String>,
    pub weights: CompositeWeights,
}

impl MethodComparison {
    pub fn best(&self) -> Option<&RankedMethod> {
        self.ranking.first()
    }

    pub fn rank_of(&self, name: &str) -> Option<usize> {
        self.ranking
            .iter()
            .find(|ranked| ranked.name == name)
            .map(|ranked| ranked.rank)
    }
}
