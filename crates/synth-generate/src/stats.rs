//! Summary statistics of a reference dataset, shared by the generators.

use std::collections::BTreeMap;

use synth_common::linalg::{self, Matrix};
use synth_model::{Dataset, DatasetFingerprint, Result, SynthError, Value, VariableSpec};

/// `(arm, visit)`.
pub type StratumKey = (String, String);
pub type LevelCounts = BTreeMap<String, usize>;

/// Mean vector and n-1 covariance of complete continuous vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    pub count: usize,
    pub mean: Vec<f64>,
    pub covariance: Matrix,
}

impl Moments {
    fn of(vectors: &[Vec<f64>], dim: usize) -> Self {
        let (mean, covariance) = linalg::mean_and_covariance(vectors, dim);
        Self {
            count: vectors.len(),
            mean,
            covariance,
        }
    }

    /// Enough rows for a non-degenerate covariance of `dim` variables.
    pub fn is_usable(&self, dim: usize) -> bool {
        self.count >= dim + 2
    }
}

/// Which pooling level a stratum fit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitSource {
    Stratum,
    Visit,
    Global,
}

/// Observed values of one continuous variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    /// Ascending observed values.
    pub sorted: Vec<f64>,
    pub sd: f64,
    /// Clinical bin edges including the valid-range endpoints.
    pub edges: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStatistics {
    pub fingerprint: DatasetFingerprint,
    /// Continuous variables in schema order.
    pub columns: Vec<String>,
    pub complete_rows: usize,
    pub global: Moments,
    pub by_visit: BTreeMap<String, Moments>,
    pub by_stratum: BTreeMap<StratumKey, Moments>,
    pub summaries: BTreeMap<String, ColumnSummary>,
    /// Level counts per categorical variable.
    pub levels: BTreeMap<String, LevelCounts>,
    pub stratum_levels: BTreeMap<StratumKey, BTreeMap<String, LevelCounts>>,
}

impl ReferenceStatistics {
    pub fn compute(reference: &Dataset) -> Result<Self> {
        if reference.is_empty() {
            return Err(SynthError::EmptyDataset(
                "cannot summarise an empty reference".into(),
            ));
        }
        let schema = reference.schema();
        let columns = schema.continuous_names();
        let dim = columns.len();

        let mut all = Vec::new();
        let mut per_visit: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
        let mut per_stratum: BTreeMap<StratumKey, Vec<Vec<f64>>> = BTreeMap::new();
        let mut levels: BTreeMap<String, LevelCounts> = BTreeMap::new();
        let mut stratum_levels: BTreeMap<StratumKey, BTreeMap<String, LevelCounts>> =
            BTreeMap::new();

        for row in reference.rows() {
            let key = (row.arm.clone(), row.visit.clone());
            for variable in schema.categorical() {
                if let Some(level) = row.value(&variable.name).and_then(Value::as_str) {
                    *levels
                        .entry(variable.name.clone())
                        .or_default()
                        .entry(level.to_string())
                        .or_default() += 1;
                    *stratum_levels
                        .entry(key.clone())
                        .or_default()
                        .entry(variable.name.clone())
                        .or_default()
                        .entry(level.to_string())
                        .or_default() += 1;
                }
            }
            let complete: Option<Vec<f64>> = columns.iter().map(|column| row.num(column)).collect();
            if let Some(vector) = complete {
                per_visit
                    .entry(row.visit.clone())
                    .or_default()
                    .push(vector.clone());
                per_stratum.entry(key).or_default().push(vector.clone());
                all.push(vector);
            }
        }

        let summaries = schema
            .continuous()
            .map(|variable| {
                let sorted = linalg::sorted_finite(&reference.numeric_column(&variable.name));
                let summary = ColumnSummary {
                    sd: linalg::std_dev(&sorted),
                    edges: bin_edges(variable, &sorted),
                    sorted,
                };
                (variable.name.clone(), summary)
            })
            .collect();

        Ok(Self {
            fingerprint: reference.fingerprint(),
            complete_rows: all.len(),
            global: Moments::of(&all, dim),
            by_visit: per_visit
                .into_iter()
                .map(|(visit, vectors)| (visit, Moments::of(&vectors, dim)))
                .collect(),
            by_stratum: per_stratum
                .into_iter()
                .map(|(key, vectors)| (key, Moments::of(&vectors, dim)))
                .collect(),
            columns,
            summaries,
            levels,
            stratum_levels,
        })
    }

    pub fn summary(&self, name: &str) -> Option<&ColumnSummary> {
        self.summaries.get(name)
    }

    /// Observed standard deviation, zero for unknown or constant columns.
    pub fn sd(&self, name: &str) -> f64 {
        self.summary(name).map_or(0.0, |summary| summary.sd)
    }

    /// Most specific usable fit for a stratum: the stratum itself, then the
    /// visit pooled over arms, then all rows.
    pub fn moments_for(&self, arm: &str, visit: &str) -> Option<(&Moments, FitSource)> {
        let dim = self.columns.len();
        let key = (arm.to_string(), visit.to_string());
        if let Some(moments) = self.by_stratum.get(&key).filter(|m| m.is_usable(dim)) {
            return Some((moments, FitSource::Stratum));
        }
        if let Some(moments) = self.by_visit.get(visit).filter(|m| m.is_usable(dim)) {
            return Some((moments, FitSource::Visit));
        }
        self.global
            .is_usable(dim)
            .then_some((&self.global, FitSource::Global))
    }

    /// Level counts for a categorical variable in a stratum, else overall.
    pub fn level_counts(&self, arm: &str, visit: &str, variable: &str) -> Option<&LevelCounts> {
        self.stratum_levels
            .get(&(arm.to_string(), visit.to_string()))
            .and_then(|by_variable| by_variable.get(variable))
            .or_else(|| self.levels.get(variable))
    }
}

/// Bin edges for a continuous variable: valid-range endpoints around the
/// explicit cut points, else the normal range (low, midpoint, high), else the
/// observed quartiles, else four equal-width bins.
pub fn bin_edges(variable: &VariableSpec, sorted: &[f64]) -> Vec<f64> {
    let Some((min, max)) = variable.valid_range() else {
        return Vec::new();
    };
    let interior: Vec<f64> = if let Some(bins) = &variable.bins {
        bins.clone()
    } else if let Some(range) = variable.normal_range {
        vec![range.low, range.midpoint(), range.high]
    } else if sorted.len() >= 4 {
        [0.25, 0.5, 0.75]
            .iter()
            .filter_map(|q| linalg::quantile(sorted, *q))
            .collect()
    } else {
        (1..4).map(|i| min + (max - min) * f64::from(i) / 4.0).collect()
    };
    let mut edges = vec![min];
    for cut in interior {
        if cut > min && cut < max && edges.last().is_some_and(|last| cut > *last) {
            edges.push(cut);
        }
    }
    edges.push(max);
    edges
}

/// Bin of `value` given edges from [`bin_edges`]; clamps to the outer bins.
pub fn bin_index(edges: &[f64], value: f64) -> usize {
    if edges.len() < 3 {
        return 0;
    }
    edges[1..edges.len() - 1].partition_point(|edge| *edge <= value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_model::{Row, Schema};

    #[test]
    fn normal_range_gives_four_clinical_bins() {
        let schema = Schema::vital_signs();
        let sysbp = schema.variable("SYSBP").expect("SYSBP");
        let edges = bin_edges(sysbp, &[]);
        assert_eq!(edges, vec![70.0, 90.0, 115.0, 140.0, 220.0]);
        assert_eq!(bin_index(&edges, 85.0), 0);
        assert_eq!(bin_index(&edges, 90.0), 1);
        assert_eq!(bin_index(&edges, 150.0), 3);
        assert_eq!(bin_index(&edges, 500.0), 3);
    }

    #[test]
    fn quartiles_are_used_without_clinical_ranges() {
        let weight = VariableSpec::continuous("W", 0.0, 100.0, 0);
        let sorted: Vec<f64> = (1..=9).map(|v| f64::from(v) * 10.0).collect();
        assert_eq!(bin_edges(&weight, &sorted), vec![0.0, 30.0, 50.0, 70.0, 100.0]);
    }

    #[test]
    fn stratum_fit_falls_back_to_visit_pool() {
        let schema = Schema::new(vec![VariableSpec::continuous("X", 0.0, 100.0, 1)])
            .expect("schema");
        let mut rows = Vec::new();
        for i in 0..6 {
            rows.push(
                Row::new(format!("A{i}"), "01", "A", "V1").with_num("X", 10.0 + f64::from(i)),
            );
        }
        rows.push(Row::new("B0", "01", "B", "V1").with_num("X", 50.0));
        let reference = Dataset::new(schema, rows).expect("dataset");
        let stats = ReferenceStatistics::compute(&reference).expect("stats");
        assert_eq!(stats.moments_for("A", "V1").map(|m| m.1), Some(FitSource::Stratum));
        assert_eq!(stats.moments_for("B", "V1").map(|m| m.1), Some(FitSource::Visit));
        assert_eq!(stats.complete_rows, 7);
    }
}
