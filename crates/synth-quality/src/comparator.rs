//! Fidelity comparison of a candidate dataset against its reference.

use std::collections::BTreeMap;

use rayon::prelude::*;
use synth_common::linalg;
use synth_model::{
    DataFlag, Dataset, QualityReport, Result, SynthError, Validity, Value, VariableMetrics,
    VariableSpec,
};
use tracing::{debug, info, info_span};

use crate::config::QualityConfig;
use crate::correlation::{correlation_matrix, correlation_score};
use crate::hypothesis::{chi_square_homogeneity, ks_test};
use crate::similarity::{scaled_similarity, total_variation, wasserstein_1};

#[derive(Debug, Clone, Copy, Default)]
pub struct QualityComparator {
    config: QualityConfig,
}

impl QualityComparator {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Score how closely `candidate` reproduces `reference`.
    ///
    /// Only variables present in both schemas with the same kind are
    /// compared. Comparing a dataset with itself scores exactly 1.0 on
    /// every component.
    pub fn compare(&self, reference: &Dataset, candidate: &Dataset) -> Result<QualityReport> {
        self.config.validate()?;
        if reference.is_empty() {
            return Err(SynthError::EmptyDataset("reference dataset has no rows".into()));
        }
        if candidate.is_empty() {
            return Err(SynthError::EmptyDataset("candidate dataset has no rows".into()));
        }
        let span = info_span!(
            "quality",
            reference_rows = reference.len(),
            candidate_rows = candidate.len()
        );
        let _guard = span.enter();

        let mut reasons = Vec::new();
        if candidate.metadata().has_flag(DataFlag::Degraded) {
            reasons.push("candidate was generated from a fallback distribution".to_string());
        }
        if candidate.metadata().has_flag(DataFlag::Unconverged) {
            reasons.push("candidate imputation did not converge".to_string());
        }

        let shared: Vec<&VariableSpec> = reference
            .schema()
            .variables
            .iter()
            .filter(|variable| {
                candidate
                    .schema()
                    .variable(&variable.name)
                    .is_some_and(|other| other.is_continuous() == variable.is_continuous())
            })
            .collect();
        if shared.is_empty() {
            reasons.push("no variables are shared by reference and candidate".to_string());
        }

        let alpha = self.config.alpha;
        let compared: Vec<(VariableMetrics, Option<String>)> = shared
            .par_iter()
            .map(|variable| compare_variable(variable, reference, candidate, alpha))
            .collect();
        let mut variables = Vec::with_capacity(compared.len());
        for (metrics, reason) in compared {
            reasons.extend(reason);
            variables.push(metrics);
        }

        let distribution_score = if variables.is_empty() {
            0.0
        } else {
            variables.iter().map(|metrics| metrics.similarity).sum::<f64>() / variables.len() as f64
        };

        let numeric: Vec<String> = shared
            .iter()
            .filter(|variable| variable.is_continuous())
            .map(|variable| variable.name.clone())
            .collect();
        let correlation_delta = linalg::frobenius_distance(
            &correlation_matrix(reference, &numeric),
            &correlation_matrix(candidate, &numeric),
        );
        let correlation_score = correlation_score(correlation_delta, numeric.len());

        let verdicts: Vec<bool> = variables
            .iter()
            .filter_map(|metrics| metrics.same_distribution)
            .collect();
        let utility_score = if verdicts.is_empty() {
            if !shared.is_empty() {
                reasons.push("no variable had enough observations to test".to_string());
            }
            0.0
        } else {
            verdicts.iter().filter(|same| **same).count() as f64 / verdicts.len() as f64
        };

        let composite = self.config.weights.quality_composite(
            distribution_score,
            correlation_score,
            utility_score,
        );
        info!(
            variables = variables.len(),
            distribution_score,
            correlation_score,
            utility_score,
            composite,
            degraded = !reasons.is_empty(),
            "quality comparison complete"
        );
        Ok(QualityReport {
            variables,
            distribution_score,
            correlation_delta,
            correlation_score,
            utility_score,
            composite,
            validity: Validity::from_reasons(reasons),
        })
    }
}

/// Compare with the default configuration.
pub fn compare(reference: &Dataset, candidate: &Dataset) -> Result<QualityReport> {
    QualityComparator::default().compare(reference, candidate)
}

fn level_counts(dataset: &Dataset, name: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for level in dataset.rows().iter().filter_map(|row| row.value(name).and_then(Value::as_str)) {
        *counts.entry(level.to_string()).or_default() += 1;
    }
    counts
}

fn compare_variable(
    variable: &VariableSpec,
    reference: &Dataset,
    candidate: &Dataset,
    alpha: f64,
) -> (VariableMetrics, Option<String>) {
    let name = variable.name.as_str();
    let sparse = || Some(format!("{name} has fewer than two observations"));
    if variable.is_continuous() {
        let left = linalg::sorted_finite(&reference.numeric_column(name));
        let right = linalg::sorted_finite(&candidate.numeric_column(name));
        let distance =
            (!left.is_empty() && !right.is_empty()).then(|| wasserstein_1(&left, &right));
        // Two empty columns have the same (empty) distribution.
        let similarity = match distance {
            Some(distance) => scaled_similarity(distance, linalg::std_dev(&left)),
            None if left.is_empty() && right.is_empty() => 1.0,
            None => 0.0,
        };
        let enough = left.len() >= 2 && right.len() >= 2;
        let test = enough.then(|| ks_test(&left, &right));
        debug!(variable = name, ?distance, similarity, "continuous variable compared");
        let metrics = VariableMetrics {
            name: name.to_string(),
            continuous: true,
            wasserstein: distance,
            similarity,
            ks_statistic: test.map(|test| test.statistic),
            p_value: test.map(|test| test.p_value),
            same_distribution: test.map(|test| test.accepts(alpha)),
            reference_mean: (!left.is_empty()).then(|| linalg::mean(&left)),
            candidate_mean: (!right.is_empty()).then(|| linalg::mean(&right)),
        };
        (metrics, if enough { None } else { sparse() })
    } else {
        let left = level_counts(reference, name);
        let right = level_counts(candidate, name);
        let left_total: usize = left.values().sum();
        let right_total: usize = right.values().sum();
        let similarity = match (left_total, right_total) {
            (0, 0) => 1.0,
            (0, _) | (_, 0) => 0.0,
            _ => 1.0 - total_variation(&left, &right),
        };
        let enough = left_total >= 2 && right_total >= 2;
        let test = enough.then(|| chi_square_homogeneity(&left, &right));
        debug!(variable = name, similarity, "categorical variable compared");
        let metrics = VariableMetrics {
            name: name.to_string(),
            continuous: false,
            wasserstein: None,
            similarity,
            ks_statistic: None,
            p_value: test.map(|test| test.p_value),
            same_distribution: test.map(|test| test.accepts(alpha)),
            reference_mean: None,
            candidate_mean: None,
        };
        (metrics, if enough { None } else { sparse() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_model::{Row, Schema};

    fn dataset(offset: f64) -> Dataset {
        let schema = Schema::new(vec![
            VariableSpec::continuous("X", -100.0, 300.0, 2),
            VariableSpec::continuous("Y", -100.0, 300.0, 2),
            VariableSpec::categorical("SEX", ["F", "M"]),
        ])
        .expect("schema");
        let rows = (0..60)
            .map(|i| {
                let x = f64::from(i) + offset;
                Row::new(format!("S{i}"), "01", "P", "V1")
                    .with_num("X", x)
                    .with_num("Y", if i % 2 == 0 { x } else { 100.0 - x })
                    .with_cat("SEX", if i % 3 == 0 { "F" } else { "M" })
            })
            .collect();
        Dataset::new(schema, rows).expect("dataset")
    }

    #[test]
    fn self_comparison_is_perfect() {
        let reference = dataset(0.0);
        let report = compare(&reference, &reference).expect("report");
        assert_eq!(report.distribution_score, 1.0);
        assert_eq!(report.correlation_score, 1.0);
        assert_eq!(report.utility_score, 1.0);
        assert_eq!(report.composite, 1.0);
        assert!(report.validity.is_trusted());
    }

    #[test]
    fn self_comparison_with_empty_columns_is_perfect() {
        let schema = Schema::new(vec![
            VariableSpec::continuous("X", 0.0, 100.0, 1),
            VariableSpec::continuous("Z", 0.0, 100.0, 1),
            VariableSpec::categorical("GRADE", ["1", "2"]),
        ])
        .expect("schema");
        let rows = (0..40)
            .map(|i| {
                Row::new(format!("S{i}"), "01", "P", "V1")
                    .with_num("X", f64::from(i))
                    .with_missing("Z")
                    .with_missing("GRADE")
            })
            .collect();
        let reference = Dataset::new(schema, rows).expect("dataset");
        let report = compare(&reference, &reference).expect("report");
        assert_eq!(report.variable("Z").map(|z| z.similarity), Some(1.0));
        assert_eq!(report.variable("GRADE").map(|grade| grade.similarity), Some(1.0));
        assert_eq!(report.distribution_score, 1.0);
        assert_eq!(report.correlation_score, 1.0);
        assert_eq!(report.utility_score, 1.0);
        assert_eq!(report.composite, 1.0);
        // Nothing could be tested on the empty columns.
        assert!(!report.validity.is_trusted());
    }

    #[test]
    fn one_sided_empty_column_scores_zero() {
        let schema = Schema::new(vec![VariableSpec::continuous("X", 0.0, 100.0, 1)])
            .expect("schema");
        let observed = (0..10)
            .map(|i| Row::new(format!("S{i}"), "01", "P", "V1").with_num("X", f64::from(i)))
            .collect();
        let empty = (0..10)
            .map(|i| Row::new(format!("S{i}"), "01", "P", "V1").with_missing("X"))
            .collect();
        let report = compare(
            &Dataset::new(schema.clone(), observed).expect("observed"),
            &Dataset::new(schema, empty).expect("empty"),
        )
        .expect("report");
        assert_eq!(report.distribution_score, 0.0);
    }

    #[test]
    fn shifted_candidate_loses_fidelity() {
        let report = compare(&dataset(0.0), &dataset(40.0)).expect("report");
        let x = report.variable("X").expect("X compared");
        assert!((x.wasserstein.expect("distance") - 40.0).abs() < 1e-9);
        assert_eq!(x.same_distribution, Some(false));
        assert!(report.distribution_score < 0.8);
        assert!(report.utility_score < 1.0);
    }

    #[test]
    fn disjoint_schemas_are_degraded() {
        let other = Dataset::new(
            Schema::new(vec![VariableSpec::continuous("Z", 0.0, 1.0, 1)]).expect("schema"),
            vec![Row::new("S1", "01", "P", "V1").with_num("Z", 0.5)],
        )
        .expect("dataset");
        let report = compare(&dataset(0.0), &other).expect("report");
        assert!(!report.validity.is_trusted());
        assert!(report.variables.is_empty());
    }

    #[test]
    fn flagged_candidates_are_degraded() {
        let reference = dataset(0.0);
        let flagged = reference.clone().with_metadata(
            synth_model::DatasetMetadata::default().flagged(DataFlag::Unconverged, "budget"),
        );
        let report = compare(&reference, &flagged).expect("report");
        assert_eq!(report.composite, 1.0);
        assert_eq!(report.validity.reasons().len(), 1);
    }

    #[test]
    fn invalid_alpha_is_rejected() {
        let comparator = QualityComparator::new(QualityConfig::default().with_alpha(1.5));
        let reference = dataset(0.0);
        assert!(matches!(
            comparator.compare(&reference, &reference),
            Err(SynthError::InvalidConfiguration(_))
        ));
    }
}
