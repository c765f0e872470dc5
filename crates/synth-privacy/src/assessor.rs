//! Privacy risk assessment of a candidate dataset against its reference.

use synth_model::{
    AttackResults, Dataset, PrivacyReport, Result, RiskLevel, SynthError, Validity, Value,
};
use tracing::{debug, info, info_span, warn};

use crate::anonymity::{k_anonymity, l_diversity};
use crate::attacks::{attribute_inference, linkability, select_targets, singling_out};
use crate::config::PrivacyConfig;
use crate::encoding::{EncodedPair, sensitive_attribute, shared_quasi_identifiers};

/// Fraction of the sensitive attribute's reference range within which a
/// numeric guess counts as correct.
pub const INFERENCE_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Default)]
pub struct PrivacyAssessor {
    config: PrivacyConfig,
}

impl PrivacyAssessor {
    pub fn new(config: PrivacyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PrivacyConfig {
        &self.config
    }

    /// Measure how exposed `reference` subjects are through `candidate`.
    ///
    /// Without a shared quasi-identifier the risk is indeterminate, never
    /// zero, and the release is not considered safe.
    pub fn assess(&self, reference: &Dataset, candidate: &Dataset) -> Result<PrivacyReport> {
        let config = &self.config;
        config.validate()?;
        if reference.is_empty() {
            return Err(SynthError::EmptyDataset("reference dataset has no rows".into()));
        }
        if candidate.is_empty() {
            return Err(SynthError::EmptyDataset("candidate dataset has no rows".into()));
        }
        let span = info_span!(
            "privacy",
            reference_rows = reference.len(),
            candidate_rows = candidate.len()
        );
        let _guard = span.enter();

        let quasi_identifiers = shared_quasi_identifiers(config, reference, candidate);
        let names: Vec<String> = quasi_identifiers.iter().map(|(name, _)| name.clone()).collect();
        if quasi_identifiers.is_empty() {
            warn!("no shared quasi-identifiers; privacy risk is indeterminate");
            return Ok(PrivacyReport {
                k_anonymity: 0,
                l_diversity: 0,
                flagged_records: Vec::new(),
                attacks: AttackResults::default(),
                overall_risk: None,
                risk_level: RiskLevel::Indeterminate,
                safe_for_release: false,
                quasi_identifiers: names,
                validity: Validity::from_reasons(vec![
                    "reference and candidate share no quasi-identifier".to_string(),
                ]),
            });
        }

        let mut reasons = Vec::new();
        let sensitive = sensitive_attribute(config, reference, candidate, &quasi_identifiers);
        if sensitive.is_none() {
            reasons.push("no shared sensitive attribute; inference game not played".to_string());
        }
        let pair = EncodedPair::encode(config, reference, candidate, &quasi_identifiers);
        let column = |dataset: &Dataset| -> Vec<Option<Value>> {
            dataset
                .rows()
                .iter()
                .map(|row| sensitive.as_deref().and_then(|name| row.field(name)))
                .collect()
        };
        let reference_sensitive = column(reference);
        let candidate_sensitive = column(candidate);

        let anonymity = k_anonymity(&pair.candidate, config.k_floor);
        let rendered: Vec<Option<String>> = candidate_sensitive
            .iter()
            .map(|value| value.as_ref().map(ToString::to_string))
            .collect();
        let l = if sensitive.is_some() {
            l_diversity(&pair.candidate, &rendered)
        } else {
            0
        };
        debug!(
            k = anonymity.k,
            l,
            classes = anonymity.equivalence_classes,
            flagged = anonymity.flagged.len(),
            "equivalence classes computed"
        );

        let sensitive_values: Vec<f64> = reference_sensitive
            .iter()
            .filter_map(|value| value.as_ref().and_then(Value::as_f64))
            .collect();
        let tolerance = INFERENCE_TOLERANCE
            * sensitive_values
                .iter()
                .fold(None, |range: Option<(f64, f64)>, value| match range {
                    None => Some((*value, *value)),
                    Some((low, high)) => Some((low.min(*value), high.max(*value))),
                })
                .map_or(0.0, |(low, high)| high - low);

        let candidate_targets =
            select_targets(candidate.len(), config.max_targets, config.seed, 0);
        let reference_targets =
            select_targets(reference.len(), config.max_targets, config.seed, 1);
        let (singling, (linked, inferred)) = rayon::join(
            || singling_out(&pair, &candidate_targets),
            || {
                rayon::join(
                    || linkability(&pair, &reference_targets),
                    || {
                        sensitive.as_ref().and_then(|_| {
                            attribute_inference(
                                &pair,
                                &reference_sensitive,
                                &candidate_sensitive,
                                &reference_targets,
                                tolerance,
                            )
                        })
                    },
                )
            },
        );
        let attacks = AttackResults {
            singling_out: singling,
            linkability: linked,
            attribute_inference: inferred,
        };
        if linked.is_none() {
            reasons.push(
                "fewer than two shared quasi-identifiers; linkability not played".to_string(),
            );
        }

        let overall_risk = attacks.max_rate();
        let risk_level = RiskLevel::from_risk(overall_risk);
        let safe_for_release = overall_risk.is_some_and(|risk| risk < config.risk_ceiling)
            && anonymity.k >= config.k_floor;
        info!(
            k = anonymity.k,
            l,
            ?overall_risk,
            %risk_level,
            safe_for_release,
            "privacy assessment complete"
        );
        Ok(PrivacyReport {
            k_anonymity: anonymity.k,
            l_diversity: l,
            flagged_records: anonymity.flagged,
            attacks,
            overall_risk,
            risk_level,
            safe_for_release,
            quasi_identifiers: names,
            validity: Validity::from_reasons(reasons),
        })
    }
}

/// Assess with the default configuration.
pub fn assess(reference: &Dataset, candidate: &Dataset) -> Result<PrivacyReport> {
    PrivacyAssessor::default().assess(reference, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_model::{Row, Schema, VariableSpec};

    fn dataset(subjects: u32) -> Dataset {
        let schema = Schema::new(vec![
            VariableSpec::continuous("AGE", 18.0, 90.0, 0),
            VariableSpec::categorical("SEX", ["F", "M"]),
            VariableSpec::continuous("SYSBP", 60.0, 250.0, 0),
        ])
        .expect("schema");
        let rows = (0..subjects)
            .map(|i| {
                Row::new(format!("S{i}"), format!("0{}", i % 3), "P", "V1")
                    .with_num("AGE", 20.0 + f64::from(i % 50))
                    .with_cat("SEX", if i % 2 == 0 { "F" } else { "M" })
                    .with_num("SYSBP", 100.0 + f64::from(i))
            })
            .collect();
        Dataset::new(schema, rows).expect("dataset")
    }

    #[test]
    fn copy_of_the_reference_is_unsafe() {
        let reference = dataset(40);
        let config = PrivacyConfig::default()
            .with_quasi_identifiers(["AGE", "SEX", "SYSBP"])
            .with_sensitive_attribute("SITEID");
        let report = PrivacyAssessor::new(config)
            .assess(&reference, &reference)
            .expect("report");
        assert_eq!(report.k_anonymity, 1);
        assert_eq!(report.attacks.singling_out, Some(1.0));
        assert_eq!(report.attacks.linkability, Some(1.0));
        assert_eq!(report.attacks.attribute_inference, Some(1.0));
        assert_eq!(report.risk_level, RiskLevel::High);
        assert!(!report.safe_for_release);
        assert_eq!(report.flagged_records.len(), 40);
    }

    #[test]
    fn coarse_quasi_identifiers_are_safe() {
        let reference = dataset(60);
        let config = PrivacyConfig::default()
            .with_quasi_identifiers(["SEX"])
            .with_sensitive_attribute("SYSBP");
        let report = PrivacyAssessor::new(config)
            .assess(&reference, &reference)
            .expect("report");
        assert_eq!(report.k_anonymity, 30);
        assert_eq!(report.attacks.singling_out, Some(0.0));
        assert_eq!(report.attacks.linkability, None);
        let inferred = report.attacks.attribute_inference.expect("inference played");
        assert!(inferred < 0.2, "inference rate {inferred}");
        assert!(report.safe_for_release);
        assert!(!report.validity.is_trusted());
    }

    #[test]
    fn disjoint_attributes_are_indeterminate() {
        let reference = dataset(10);
        let config = PrivacyConfig::default().with_quasi_identifiers(["ZIP"]);
        let report = PrivacyAssessor::new(config)
            .assess(&reference, &reference)
            .expect("report");
        assert_eq!(report.risk_level, RiskLevel::Indeterminate);
        assert_eq!(report.overall_risk, None);
        assert!(!report.safe_for_release);
        assert!(!report.validity.is_trusted());
    }
}
