//! Quality comparison against generated candidates.

use proptest::prelude::*;
use synth_generate::generate;
use synth_model::{Dataset, GenerationConfig, GenerationMethod, Row, Schema, VariableSpec};
use synth_quality::similarity::wasserstein_1;
use synth_quality::{QualityComparator, QualityConfig, compare};

fn reference() -> Dataset {
    let schema = Schema::new(vec![
        VariableSpec::continuous("SYSBP", 60.0, 250.0, 0),
        VariableSpec::continuous("PULSE", 30.0, 200.0, 0),
        VariableSpec::categorical("SEX", ["F", "M"]),
    ])
    .expect("schema");
    let mut rows = Vec::new();
    for arm in ["A", "B"] {
        for i in 0..60 {
            let sysbp = 110.0 + f64::from(i % 30) * 1.5;
            rows.push(
                Row::new(format!("{arm}{i}"), "01", arm, "Baseline")
                    .with_num("SYSBP", sysbp)
                    .with_num("PULSE", 40.0 + 0.3 * sysbp + f64::from(i % 7))
                    .with_cat("SEX", if i % 2 == 0 { "F" } else { "M" }),
            );
        }
    }
    Dataset::new(schema, rows).expect("reference")
}

#[test]
fn resampled_candidate_scores_high() {
    let reference = reference();
    let config = GenerationConfig::new(GenerationMethod::Resampling)
        .with_n_per_arm(60)
        .with_jitter_frac(0.0);
    let candidate = generate(Some(&reference), &config).expect("resampling");
    let report = compare(&reference, &candidate).expect("report");
    assert!(report.distribution_score > 0.8, "{report:?}");
    assert!(report.correlation_score > 0.9);
    assert!(report.validity.is_trusted());
}

#[test]
fn report_serialises_with_validity_tag() {
    let reference = reference();
    let report = QualityComparator::new(QualityConfig::default())
        .compare(&reference, &reference)
        .expect("report");
    let json = serde_json::to_value(&report).expect("json");
    assert_eq!(json["validity"]["status"], "trusted");
    assert_eq!(json["variables"].as_array().map(Vec::len), Some(3));
}

proptest! {
    #[test]
    fn wasserstein_is_symmetric_and_non_negative(
        mut left in prop::collection::vec(-1e3f64..1e3, 1..40),
        mut right in prop::collection::vec(-1e3f64..1e3, 1..40),
    ) {
        left.sort_by(f64::total_cmp);
        right.sort_by(f64::total_cmp);
        let forward = wasserstein_1(&left, &right);
        let backward = wasserstein_1(&right, &left);
        prop_assert!(forward >= 0.0);
        prop_assert!((forward - backward).abs() <= 1e-9 * (1.0 + forward));
    }

    #[test]
    fn component_scores_stay_in_unit_interval(shift in -50.0f64..50.0) {
        let reference = reference();
        let rows = reference
            .rows()
            .iter()
            .map(|row| {
                let mut row = row.clone();
                if let Some(value) = row.num("PULSE") {
                    row = row.with_num("PULSE", (value + shift).clamp(30.0, 200.0));
                }
                row
            })
            .collect();
        let candidate = reference.with_rows(rows).expect("candidate");
        let report = compare(&reference, &candidate).expect("report");
        for score in [
            report.distribution_score,
            report.correlation_score,
            report.utility_score,
            report.composite,
        ] {
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
