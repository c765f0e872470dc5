//! Invariants of the privacy assessor.

use proptest::prelude::*;
use synth_model::{Dataset, Row, Schema, VariableSpec};
use synth_privacy::{PrivacyAssessor, PrivacyConfig};

fn schema() -> Schema {
    Schema::new(vec![
        VariableSpec::continuous("AGE", 0.0, 120.0, 0),
        VariableSpec::categorical("SEX", ["F", "M"]),
        VariableSpec::categorical("RACE", ["A", "B", "C", "D"]),
        VariableSpec::continuous("WEIGHT", 30.0, 200.0, 1),
    ])
    .expect("schema")
}

fn dataset(records: &[(u8, bool, u8, u8)]) -> Dataset {
    let rows = records
        .iter()
        .enumerate()
        .map(|(i, (age, female, race, weight))| {
            Row::new(format!("S{i}"), format!("{:02}", i % 4), "P", "V1")
                .with_num("AGE", f64::from(*age))
                .with_cat("SEX", if *female { "F" } else { "M" })
                .with_cat("RACE", ["A", "B", "C", "D"][usize::from(*race % 4)])
                .with_num("WEIGHT", 40.0 + f64::from(*weight))
        })
        .collect();
    Dataset::new(schema(), rows).expect("dataset")
}

fn records() -> impl Strategy<Value = Vec<(u8, bool, u8, u8)>> {
    prop::collection::vec((18u8..90, any::<bool>(), 0u8..4, 0u8..120), 2..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn unique_tuples_give_k_of_one(count in 2usize..60) {
        // AGE alone is distinct per row.
        let records: Vec<_> = (0..count).map(|i| (i as u8 + 18, i % 2 == 0, 0, 10)).collect();
        let data = dataset(&records);
        let config = PrivacyConfig::default().with_quasi_identifiers(["AGE", "SEX"]);
        let report = PrivacyAssessor::new(config).assess(&data, &data).expect("report");
        prop_assert_eq!(report.k_anonymity, 1);
        prop_assert!(!report.safe_for_release);
    }

    #[test]
    fn singling_out_never_drops_when_attributes_are_added(
        reference in records(),
        candidate in records(),
    ) {
        let reference = dataset(&reference);
        let candidate = dataset(&candidate);
        let mut previous = 0.0;
        let attributes = ["SEX", "RACE", "AGE", "SITEID"];
        for used in 1..=attributes.len() {
            let config =
                PrivacyConfig::default().with_quasi_identifiers(attributes[..used].to_vec());
            let report = PrivacyAssessor::new(config)
                .assess(&reference, &candidate)
                .expect("report");
            let rate = report.attacks.singling_out.expect("determinate");
            prop_assert!(rate + 1e-12 >= previous, "{used} attributes: {rate} < {previous}");
            previous = rate;
        }
    }

    #[test]
    fn rates_stay_in_unit_interval(reference in records(), candidate in records()) {
        let report = PrivacyAssessor::new(
            PrivacyConfig::default()
                .with_quasi_identifiers(["AGE", "SEX", "RACE"])
                .with_sensitive_attribute("WEIGHT"),
        )
        .assess(&dataset(&reference), &dataset(&candidate))
        .expect("report");
        for rate in [
            report.attacks.singling_out,
            report.attacks.linkability,
            report.attacks.attribute_inference,
            report.overall_risk,
        ]
        .into_iter()
        .flatten()
        {
            prop_assert!((0.0..=1.0).contains(&rate));
        }
        prop_assert!(report.k_anonymity >= 1);
    }
}

#[test]
fn generalization_raises_k() {
    let records: Vec<_> = (0..40u8).map(|i| (20 + i, true, 0, 10)).collect();
    let data = dataset(&records);
    let raw = PrivacyAssessor::new(PrivacyConfig::default().with_quasi_identifiers(["AGE"]))
        .assess(&data, &data)
        .expect("raw");
    let coarse = PrivacyAssessor::new(
        PrivacyConfig::default()
            .with_quasi_identifiers(["AGE"])
            .with_generalization("AGE", 10.0),
    )
    .assess(&data, &data)
    .expect("generalised");
    assert_eq!(raw.k_anonymity, 1);
    assert_eq!(coarse.k_anonymity, 10);
}

fn wide_dataset(first_attribute: &[&str]) -> Dataset {
    let names: Vec<String> = (0..11).map(|i| format!("Q{i}")).collect();
    let schema = Schema::new(
        names
            .iter()
            .map(|name| VariableSpec::categorical(name.as_str(), ["a", "b", "x", "y"]))
            .collect(),
    )
    .expect("schema");
    let rows = first_attribute
        .iter()
        .enumerate()
        .map(|(i, first)| {
            names.iter().enumerate().fold(
                Row::new(format!("S{i}"), "01", "P", "V1"),
                |row, (column, name)| match column {
                    0 => row.with_cat(name.as_str(), *first),
                    5 => row.with_cat(name.as_str(), if i == 0 { "x" } else { "y" }),
                    _ => row.with_cat(name.as_str(), "a"),
                },
            )
        })
        .collect();
    Dataset::new(schema, rows).expect("dataset")
}

#[test]
fn singling_out_holds_past_the_exhaustive_width() {
    // Only Q5 isolates the first record; its Q0 differs between the datasets.
    let reference = wide_dataset(&["b", "a", "a"]);
    let candidate = wide_dataset(&["a", "a", "a"]);
    let rate = |width: usize| {
        let attributes: Vec<String> = (0..width).map(|i| format!("Q{i}")).collect();
        PrivacyAssessor::new(PrivacyConfig::default().with_quasi_identifiers(attributes))
            .assess(&reference, &candidate)
            .expect("report")
            .attacks
            .singling_out
            .expect("determinate")
    };
    let ten = rate(10);
    let eleven = rate(11);
    assert!((ten - 1.0 / 3.0).abs() < 1e-12, "{ten}");
    assert!(eleven >= ten, "{eleven} < {ten}");
}
