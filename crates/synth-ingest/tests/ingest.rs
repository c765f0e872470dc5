//! File-level loading and export.

use std::fs;
use std::path::Path;

use proptest::prelude::*;
use synth_ingest::{
    IngestError, ReadOptions, load_schema, read_reference, read_reference_from, to_csv_string,
    write_dataset,
};
use synth_model::{Dataset, Row, Schema, VariableKind, VariableSpec};

const REFERENCE: &str = "\
USUBJID,SITEID,ARM,VISIT,AGE,SEX,DIABP
SUBJ-0001,01,Placebo,Baseline,54,F,82
SUBJ-0001,01,Placebo,Week 4,54,F,.
SUBJ-0002,02,Treatment,Baseline,61,M,77
SUBJ-0002,02,Treatment,Week 4,61,M,74
";

#[test]
fn csv_written_back_reads_to_the_same_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("reference.csv");
    fs::write(&source, REFERENCE).expect("write reference");

    let reference = read_reference(&source, &ReadOptions::default()).expect("reference");
    assert_eq!(reference.subjects(), ["SUBJ-0001", "SUBJ-0002"]);
    assert!((reference.missing_rate() - 1.0 / 12.0).abs() < 1e-12);

    let copy = dir.path().join("copy.csv");
    write_dataset(&reference, &copy).expect("write copy");
    let options = ReadOptions::default().with_schema(reference.schema().clone());
    let reread = read_reference(&copy, &options).expect("reread");
    assert_eq!(reread.rows(), reference.rows());
}

#[test]
fn json_export_round_trips_through_serde() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("reference.csv");
    fs::write(&source, REFERENCE).expect("write reference");
    let reference = read_reference(&source, &ReadOptions::default()).expect("reference");

    let target = dir.path().join("reference.json");
    write_dataset(&reference, &target).expect("write json");
    let parsed: Dataset =
        serde_json::from_str(&fs::read_to_string(&target).expect("read json")).expect("parse");
    assert_eq!(parsed.rows(), reference.rows());
    assert_eq!(parsed.schema().names(), reference.schema().names());
}

#[test]
fn schema_files_are_validated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("schema.json");
    fs::write(
        &good,
        r#"{"variables": [
            {"name": "AGE", "kind": {"type": "continuous", "min": 18, "max": 90}},
            {"name": "SEX", "kind": {"type": "categorical", "levels": ["F", "M"]}}
        ]}"#,
    )
    .expect("write schema");
    let schema = load_schema(&good).expect("schema");
    assert!(matches!(
        schema.variable("AGE").map(|variable| &variable.kind),
        Some(VariableKind::Continuous { precision: 0, .. })
    ));

    let reserved = dir.path().join("reserved.json");
    fs::write(
        &reserved,
        r#"{"variables": [{"name": "ARM", "kind": {"type": "categorical", "levels": ["A"]}}]}"#,
    )
    .expect("write schema");
    assert!(matches!(load_schema(&reserved), Err(IngestError::Schema(_))));
    assert!(matches!(
        load_schema(&dir.path().join("absent.json")),
        Err(IngestError::FileNotFound { .. })
    ));
}

fn cell_strategy() -> impl Strategy<Value = (Option<u16>, Option<u8>)> {
    (
        prop::option::weighted(0.8, 0u16..2_000),
        prop::option::weighted(0.8, 0u8..3),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn csv_text_reads_back_to_the_same_rows(
        cells in prop::collection::vec(cell_strategy(), 1..30),
    ) {
        let schema = Schema::new(vec![
            VariableSpec::continuous("WEIGHT", 0.0, 200.0, 1),
            VariableSpec::categorical("GRADE", ["A", "B", "C"]),
        ])
        .expect("schema");
        let rows: Vec<Row> = cells
            .iter()
            .enumerate()
            .map(|(i, (weight, grade))| {
                let row = Row::new(format!("S{i:03}"), "SITE-01", "Placebo", "Baseline");
                let row = match weight {
                    Some(tenths) => row.with_num("WEIGHT", f64::from(*tenths) / 10.0),
                    None => row.with_missing("WEIGHT"),
                };
                match grade {
                    Some(level) => row.with_cat("GRADE", ["A", "B", "C"][usize::from(*level)]),
                    None => row.with_missing("GRADE"),
                }
            })
            .collect();
        let dataset = Dataset::new(schema.clone(), rows).expect("dataset");

        let text = to_csv_string(&dataset).expect("csv");
        let reread = read_reference_from(
            text.as_bytes(),
            Path::new("memory.csv"),
            &ReadOptions::default().with_schema(schema),
        )
        .expect("reread");
        prop_assert_eq!(reread.rows(), dataset.rows());
    }
}
