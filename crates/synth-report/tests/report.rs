//! Benchmarking and ranking across generation methods.

use proptest::prelude::*;
use synth_model::{
    Dataset, GenerationConfig, GenerationMethod, Row, Schema, SynthError, VariableSpec,
};
use synth_privacy::PrivacyConfig;
use synth_quality::QualityConfig;
use synth_report::{Benchmark, BenchmarkCase, benchmark, min_max};

fn reference() -> Dataset {
    let schema = Schema::new(vec![
        VariableSpec::continuous("AGE", 18.0, 90.0, 0),
        VariableSpec::categorical("SEX", ["F", "M"]),
        VariableSpec::continuous("SYSBP", 60.0, 250.0, 0),
        VariableSpec::continuous("PULSE", 30.0, 200.0, 0),
    ])
    .expect("schema");
    let mut rows = Vec::new();
    for arm in ["Placebo", "Treatment"] {
        for i in 0..40u32 {
            for (k, visit) in ["Baseline", "Week 4"].into_iter().enumerate() {
                let sysbp = 115.0 + f64::from(i % 20) * 2.0 - 3.0 * k as f64;
                rows.push(
                    Row::new(format!("{arm}-{i:02}"), format!("0{}", i % 3 + 1), arm, visit)
                        .with_num("AGE", 30.0 + f64::from(i % 35))
                        .with_cat("SEX", if i % 2 == 0 { "F" } else { "M" })
                        .with_num("SYSBP", sysbp)
                        .with_num("PULSE", 50.0 + 0.2 * sysbp + f64::from(i % 5)),
                );
            }
        }
    }
    Dataset::new(schema, rows).expect("reference")
}

fn cases() -> Vec<BenchmarkCase> {
    [
        GenerationMethod::Distribution,
        GenerationMethod::Resampling,
        GenerationMethod::Graphical,
    ]
    .into_iter()
    .map(|method| {
        BenchmarkCase::for_config(GenerationConfig::new(method).with_n_per_arm(30).with_seed(11))
    })
    .collect()
}

#[test]
fn benchmark_ranks_every_case() {
    let reference = reference();
    let privacy = PrivacyConfig::default().with_quasi_identifiers(["SITEID", "SEX"]);
    let comparison =
        benchmark(&reference, &cases(), &QualityConfig::default(), &privacy).expect("benchmark");

    assert_eq!(comparison.results.len(), 3);
    let ranks: Vec<usize> = comparison.ranking.iter().map(|ranked| ranked.rank).collect();
    assert_eq!(ranks, [1, 2, 3]);
    for pair in comparison.ranking.windows(2) {
        assert!(pair[0].composite >= pair[1].composite);
    }
    for ranked in &comparison.ranking {
        assert!((0.0..=1.0).contains(&ranked.composite), "{ranked:?}");
        let expected = format!("Ranked {} of 3", ranked.rank);
        assert!(comparison.rationale[&ranked.name].starts_with(&expected));
    }
    let best = comparison.best().expect("best");
    assert_eq!(comparison.recommendations.balanced.as_deref(), Some(best.name.as_str()));
    assert!(comparison.recommendations.fastest.is_some());
    assert!(comparison.recommendations.most_private.is_some());
    for result in comparison.results.values() {
        assert_eq!(result.performance.rows, 2 * 30 * 2);
    }
}

#[test]
fn progress_reports_each_case_once() {
    use std::sync::Mutex;

    let reference = reference();
    let seen = Mutex::new(Vec::new());
    Benchmark::default()
        .run_with_progress(&reference, &cases(), |name| {
            if let Ok(mut seen) = seen.lock() {
                seen.push(name.to_string());
            }
        })
        .expect("benchmark");
    let mut seen = seen.into_inner().expect("progress log");
    seen.sort();
    assert_eq!(seen, ["distribution", "graphical", "resampling"]);
}

#[test]
fn duplicate_case_names_are_rejected() {
    let config = GenerationConfig::new(GenerationMethod::Distribution);
    let cases = vec![
        BenchmarkCase::new("same", config.clone()),
        BenchmarkCase::new("same", config.with_seed(2)),
    ];
    let error = Benchmark::default().run(&reference(), &cases).expect_err("duplicate");
    assert!(matches!(error, SynthError::InvalidConfiguration(_)), "{error}");
    assert!(Benchmark::default().run(&reference(), &[]).is_err());
}

proptest! {
    #[test]
    fn normalised_scores_lie_in_unit_interval(
        values in prop::collection::vec(-1.0e6f64..1.0e6, 1..12),
        lower_is_better in any::<bool>(),
    ) {
        let scaled = min_max(&values, lower_is_better);
        prop_assert_eq!(scaled.len(), values.len());
        prop_assert!(scaled.iter().all(|score| (0.0..=1.0).contains(score)));
        prop_assert!(scaled.iter().any(|score| (*score - 1.0).abs() < 1e-12));
    }
}
