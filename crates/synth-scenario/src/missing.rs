//! Stage 5: missing-at-random field masking.

use std::collections::BTreeMap;

use synth_common::SynthRng;
use synth_common::rng::bernoulli;
use synth_model::{Row, Schema};

/// `missing_rate * (0.5 + k / (V - 1)) * (1 + abnormality)`, capped at 1.
///
/// The visit factor averages 1 over the schedule, so the base rate is kept
/// for in-range values and rises with both visit index and abnormality.
pub fn missing_probability(
    missing_rate: f64,
    visit_index: usize,
    visit_count: usize,
    abnormality: f64,
) -> f64 {
    let visit_factor = if visit_count > 1 {
        0.5 + visit_index as f64 / (visit_count - 1) as f64
    } else {
        1.0
    };
    (missing_rate * visit_factor * (1.0 + abnormality.max(0.0))).clamp(0.0, 1.0)
}

/// Copy of `rows` with fields masked; draws one uniform per field in schema
/// order.
pub fn inject_missing(
    rows: Vec<Row>,
    schema: &Schema,
    visit_index: &BTreeMap<String, usize>,
    missing_rate: f64,
    rng: &mut SynthRng,
) -> Vec<Row> {
    if missing_rate <= 0.0 {
        return rows;
    }
    let visit_count = visit_index.len();
    rows.into_iter()
        .map(|mut row| {
            let index = visit_index.get(&row.visit).copied().unwrap_or(0);
            for variable in &schema.variables {
                let abnormality = row
                    .num(&variable.name)
                    .map_or(0.0, |value| variable.abnormality(value));
                let probability =
                    missing_probability(missing_rate, index, visit_count, abnormality);
                if bernoulli(rng, probability) {
                    row.values.insert(variable.name.clone(), None);
                }
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probability_grows_with_visit_and_abnormality() {
        let early = missing_probability(0.1, 0, 4, 0.0);
        let late = missing_probability(0.1, 3, 4, 0.0);
        let abnormal = missing_probability(0.1, 0, 4, 2.0);
        assert!((early - 0.05).abs() < 1e-12);
        assert!((late - 0.15).abs() < 1e-12);
        assert!((abnormal - 0.15).abs() < 1e-12);
        assert_eq!(missing_probability(0.9, 3, 4, 5.0), 1.0);
    }

    #[test]
    fn masking_returns_new_rows() {
        let schema = Schema::new(vec![synth_model::VariableSpec::continuous("HR", 30.0, 200.0, 0)])
            .expect("schema");
        let visit_index = BTreeMap::from([("Baseline".to_string(), 0)]);
        let rows = vec![Row::new("S1", "SITE-01", "Placebo", "Baseline").with_num("HR", 70.0)];
        let mut rng = synth_common::stream_rng(1, synth_common::Stream::Missingness);

        let untouched = inject_missing(rows.clone(), &schema, &visit_index, 0.0, &mut rng);
        assert_eq!(untouched, rows);
        let masked = inject_missing(rows, &schema, &visit_index, 1.0, &mut rng);
        assert_eq!(masked[0].num("HR"), None);
        assert_eq!(masked[0].subject_id, "S1");
    }

    #[test]
    fn single_visit_schedule_keeps_base_rate() {
        assert!((missing_probability(0.2, 0, 1, 0.0) - 0.2).abs() < 1e-12);
    }
}
