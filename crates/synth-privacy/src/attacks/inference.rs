use std::collections::BTreeMap;

use rayon::prelude::*;
use synth_model::Value;

use super::BATCH;
use crate::encoding::EncodedPair;

/// Guess from the sensitive values of equally near candidates: their mean
/// when numeric, their most frequent level otherwise.
fn predict(values: &[&Value]) -> Option<Value> {
    let numeric: Vec<f64> = values.iter().filter_map(|value| value.as_f64()).collect();
    if !numeric.is_empty() {
        return Some(Value::Num(numeric.iter().sum::<f64>() / numeric.len() as f64));
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for level in values.iter().filter_map(|value| value.as_str()) {
        *counts.entry(level).or_default() += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, (level, count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((level, count)),
        })
        .map(|(level, _)| Value::Cat(level.to_string()))
}

fn is_hit(guess: &Value, truth: &Value, tolerance: f64) -> bool {
    match (guess, truth) {
        (Value::Num(guess), Value::Num(truth)) => (guess - truth).abs() <= tolerance,
        (Value::Cat(guess), Value::Cat(truth)) => guess == truth,
        _ => false,
    }
}

/// Accuracy of recovering each targeted reference record's sensitive value
/// from its nearest candidates on the quasi-identifiers.
///
/// Numeric guesses count when within `tolerance`. Targets without an
/// observed sensitive value are skipped; none left means indeterminate.
pub fn attribute_inference(
    pair: &EncodedPair,
    reference_sensitive: &[Option<Value>],
    candidate_sensitive: &[Option<Value>],
    targets: &[usize],
    tolerance: f64,
) -> Option<f64> {
    if pair.width() == 0 {
        return None;
    }
    let targets: Vec<usize> = targets
        .iter()
        .copied()
        .filter(|target| reference_sensitive[*target].is_some())
        .collect();
    if targets.is_empty() {
        return None;
    }
    let columns: Vec<usize> = (0..pair.width()).collect();
    let hits: usize = targets
        .par_chunks(BATCH)
        .map(|batch| {
            batch
                .iter()
                .filter(|&&target| {
                    let nearest = pair.nearest_candidates(&pair.reference[target], &columns);
                    let observed: Vec<&Value> = nearest
                        .iter()
                        .filter_map(|index| candidate_sensitive[*index].as_ref())
                        .collect();
                    match (predict(&observed), &reference_sensitive[target]) {
                        (Some(guess), Some(truth)) => is_hit(&guess, truth, tolerance),
                        _ => false,
                    }
                })
                .count()
        })
        .sum();
    Some(hits as f64 / targets.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Cell, QuasiIdentifier};

    #[test]
    fn majority_and_mean_predictions() {
        let f = Value::Cat("F".into());
        let m = Value::Cat("M".into());
        assert_eq!(predict(&[&f, &m, &m]), Some(m.clone()));
        // Ties go to the first level in order.
        assert_eq!(predict(&[&m, &f]), Some(f));
        let (a, b) = (Value::Num(10.0), Value::Num(20.0));
        assert_eq!(predict(&[&a, &b]), Some(Value::Num(15.0)));
        assert_eq!(predict(&[]), None);
    }

    #[test]
    fn copied_sensitive_values_are_inferred() {
        let rows: Vec<Vec<Cell>> = (0..4).map(|i| vec![Cell::Cat(i)]).collect();
        let pair = EncodedPair {
            attributes: vec![QuasiIdentifier {
                name: "SEX".into(),
                numeric: false,
                span: 1.0,
            }],
            reference: rows.clone(),
            candidate: rows,
        };
        let sensitive: Vec<Option<Value>> =
            (0..4).map(|i| Some(Value::Num(100.0 + f64::from(i)))).collect();
        let rate = attribute_inference(&pair, &sensitive, &sensitive, &[0, 1, 2, 3], 0.5);
        assert_eq!(rate, Some(1.0));
        let none: Vec<Option<Value>> = vec![None; 4];
        assert_eq!(attribute_inference(&pair, &none, &sensitive, &[0, 1], 0.5), None);
    }
}
