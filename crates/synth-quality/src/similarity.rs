//! Marginal distribution distances.

use std::collections::BTreeMap;

/// Wasserstein-1 distance between two ascending samples.
///
/// Integrates `|F_left - F_right|` over the merged support, so sample
/// sizes may differ.
pub fn wasserstein_1(left: &[f64], right: &[f64]) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let (n, m) = (left.len() as f64, right.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut distance = 0.0;
    let mut previous = left[0].min(right[0]);
    while i < left.len() || j < right.len() {
        let next = match (left.get(i), right.get(j)) {
            (Some(a), Some(b)) => a.min(*b),
            (Some(a), None) => *a,
            (None, Some(b)) => *b,
            (None, None) => break,
        };
        distance += (i as f64 / n - j as f64 / m).abs() * (next - previous);
        while i < left.len() && left[i] <= next {
            i += 1;
        }
        while j < right.len() && right[j] <= next {
            j += 1;
        }
        previous = next;
    }
    distance
}

/// Similarity in (0, 1] from a distance scaled by the reference sd.
pub fn scaled_similarity(distance: f64, reference_sd: f64) -> f64 {
    let scale = if reference_sd > 0.0 { reference_sd } else { 1.0 };
    1.0 / (1.0 + distance / scale)
}

/// Total variation distance between two level-count tables.
pub fn total_variation(left: &BTreeMap<String, usize>, right: &BTreeMap<String, usize>) -> f64 {
    let left_total = left.values().sum::<usize>().max(1) as f64;
    let right_total = right.values().sum::<usize>().max(1) as f64;
    let mut levels: Vec<&String> = left.keys().chain(right.keys()).collect();
    levels.sort();
    levels.dedup();
    0.5 * levels
        .into_iter()
        .map(|level| {
            let p = left.get(level).copied().unwrap_or_default() as f64 / left_total;
            let q = right.get(level).copied().unwrap_or_default() as f64 / right_total;
            (p - q).abs()
        })
        .sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_equals_distance() {
        let left: Vec<f64> = (0..10).map(f64::from).collect();
        let right: Vec<f64> = left.iter().map(|x| x + 2.5).collect();
        assert!((wasserstein_1(&left, &right) - 2.5).abs() < 1e-12);
        assert_eq!(wasserstein_1(&left, &left), 0.0);
    }

    #[test]
    fn unequal_sizes_compare_distributions() {
        assert!((wasserstein_1(&[0.0, 1.0], &[0.0, 0.0, 1.0, 1.0])).abs() < 1e-12);
        assert!((wasserstein_1(&[0.0], &[1.0, 3.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn similarity_is_one_at_zero_distance() {
        assert_eq!(scaled_similarity(0.0, 4.0), 1.0);
        assert!((scaled_similarity(4.0, 4.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn total_variation_of_disjoint_tables_is_one() {
        let left = BTreeMap::from([("A".to_string(), 3)]);
        let right = BTreeMap::from([("B".to_string(), 7)]);
        assert!((total_variation(&left, &right) - 1.0).abs() < 1e-12);
        assert_eq!(total_variation(&left, &left), 0.0);
    }
}
