//! Two-sample tests used for the statistical-utility score.

use std::collections::BTreeMap;

/// Statistic and asymptotic p-value of a two-sample test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestOutcome {
    pub statistic: f64,
    pub p_value: f64,
}

impl TestOutcome {
    /// True when the null of a common distribution survives at `alpha`.
    pub fn accepts(&self, alpha: f64) -> bool {
        self.p_value >= alpha
    }
}

/// Largest gap between the empirical CDFs of two ascending samples.
pub fn ks_statistic(left: &[f64], right: &[f64]) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let (n, m) = (left.len() as f64, right.len() as f64);
    let (mut i, mut j) = (0, 0);
    let mut largest: f64 = 0.0;
    while i < left.len() && j < right.len() {
        let x = left[i].min(right[j]);
        while i < left.len() && left[i] <= x {
            i += 1;
        }
        while j < right.len() && right[j] <= x {
            j += 1;
        }
        largest = largest.max((i as f64 / n - j as f64 / m).abs());
    }
    largest
}

/// Below this, the Kolmogorov tail equals 1 to double precision.
const KOLMOGOROV_FLOOR: f64 = 0.2;

/// Upper tail `Q(λ) = 2 Σ (-1)^(k-1) exp(-2 k² λ²)` of the Kolmogorov
/// distribution, summed until the terms vanish.
pub fn kolmogorov_p_value(lambda: f64) -> f64 {
    if lambda < KOLMOGOROV_FLOOR {
        return 1.0;
    }
    let exponent = -2.0 * lambda * lambda;
    let sum: f64 = (1..=100u32)
        .map(|k| (exponent * f64::from(k * k)).exp())
        .take_while(|term| *term > 1e-12)
        .zip([1.0, -1.0].into_iter().cycle())
        .map(|(term, sign)| sign * term)
        .sum();
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Two-sample Kolmogorov–Smirnov test on ascending samples.
pub fn ks_test(left: &[f64], right: &[f64]) -> TestOutcome {
    let statistic = ks_statistic(left, right);
    let (n, m) = (left.len() as f64, right.len() as f64);
    let effective = (n * m / (n + m).max(1.0)).sqrt();
    let lambda = (effective + 0.12 + 0.11 / effective.max(f64::EPSILON)) * statistic;
    TestOutcome {
        statistic,
        p_value: kolmogorov_p_value(lambda),
    }
}

/// Complementary error function by Chebyshev fit, absolute error below 1.2e-7.
pub fn erfc(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 10] = [
        -1.265_512_23,
        1.000_023_68,
        0.374_091_96,
        0.096_784_18,
        -0.186_288_06,
        0.278_868_07,
        -1.135_203_98,
        1.488_515_87,
        -0.822_152_23,
        0.170_872_77,
    ];
    let t = 1.0 / (1.0 + 0.5 * x.abs());
    let series = COEFFICIENTS.iter().rev().fold(0.0, |acc, c| acc * t + c);
    let tail = t * (series - x * x).exp();
    if x >= 0.0 { tail } else { 2.0 - tail }
}

/// Upper tail of chi-square with `df` degrees of freedom (Wilson–Hilferty).
pub fn chi_square_p_value(statistic: f64, df: usize) -> f64 {
    if df == 0 || statistic <= 0.0 {
        return 1.0;
    }
    let k = df as f64;
    let z = ((statistic / k).powf(1.0 / 3.0) - (1.0 - 2.0 / (9.0 * k))) / (2.0 / (9.0 * k)).sqrt();
    (0.5 * erfc(z / std::f64::consts::SQRT_2)).clamp(0.0, 1.0)
}

/// Chi-square test of homogeneity between two level-count tables.
pub fn chi_square_homogeneity(
    left: &BTreeMap<String, usize>,
    right: &BTreeMap<String, usize>,
) -> TestOutcome {
    let left_total: usize = left.values().sum();
    let right_total: usize = right.values().sum();
    let total = (left_total + right_total) as f64;
    let mut levels: Vec<&String> = left.keys().chain(right.keys()).collect();
    levels.sort();
    levels.dedup();
    if left_total == 0 || right_total == 0 || levels.len() < 2 {
        return TestOutcome {
            statistic: 0.0,
            p_value: 1.0,
        };
    }
    let mut statistic = 0.0;
    for level in &levels {
        let a = left.get(*level).copied().unwrap_or_default() as f64;
        let b = right.get(*level).copied().unwrap_or_default() as f64;
        let column = a + b;
        for (observed, row_total) in [(a, left_total), (b, right_total)] {
            let expected = row_total as f64 * column / total;
            if expected > 0.0 {
                statistic += (observed - expected).powi(2) / expected;
            }
        }
    }
    TestOutcome {
        statistic,
        p_value: chi_square_p_value(statistic, levels.len() - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_samples_are_never_rejected() {
        let sample: Vec<f64> = (0..50).map(f64::from).collect();
        let outcome = ks_test(&sample, &sample);
        assert_eq!(outcome.statistic, 0.0);
        assert_eq!(outcome.p_value, 1.0);
        assert!(outcome.accepts(0.05));
    }

    #[test]
    fn shifted_samples_are_rejected() {
        let left: Vec<f64> = (0..100).map(f64::from).collect();
        let right: Vec<f64> = (60..160).map(f64::from).collect();
        let outcome = ks_test(&left, &right);
        assert!((outcome.statistic - 0.6).abs() < 1e-12);
        assert!(!outcome.accepts(0.05));
    }

    #[test]
    fn statistic_handles_ties() {
        let left = [1.0, 1.0, 2.0, 3.0];
        let right = [1.0, 2.0, 2.0, 3.0];
        assert!((ks_statistic(&left, &right) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn erfc_matches_reference_points() {
        assert!((erfc(0.0) - 1.0).abs() < 1e-7);
        assert!((erfc(1.0) - 0.157_299_21).abs() < 1e-6);
        assert!((erfc(-1.0) - 1.842_700_79).abs() < 1e-6);
    }

    #[test]
    fn kolmogorov_tail_at_known_quantiles() {
        assert_eq!(kolmogorov_p_value(0.1), 1.0);
        // 5% and 1% critical values of the Kolmogorov distribution.
        assert!((kolmogorov_p_value(1.358) - 0.05).abs() < 1e-3);
        assert!((kolmogorov_p_value(1.628) - 0.01).abs() < 1e-3);
    }

    #[test]
    fn chi_square_separates_balanced_from_skewed_tables() {
        let table = |a: usize, b: usize| {
            BTreeMap::from([("F".to_string(), a), ("M".to_string(), b)])
        };
        assert_eq!(chi_square_homogeneity(&table(50, 50), &table(50, 50)).p_value, 1.0);
        assert!(chi_square_homogeneity(&table(50, 50), &table(90, 10)).p_value < 0.001);
    }
}
