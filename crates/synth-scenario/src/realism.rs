//! Stage 8: realism scoring of a finished scenario.

use synth_model::{RealismScore, RealizedMetrics};

const DROPOUT_WEIGHT: f64 = 0.3;
const MISSINGNESS_WEIGHT: f64 = 0.3;
const DEVIATION_WEIGHT: f64 = 0.2;
const AE_WEIGHT: f64 = 0.2;

/// AE/abnormality correlations inside this band look like real trial data.
const AE_CORRELATION_BAND: (f64, f64) = (0.1, 0.6);
const AE_CORRELATION_FALLOFF: f64 = 0.3;

/// Configured targets the realised metrics are judged against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealismTargets {
    pub dropout_rate: f64,
    pub missing_rate: f64,
    pub deviation_rate: f64,
}

/// `100 * max(0, 1 - |realized - target| / tolerance)`, tolerance = max(0.05, target / 2).
pub fn closeness_score(realized: f64, target: f64) -> f64 {
    let tolerance = (0.5 * target).max(0.05);
    100.0 * (1.0 - (realized - target).abs() / tolerance).max(0.0)
}

pub fn ae_correlation_score(correlation: f64) -> f64 {
    let (low, high) = AE_CORRELATION_BAND;
    let distance = if correlation < low {
        low - correlation
    } else if correlation > high {
        correlation - high
    } else {
        0.0
    };
    100.0 * (1.0 - distance / AE_CORRELATION_FALLOFF).max(0.0)
}

/// Point-biserial correlation between event indicators and abnormality.
pub fn point_biserial(pairs: &[(f64, bool)]) -> f64 {
    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return 0.0;
    }
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().filter(|(_, y)| *y).count() as f64 / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = f64::from(u8::from(*y)) - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return 0.0;
    }
    sxy / (sxx * syy).sqrt()
}

pub fn score_realism(realized: RealizedMetrics, targets: RealismTargets) -> RealismScore {
    let dropout = closeness_score(realized.dropout_rate, targets.dropout_rate);
    let missingness = closeness_score(realized.missing_rate, targets.missing_rate);
    let deviations = closeness_score(realized.deviation_subject_rate, targets.deviation_rate);
    let ae_correlation = ae_correlation_score(realized.ae_vitals_correlation);
    let overall = (DROPOUT_WEIGHT * dropout
        + MISSINGNESS_WEIGHT * missingness
        + DEVIATION_WEIGHT * deviations
        + AE_WEIGHT * ae_correlation)
        .clamp(0.0, 100.0);
    RealismScore {
        overall,
        dropout,
        missingness,
        deviations,
        ae_correlation,
        realized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_targets_score_full_marks() {
        let realized = RealizedMetrics {
            dropout_rate: 0.15,
            missing_rate: 0.05,
            deviation_subject_rate: 0.10,
            deviation_count: 20,
            ae_vitals_correlation: 0.3,
        };
        let targets = RealismTargets {
            dropout_rate: 0.15,
            missing_rate: 0.05,
            deviation_rate: 0.10,
        };
        let score = score_realism(realized, targets);
        assert!((score.overall - 100.0).abs() < 1e-9);
    }

    #[test]
    fn far_misses_score_zero_but_stay_in_range() {
        assert_eq!(closeness_score(0.9, 0.1), 0.0);
        assert_eq!(ae_correlation_score(-0.5), 0.0);
        assert!((closeness_score(0.125, 0.1) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn point_biserial_detects_association() {
        let pairs = [(0.0, false), (0.1, false), (2.0, true), (2.5, true)];
        assert!(point_biserial(&pairs) > 0.9);
        assert_eq!(point_biserial(&[(1.0, true), (2.0, true)]), 0.0);
    }
}
