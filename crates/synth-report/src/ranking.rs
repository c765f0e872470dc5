//! Cross-method normalisation, ranking and recommendations.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use synth_model::{
    CompositeWeights, MethodComparison, MethodResult, NormalizedScores, RankedMethod,
    Recommendations, Result, SynthError,
};
use tracing::debug;

use crate::rationale::rationale;

/// Min-max scale `values` to [0, 1]; all-equal input maps to 1.0.
///
/// With `lower_is_better` the smallest value scores 1.0.
pub fn min_max(values: &[f64], lower_is_better: bool) -> Vec<f64> {
    let low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = high - low;
    values
        .iter()
        .map(|value| {
            if spread.is_nan() || spread <= 0.0 {
                1.0
            } else if lower_is_better {
                (high - value) / spread
            } else {
                (value - low) / spread
            }
        })
        .collect()
}

/// Privacy as a benefit: `1 - risk`, 0 when the risk is indeterminate.
pub fn privacy_benefit(result: &MethodResult) -> f64 {
    result.privacy.overall_risk.map_or(0.0, |risk| 1.0 - risk)
}

fn best_by<F>(results: &BTreeMap<String, MethodResult>, key: F) -> Option<String>
where
    F: Fn(&MethodResult) -> Option<f64>,
{
    // BTreeMap order makes ties fall to the first name.
    results
        .iter()
        .filter_map(|(name, result)| key(result).map(|score| (name, score)))
        .fold(None, |best: Option<(&String, f64)>, (name, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((name, score)),
        })
        .map(|(name, _)| name.clone())
}

/// Normalise, score and order `results`.
pub fn rank_methods(
    results: BTreeMap<String, MethodResult>,
    weights: CompositeWeights,
) -> Result<MethodComparison> {
    weights.validate()?;
    if results.is_empty() {
        return Err(SynthError::invalid_config("no method results to rank"));
    }
    let column =
        |metric: fn(&MethodResult) -> f64| -> Vec<f64> { results.values().map(metric).collect() };
    let distribution = min_max(&column(|result| result.quality.distribution_score), false);
    let correlation = min_max(&column(|result| result.quality.correlation_score), false);
    let utility = min_max(&column(|result| result.quality.utility_score), false);
    let privacy = min_max(&column(privacy_benefit), false);
    let performance = min_max(&column(|result| result.performance.elapsed_ms), true);

    let mut ranking: Vec<RankedMethod> = results
        .keys()
        .enumerate()
        .map(|(i, name)| {
            let normalized = NormalizedScores {
                distribution: distribution[i],
                correlation: correlation[i],
                utility: utility[i],
                privacy: privacy[i],
                performance: performance[i],
            };
            let composite = weights.composite(
                normalized.distribution,
                normalized.correlation,
                normalized.utility,
                normalized.privacy,
                normalized.performance,
            );
            RankedMethod {
                rank: 0,
                name: name.clone(),
                composite,
                normalized,
            }
        })
        .collect();
    ranking.sort_by(|left, right| {
        right
            .composite
            .partial_cmp(&left.composite)
            .unwrap_or(Ordering::Equal)
            .then_with(|| left.name.cmp(&right.name))
    });
    for (position, ranked) in ranking.iter_mut().enumerate() {
        ranked.rank = position + 1;
        debug!(method = %ranked.name, rank = ranked.rank, composite = ranked.composite, "ranked");
    }

    let recommendations = Recommendations {
        fastest: best_by(&results, |result| Some(-result.performance.elapsed_ms)),
        highest_fidelity: best_by(&results, |result| Some(result.quality.composite)),
        most_private: best_by(&results, |result| {
            result.privacy.overall_risk.map(|risk| 1.0 - risk)
        }),
        balanced: ranking.first().map(|ranked| ranked.name.clone()),
    };
    let rationale = ranking
        .iter()
        .filter_map(|ranked| {
            let result = results.get(&ranked.name)?;
            Some((ranked.name.clone(), rationale(ranked, result, ranking.len())))
        })
        .collect();

    Ok(MethodComparison {
        results,
        ranking,
        recommendations,
        rationale,
        weights,
    })
}
