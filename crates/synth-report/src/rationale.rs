//! Human-readable explanation of a method's position in the ranking.

use std::fmt::Write as _;

use synth_model::{MethodResult, RankedMethod};

fn strongest(ranked: &RankedMethod) -> &'static str {
    let scores = &ranked.normalized;
    [
        ("distribution fidelity", scores.distribution),
        ("correlation structure", scores.correlation),
        ("downstream utility", scores.utility),
        ("privacy", scores.privacy),
        ("speed", scores.performance),
    ]
    .into_iter()
    .fold(("distribution fidelity", f64::NEG_INFINITY), |best, item| {
        if item.1 > best.1 { item } else { best }
    })
    .0
}

/// One paragraph per method: rank, composite, headline metrics and caveats.
pub fn rationale(ranked: &RankedMethod, result: &MethodResult, total: usize) -> String {
    let mut text = format!(
        "Ranked {} of {} with composite {:.3}; strongest on {}. Quality {:.3} (distribution {:.3}, correlation {:.3}, utility {:.3}).",
        ranked.rank,
        total,
        ranked.composite,
        strongest(ranked),
        result.quality.composite,
        result.quality.distribution_score,
        result.quality.correlation_score,
        result.quality.utility_score,
    );
    let privacy = &result.privacy;
    match privacy.overall_risk {
        Some(risk) => {
            let _ = write!(
                text,
                " Privacy risk {risk:.3} ({}), k = {}",
                privacy.risk_level, privacy.k_anonymity
            );
            text.push_str(if privacy.safe_for_release {
                ", safe for release."
            } else {
                ", not safe for release."
            });
        }
        None => text.push_str(" Privacy risk could not be determined."),
    }
    let _ = write!(
        text,
        " Generated {} rows in {:.0} ms.",
        result.performance.rows, result.performance.elapsed_ms
    );
    if !result.quality.validity.is_trusted() || !privacy.validity.is_trusted() {
        text.push_str(" Scores are degraded:");
        for reason in result
            .quality
            .validity
            .reasons()
            .iter()
            .chain(privacy.validity.reasons())
        {
            let _ = write!(text, " {reason};");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::fixtures::result;
    use synth_model::{NormalizedScores, Validity};

    fn ranked() -> RankedMethod {
        RankedMethod {
            rank: 2,
            name: "distribution".into(),
            composite: 0.8124,
            normalized: NormalizedScores {
                distribution: 0.5,
                correlation: 0.75,
                utility: 0.25,
                privacy: 1.0,
                performance: 0.0,
            },
        }
    }

    #[test]
    fn describes_a_safe_method() {
        let text = rationale(&ranked(), &result(0.9, Some(0.05), 12.4), 3);
        insta::assert_snapshot!(text, @"Ranked 2 of 3 with composite 0.812; strongest on privacy. Quality 0.900 (distribution 0.900, correlation 0.900, utility 0.900). Privacy risk 0.050 (low), k = 5, safe for release. Generated 400 rows in 12 ms.");
    }

    #[test]
    fn mentions_indeterminate_risk_and_degradation() {
        let mut method = result(0.5, None, 3.0);
        method.privacy.validity = Validity::from_reasons(vec!["no shared quasi-identifier".into()]);
        let text = rationale(&ranked(), &method, 2);
        assert!(text.contains("could not be determined"));
        assert!(text.ends_with("Scores are degraded: no shared quasi-identifier;"));
    }
}
