//! Stage 4: visit trajectories and dropout.

use synth_common::SynthRng;
use synth_common::rng::{bernoulli, normal};
use synth_model::{DropoutPattern, Schema};

use crate::baseline::BaselineModel;

/// Per-visit drift in variable-sd units.
const DRIFT_PER_VISIT: f64 = 0.02;
/// Within-subject visit-to-visit noise in variable-sd units.
const WITHIN_SUBJECT_NOISE: f64 = 0.25;
const GEOMETRIC_DECAY: f64 = 0.7;
const BISECTION_STEPS: usize = 100;

/// Relative hazard of each post-baseline visit under `pattern`.
pub fn hazard_weights(pattern: DropoutPattern, post_visits: usize) -> Vec<f64> {
    (0..post_visits)
        .map(|step| match pattern {
            DropoutPattern::Exponential => GEOMETRIC_DECAY.powi(step as i32),
            DropoutPattern::EarlyWeighted => (post_visits - step) as f64,
            DropoutPattern::LateWeighted => (step + 1) as f64,
            DropoutPattern::Constant => 1.0,
        })
        .collect()
}

/// Probability that a subject drops out at some visit.
pub fn cumulative_dropout(hazards: &[f64]) -> f64 {
    1.0 - hazards.iter().map(|hazard| 1.0 - hazard).product::<f64>()
}

/// Hazards shaped by `pattern` and scaled so the expected cumulative dropout
/// equals `dropout_rate`.
pub fn calibrate_hazards(
    pattern: DropoutPattern,
    post_visits: usize,
    dropout_rate: f64,
) -> Vec<f64> {
    let weights = hazard_weights(pattern, post_visits);
    if weights.is_empty() || dropout_rate <= 0.0 {
        return vec![0.0; weights.len()];
    }
    let hazards_for = |scale: f64| -> Vec<f64> {
        weights
            .iter()
            .map(|weight| (scale * weight).clamp(0.0, 1.0))
            .collect()
    };
    let smallest = weights.iter().copied().fold(f64::INFINITY, f64::min);
    let (mut low, mut high) = (0.0, 1.0 / smallest);
    for _ in 0..BISECTION_STEPS {
        let middle = 0.5 * (low + high);
        if cumulative_dropout(&hazards_for(middle)) < dropout_rate {
            low = middle;
        } else {
            high = middle;
        }
    }
    hazards_for(0.5 * (low + high))
}

/// Inputs shared by every subject of one scenario run.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryContext<'a> {
    pub model: &'a BaselineModel,
    pub schema: &'a Schema,
    pub visit_count: usize,
    pub hazards: &'a [f64],
    /// Column (in `model.columns`) that carries the treatment effect.
    pub effect_column: Option<usize>,
    pub target_effect: f64,
    pub site_effects: &'a [Vec<f64>],
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectTrajectory {
    /// Continuous values per attended visit, clipped and rounded.
    pub values: Vec<Vec<f64>>,
    pub categorical: Vec<(String, String)>,
    /// Visit index at which the subject dropped out.
    pub dropout_at: Option<usize>,
}

pub fn simulate_subject(
    context: &TrajectoryContext<'_>,
    site: usize,
    treated: bool,
    rng: &mut SynthRng,
) -> SubjectTrajectory {
    let model = context.model;
    let baseline = model.draw(rng);
    let categorical = model.draw_categorical(rng);
    let site_effect = context.site_effects.get(site);
    let ramp_denominator = context.visit_count.saturating_sub(1).max(1) as f64;

    let mut values = Vec::with_capacity(context.visit_count);
    let mut dropout_at = None;
    for visit in 0..context.visit_count {
        if visit > 0 && bernoulli(rng, context.hazards[visit - 1]) {
            dropout_at = Some(visit);
            break;
        }
        let measured = model
            .columns
            .iter()
            .enumerate()
            .map(|(column, name)| {
                let sd = model.sd[column];
                let mut value = baseline[column]
                    + site_effect.map_or(0.0, |effects| effects[column])
                    + DRIFT_PER_VISIT * sd * visit as f64;
                if visit > 0 {
                    value = normal(rng, value, WITHIN_SUBJECT_NOISE * sd);
                }
                if treated && context.effect_column == Some(column) {
                    value += context.target_effect * visit as f64 / ramp_denominator;
                }
                match context.schema.variable(name) {
                    Some(variable) => variable.clip_and_round(value),
                    None => value,
                }
            })
            .collect();
        values.push(measured);
    }
    SubjectTrajectory {
        values,
        categorical,
        dropout_at,
    }
}
