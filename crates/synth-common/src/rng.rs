//! Explicitly seeded random streams.
//!
//! Every component draws from its own ChaCha stream derived from the run
//! seed, so adding draws to one stage never shifts another stage's output.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

pub type SynthRng = ChaCha8Rng;

/// Stream identifiers, one per consumer of randomness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Distribution = 1,
    Resampling,
    Graphical,
    ImputationTemplate,
    ImputationMask,
    ImputationPass,
    Sites,
    Enrollment,
    SiteAllocation,
    SiteEffects,
    Trajectory,
    Missingness,
    Deviations,
    AdverseEvents,
    Attacks,
}

pub fn stream_rng(seed: u64, stream: Stream) -> SynthRng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream as u64);
    rng
}

/// Stream for the `index`-th independent unit (chunk, pass, column) of a component.
pub fn substream_rng(seed: u64, stream: Stream, index: u64) -> SynthRng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(((stream as u64) << 40) | (index & ((1 << 40) - 1)));
    rng
}

pub fn standard_normal(rng: &mut SynthRng) -> f64 {
    rng.sample(StandardNormal)
}

pub fn normal(rng: &mut SynthRng, mean: f64, sd: f64) -> f64 {
    mean + sd * standard_normal(rng)
}

/// Uniform draw in `[0, 1)`.
pub fn uniform(rng: &mut SynthRng) -> f64 {
    rng.random::<f64>()
}

pub fn bernoulli(rng: &mut SynthRng, probability: f64) -> bool {
    uniform(rng) < probability
}

/// Index drawn proportionally to non-negative `weights`; uniform when all are zero.
pub fn choose_weighted(rng: &mut SynthRng, weights: &[f64]) -> usize {
    let total: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if weights.is_empty() {
        return 0;
    }
    if total <= 0.0 {
        return rng.random_range(0..weights.len());
    }
    let mut target = uniform(rng) * total;
    for (index, weight) in weights.iter().enumerate() {
        if !(weight.is_finite() && *weight > 0.0) {
            continue;
        }
        if target < *weight {
            return index;
        }
        target -= weight;
    }
    weights
        .iter()
        .rposition(|w| w.is_finite() && *w > 0.0)
        .unwrap_or(0)
}
