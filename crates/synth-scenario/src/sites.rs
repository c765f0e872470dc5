//! Stages 2 and 3: site allocation and per-site effects.

use rand::seq::SliceRandom;
use rand_distr::{Distribution, Gamma};
use synth_common::SynthRng;
use synth_common::rng::normal;

/// Result of distributing subjects over sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteAllocation {
    /// Subjects per site.
    pub sizes: Vec<usize>,
    /// Site index of each subject, in enrollment order.
    pub assignment: Vec<usize>,
}

/// Dirichlet concentration for a heterogeneity in `[0, 1]`: 100 at 0 (near
/// equal shares), 0.1 at 1 (a few dominant sites).
pub fn dirichlet_concentration(heterogeneity: f64) -> f64 {
    10f64.powf(2.0 - 3.0 * heterogeneity.clamp(0.0, 1.0))
}

pub fn allocate_sites(
    n_subjects: usize,
    n_sites: usize,
    heterogeneity: f64,
    rng: &mut SynthRng,
) -> SiteAllocation {
    let n_sites = n_sites.max(1);
    let shares = dirichlet_shares(n_sites, dirichlet_concentration(heterogeneity), rng);
    let sizes = largest_remainder(&shares, n_subjects);
    let mut assignment: Vec<usize> = sizes
        .iter()
        .enumerate()
        .flat_map(|(site, size)| std::iter::repeat_n(site, *size))
        .collect();
    assignment.shuffle(rng);
    SiteAllocation { sizes, assignment }
}

fn dirichlet_shares(n_sites: usize, alpha: f64, rng: &mut SynthRng) -> Vec<f64> {
    let draws: Vec<f64> = match Gamma::new(alpha, 1.0) {
        Ok(gamma) => (0..n_sites).map(|_| gamma.sample(rng)).collect(),
        Err(_) => vec![1.0; n_sites],
    };
    let total: f64 = draws.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return vec![1.0 / n_sites as f64; n_sites];
    }
    draws.iter().map(|draw| draw / total).collect()
}

/// Integer apportionment of `total` by `shares` (Hamilton's method).
pub fn largest_remainder(shares: &[f64], total: usize) -> Vec<usize> {
    let quotas: Vec<f64> = shares.iter().map(|share| share * total as f64).collect();
    let mut sizes: Vec<usize> = quotas.iter().map(|quota| quota.floor() as usize).collect();
    let assigned: usize = sizes.iter().sum();
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|a, b| {
        let fa = quotas[*a] - quotas[*a].floor();
        let fb = quotas[*b] - quotas[*b].floor();
        fb.total_cmp(&fa).then(a.cmp(b))
    });
    for index in order.into_iter().cycle().take(total.saturating_sub(assigned)) {
        sizes[index] += 1;
    }
    sizes
}

/// Additive offset per site and variable, sd = (0.1 + 0.4 h) x variable sd.
pub fn site_effects(
    n_sites: usize,
    variable_sd: &[f64],
    heterogeneity: f64,
    rng: &mut SynthRng,
) -> Vec<Vec<f64>> {
    let scale = 0.1 + 0.4 * heterogeneity.clamp(0.0, 1.0);
    (0..n_sites.max(1))
        .map(|_| {
            variable_sd
                .iter()
                .map(|sd| normal(rng, 0.0, scale * sd))
                .collect()
        })
        .collect()
}
