//! Pieces shared by the reference-driven generators.

use std::collections::BTreeMap;

use rand::Rng;
use synth_common::rng::choose_weighted;
use synth_common::{SynthRng, reference_arm, site_label};
use synth_model::{Dataset, GenerationConfig, Schema, VariableSpec};

use crate::stats::LevelCounts;

/// Schema of the output: the reference's, else the configured one, else vital signs.
pub(crate) fn resolve_schema(reference: Option<&Dataset>, config: &GenerationConfig) -> Schema {
    reference
        .map(|reference| reference.schema().clone())
        .or_else(|| config.schema.clone())
        .unwrap_or_else(Schema::vital_signs)
}

/// One output arm and the reference arm it is fitted from.
#[derive(Debug, Clone)]
pub(crate) struct ArmPlan {
    pub label: String,
    pub source: Option<String>,
    pub treated: bool,
    /// Offset of this arm's subjects in the global subject numbering.
    pub first_ordinal: usize,
}

pub(crate) fn arm_plans(config: &GenerationConfig, reference: Option<&Dataset>) -> [ArmPlan; 2] {
    let reference_arms = reference.map(Dataset::arms).unwrap_or_default();
    let plan = |index: usize, label: &str| ArmPlan {
        label: label.to_string(),
        source: reference_arm(label, index, &reference_arms).map(str::to_string),
        treated: index == 1,
        first_ordinal: index * config.n_per_arm,
    };
    [
        plan(0, &config.arms.control),
        plan(1, &config.arms.treatment),
    ]
}

/// Site labels for synthetic subjects.
///
/// With a reference, each subject takes the site of a uniformly drawn
/// reference subject, so site shares follow the reference. Without one,
/// subjects are spread round-robin over `n_sites` generated labels.
#[derive(Debug, Clone)]
pub(crate) struct SitePool {
    reference_sites: Vec<String>,
    n_sites: usize,
}

impl SitePool {
    pub fn new(reference: Option<&Dataset>, n_sites: usize) -> Self {
        let mut first_site: BTreeMap<&str, &str> = BTreeMap::new();
        if let Some(reference) = reference {
            for row in reference.rows() {
                first_site
                    .entry(row.subject_id.as_str())
                    .or_insert(row.site_id.as_str());
            }
        }
        Self {
            reference_sites: first_site.values().map(|site| (*site).to_string()).collect(),
            n_sites: n_sites.max(1),
        }
    }

    pub fn draw(&self, ordinal: usize, rng: &mut SynthRng) -> String {
        if self.reference_sites.is_empty() {
            return site_label(ordinal % self.n_sites);
        }
        self.reference_sites[rng.random_range(0..self.reference_sites.len())].clone()
    }
}

/// A level drawn from observed counts, or uniformly when none were observed.
pub(crate) fn sample_level(
    variable: &VariableSpec,
    counts: Option<&LevelCounts>,
    rng: &mut SynthRng,
) -> String {
    let levels = variable.levels();
    let weights: Vec<f64> = levels
        .iter()
        .map(|level| {
            counts
                .and_then(|counts| counts.get(level))
                .map_or(0.0, |count| *count as f64)
        })
        .collect();
    let index = choose_weighted(rng, &weights);
    levels.get(index).cloned().unwrap_or_default()
}
