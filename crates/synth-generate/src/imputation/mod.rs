//! Iterative-imputation generator.
//!
//! A complete-case template is drawn from the reference, continuous cells
//! are masked with a visit-dependent schedule, and the holes are refilled
//! by several chained-equation passes pooled per cell.

mod chained;
mod estimators;

use std::collections::BTreeMap;

use rand::Rng;
use rayon::prelude::*;
use synth_common::linalg;
use synth_common::rng::bernoulli;
use synth_common::{Stream, stream_rng, subject_label};
use synth_model::{
    DataFlag, Dataset, DatasetMetadata, GenerationConfig, GenerationMethod, ImputationDiagnostics,
    Result, Row, SynthError, Value,
};
use tracing::{debug, warn};

pub use chained::{ImputationProblem, PassOutcome, run_pass};
pub use estimators::{BaggedTrees, FittedEstimator, RidgeModel};

use crate::cache::StatisticsCache;
use crate::common::arm_plans;

/// Floor on a pass's residual variance when used as a pooling weight.
const MIN_RESIDUAL_VARIANCE: f64 = 1e-12;

/// Relative missingness weight of visit `index` out of `visit_count`.
///
/// Rises linearly with the visit index and averages 1 over the schedule.
pub fn visit_weight(index: usize, visit_count: usize) -> f64 {
    2.0 * (index + 1) as f64 / (visit_count + 1) as f64
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImputationGenerator;

impl ImputationGenerator {
    pub fn generate(&self, reference: &Dataset, config: &GenerationConfig) -> Result<Dataset> {
        if reference.is_empty() {
            return Err(SynthError::invalid_config(
                "imputation requires a non-empty reference dataset",
            ));
        }
        let stats = StatisticsCache::global().get_or_compute(reference)?;
        let schema = reference.schema();
        let columns = stats.columns.clone();
        let effect_column = config
            .resolve_effect_variable(schema)?
            .and_then(|name| columns.iter().position(|column| *column == name));
        let visits = config.visit_schedule(Some(reference));
        let visit_count = visits.len();
        if visit_count == 0 {
            return Err(SynthError::invalid_config("visit schedule is empty"));
        }
        let mut metadata = DatasetMetadata::generated(GenerationMethod::Imputation, config.seed);

        let mut by_stratum: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
        let mut by_visit: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut complete = Vec::new();
        for (index, row) in reference.rows().iter().enumerate() {
            if columns.iter().all(|column| row.num(column).is_some()) {
                by_stratum
                    .entry((row.arm.as_str(), row.visit.as_str()))
                    .or_default()
                    .push(index);
                by_visit.entry(row.visit.as_str()).or_default().push(index);
                complete.push(index);
            }
        }
        let everything: Vec<usize> = (0..reference.len()).collect();
        if complete.is_empty() {
            metadata = metadata.flagged(
                DataFlag::Degraded,
                "no complete reference rows; template drawn from incomplete rows",
            );
        }
        let fallback: &[usize] = if complete.is_empty() {
            &everything
        } else {
            &complete
        };

        let column_mean: Vec<f64> = schema
            .continuous()
            .map(|variable| {
                stats
                    .summary(&variable.name)
                    .filter(|summary| !summary.sorted.is_empty())
                    .map_or_else(
                        || variable.prior_or_default().mean,
                        |summary| linalg::mean(&summary.sorted),
                    )
            })
            .collect();
        let column_sd: Vec<f64> = schema
            .continuous()
            .map(|variable| {
                let sd = stats.sd(&variable.name);
                if sd > 0.0 { sd } else { variable.prior_or_default().sd.max(1.0) }
            })
            .collect();

        // Template.
        let mut rng = stream_rng(config.seed, Stream::ImputationTemplate);
        let mut template = Vec::with_capacity(2 * config.n_per_arm * visit_count);
        let mut covariates = Vec::with_capacity(template.capacity());
        for arm in arm_plans(config, Some(reference)) {
            let source = arm.source.as_deref().unwrap_or_default();
            let pools: Vec<&[usize]> = visits
                .iter()
                .map(|visit| {
                    by_stratum
                        .get(&(source, visit.as_str()))
                        .or_else(|| by_visit.get(visit.as_str()))
                        .map_or(fallback, Vec::as_slice)
                })
                .collect();
            for i in 0..config.n_per_arm {
                let subject = subject_label(arm.first_ordinal + i);
                let mut site = None;
                for (k, (visit, pool)) in visits.iter().zip(&pools).enumerate() {
                    let drawn = &reference.rows()[pool[rng.random_range(0..pool.len())]];
                    let site = site.get_or_insert_with(|| drawn.site_id.clone());
                    let mut row = Row::new(&subject, site.as_str(), &arm.label, visit);
                    for variable in schema.categorical() {
                        row.values
                            .insert(variable.name.clone(), drawn.value(&variable.name).cloned());
                    }
                    template.push((row, drawn, arm.treated));
                    let visit_position = if visit_count > 1 {
                        k as f64 / (visit_count - 1) as f64
                    } else {
                        0.0
                    };
                    covariates.push(vec![f64::from(u8::from(arm.treated)), visit_position]);
                }
            }
        }

        // Mask.
        let mut rng = stream_rng(config.seed, Stream::ImputationMask);
        let values: Vec<Vec<Option<f64>>> = template
            .iter()
            .enumerate()
            .map(|(index, (_, drawn, _))| {
                let k = index % visit_count;
                let p = (config.missing_rate * visit_weight(k, visit_count)).min(1.0);
                columns
                    .iter()
                    .map(|column| {
                        if bernoulli(&mut rng, p) { None } else { drawn.num(column) }
                    })
                    .collect()
            })
            .collect();
        let problem = ImputationProblem {
            values,
            covariates,
            column_sd,
            fallback_mean: column_mean,
        };
        let imputed_cells = problem.missing_cells();
        debug!(rows = template.len(), imputed_cells, "imputation template masked");

        let settings = config.imputation;
        let outcomes: Vec<PassOutcome> = (0..settings.passes)
            .into_par_iter()
            .map(|pass| {
                run_pass(&problem, config.estimator_choice, &settings, config.seed, pass)
            })
            .collect();

        let converged = outcomes.iter().all(|outcome| outcome.converged);
        if !converged {
            let last_change = outcomes
                .iter()
                .map(|outcome| outcome.last_change)
                .fold(0.0, f64::max);
            if settings.strict {
                return Err(SynthError::NonConvergence {
                    iterations: settings.max_iterations,
                    last_change,
                });
            }
            warn!(
                max_iterations = settings.max_iterations,
                last_change, "imputation stopped on its iteration budget"
            );
            metadata = metadata.flagged(
                DataFlag::Unconverged,
                format!(
                    "chained equations did not converge in {} sweeps (last change {last_change:.4})",
                    settings.max_iterations
                ),
            );
        }

        let (pooled, between_pass_variance) = pool(&problem, &outcomes);
        let rows = template
            .into_iter()
            .zip(pooled)
            .map(|((mut row, _, treated), completed)| {
                for (j, (variable, mut value)) in schema.continuous().zip(completed).enumerate() {
                    if treated && effect_column == Some(j) {
                        value += config.target_effect;
                    }
                    row.values.insert(
                        variable.name.clone(),
                        Some(Value::Num(variable.clip_and_round(value))),
                    );
                }
                row
            })
            .collect();

        metadata.imputation = Some(ImputationDiagnostics {
            estimator: config.estimator_choice,
            passes: settings.passes,
            iterations: outcomes.iter().map(|outcome| outcome.iterations).collect(),
            converged,
            imputed_cells,
            between_pass_variance: columns.into_iter().zip(between_pass_variance).collect(),
        });
        Ok(reference.with_rows(rows)?.with_metadata(metadata))
    }
}

/// Inverse-residual-variance weighted average of the passes per imputed
/// cell, and the mean between-pass variance per column.
fn pool(problem: &ImputationProblem, outcomes: &[PassOutcome]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let Some(first) = outcomes.first() else {
        return (Vec::new(), Vec::new());
    };
    let mut pooled = first.completed.clone();
    let mut between = vec![0.0; problem.width()];
    for (column, between) in between.iter_mut().enumerate() {
        let weights: Vec<f64> = outcomes
            .iter()
            .map(|outcome| 1.0 / outcome.residual_variance[column].max(MIN_RESIDUAL_VARIANCE))
            .collect();
        let total: f64 = weights.iter().sum();
        let rows = problem.missing_rows(column);
        let mut spread = 0.0;
        for &row in &rows {
            let estimates: Vec<f64> = outcomes
                .iter()
                .map(|outcome| outcome.completed[row][column])
                .collect();
            pooled[row][column] = estimates
                .iter()
                .zip(&weights)
                .map(|(estimate, weight)| estimate * weight)
                .sum::<f64>()
                / total;
            spread += linalg::variance(&estimates);
        }
        if !rows.is_empty() {
            *between = spread / rows.len() as f64;
        }
    }
    (pooled, between)
}
