//! Multivariate-normal sampling from fitted or supplied moments.

use std::collections::BTreeSet;

use synth_common::linalg::{self, Matrix};
use synth_common::rng::standard_normal;
use synth_common::{Stream, SynthRng, stream_rng, subject_label};
use synth_model::{
    DataFlag, Dataset, DatasetMetadata, GenerationConfig, GenerationMethod, Result, Row,
    SamplingMode, Schema, SynthError,
};
use tracing::{debug, warn};

use crate::cache::StatisticsCache;
use crate::common::{SitePool, arm_plans, resolve_schema, sample_level};
use crate::stats::{FitSource, ReferenceStatistics};

/// Externally supplied mean vector and covariance over named variables.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionParameters {
    variables: Vec<String>,
    mean: Vec<f64>,
    covariance: Matrix,
}

impl DistributionParameters {
    pub fn new(variables: Vec<String>, mean: Vec<f64>, covariance: Matrix) -> Result<Self> {
        let dim = variables.len();
        if dim == 0 || mean.len() != dim || covariance.len() != dim {
            return Err(SynthError::invalid_config(
                "distribution parameters need one mean and one covariance row per variable",
            ));
        }
        if covariance.iter().any(|row| row.len() != dim) {
            return Err(SynthError::invalid_config("covariance matrix must be square"));
        }
        if mean.iter().chain(covariance.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(SynthError::invalid_config(
                "distribution parameters must be finite",
            ));
        }
        for i in 0..dim {
            if covariance[i][i] < 0.0 {
                return Err(SynthError::invalid_config(format!(
                    "variance of {} is negative",
                    variables[i]
                )));
            }
            for j in 0..i {
                let tolerance = 1e-9 * (covariance[i][j].abs() + covariance[j][i].abs()).max(1.0);
                if (covariance[i][j] - covariance[j][i]).abs() > tolerance {
                    return Err(SynthError::invalid_config("covariance matrix must be symmetric"));
                }
            }
        }
        Ok(Self {
            variables,
            mean,
            covariance,
        })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn covariance(&self) -> &Matrix {
        &self.covariance
    }
}

/// Fitted sampler for one (arm, visit) stratum.
#[derive(Debug, Clone)]
struct StratumFit {
    mean: Vec<f64>,
    lower: Matrix,
}

#[derive(Debug, Clone, Default)]
pub struct DistributionGenerator {
    parameters: Option<DistributionParameters>,
}

impl DistributionGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample from `parameters` instead of fitting a reference.
    pub fn with_parameters(parameters: DistributionParameters) -> Self {
        Self {
            parameters: Some(parameters),
        }
    }

    pub fn parameters(&self) -> Option<&DistributionParameters> {
        self.parameters.as_ref()
    }

    pub fn generate(
        &self,
        reference: Option<&Dataset>,
        config: &GenerationConfig,
    ) -> Result<Dataset> {
        let schema = resolve_schema(reference, config);
        if let Some(parameters) = &self.parameters {
            for name in parameters.variables() {
                match schema.variable(name) {
                    Some(variable) if variable.is_continuous() => {}
                    Some(_) => {
                        return Err(SynthError::invalid_config(format!(
                            "{name} is not a continuous variable"
                        )));
                    }
                    None => return Err(SynthError::UnknownVariable(name.clone())),
                }
            }
        }
        let columns = schema.continuous_names();
        let effect_column = config
            .resolve_effect_variable(&schema)?
            .and_then(|name| columns.iter().position(|column| *column == name));
        let stats = match (reference, &self.parameters) {
            (Some(reference), None) => Some(StatisticsCache::global().get_or_compute(reference)?),
            _ => None,
        };
        let visits = config.visit_schedule(reference);
        let sites = SitePool::new(reference, config.n_sites);
        let mut rng = stream_rng(config.seed, Stream::Distribution);
        let mut degraded = BTreeSet::new();

        let mut rows = Vec::with_capacity(2 * config.n_per_arm * visits.len());
        for arm in arm_plans(config, reference) {
            let subject_sites: Vec<String> = (0..config.n_per_arm)
                .map(|i| sites.draw(arm.first_ordinal + i, &mut rng))
                .collect();
            let source = arm.source.as_deref().unwrap_or_default();
            for visit in &visits {
                let fit = self.fit_stratum(
                    &schema,
                    &columns,
                    stats.as_deref(),
                    source,
                    visit,
                    &mut degraded,
                );
                let block = draw_block(&mut rng, config.n_per_arm, columns.len(), config.sampling);
                for (i, z) in block.iter().enumerate() {
                    let drawn = linalg::lower_mul(&fit.lower, z);
                    let mut row = Row::new(
                        subject_label(arm.first_ordinal + i),
                        &subject_sites[i],
                        &arm.label,
                        visit,
                    );
                    for (j, name) in columns.iter().enumerate() {
                        let mut value = fit.mean[j] + drawn[j];
                        if arm.treated && effect_column == Some(j) {
                            value += config.target_effect;
                        }
                        if let Some(variable) = schema.variable(name) {
                            value = variable.clip_and_round(value);
                        }
                        row = row.with_num(name, value);
                    }
                    for variable in schema.categorical() {
                        let counts = stats
                            .as_deref()
                            .and_then(|stats| stats.level_counts(source, visit, &variable.name));
                        let level = sample_level(variable, counts, &mut rng);
                        row = row.with_cat(&variable.name, level);
                    }
                    rows.push(row);
                }
            }
        }

        let mut metadata = DatasetMetadata::generated(GenerationMethod::Distribution, config.seed);
        for reason in degraded {
            warn!(reason = %reason, "distribution generator degraded");
            metadata = metadata.flagged(DataFlag::Degraded, reason);
        }
        Ok(Dataset::new(schema, rows)?.with_metadata(metadata))
    }

    fn fit_stratum(
        &self,
        schema: &Schema,
        columns: &[String],
        stats: Option<&ReferenceStatistics>,
        arm: &str,
        visit: &str,
        degraded: &mut BTreeSet<String>,
    ) -> StratumFit {
        let priors: Vec<_> = schema
            .continuous()
            .map(|variable| variable.prior_or_default())
            .collect();
        let prior_mean: Vec<f64> = priors.iter().map(|prior| prior.mean).collect();
        let prior_covariance =
            linalg::diagonal(&priors.iter().map(|prior| prior.sd * prior.sd).collect::<Vec<_>>());

        let (mean, covariance) = if let Some(parameters) = &self.parameters {
            let mut mean = prior_mean;
            let mut covariance = prior_covariance;
            let positions: Vec<Option<usize>> = columns
                .iter()
                .map(|column| parameters.variables().iter().position(|v| v == column))
                .collect();
            for (i, source_i) in positions.iter().enumerate() {
                let Some(source_i) = source_i else { continue };
                mean[i] = parameters.mean()[*source_i];
                for (j, source_j) in positions.iter().enumerate() {
                    if let Some(source_j) = source_j {
                        covariance[i][j] = parameters.covariance()[*source_i][*source_j];
                    }
                }
            }
            (mean, covariance)
        } else if let Some((moments, source)) =
            stats.and_then(|stats| stats.moments_for(arm, visit))
        {
            if source != FitSource::Stratum {
                debug!(arm, visit, ?source, "stratum pooled for fitting");
            }
            (moments.mean.clone(), moments.covariance.clone())
        } else {
            degraded.insert(match stats {
                Some(stats) => SynthError::InsufficientReferenceData(format!(
                    "{} complete reference rows for {} variables; sampled from schema priors",
                    stats.complete_rows,
                    columns.len()
                ))
                .to_string(),
                None => "no reference dataset; sampled from schema priors".to_string(),
            });
            (prior_mean, prior_covariance)
        };

        let lower = match linalg::regularized_cholesky(&covariance) {
            Some((lower, ridge)) => {
                if ridge > 0.0 {
                    debug!(arm, visit, ridge, "covariance regularised");
                }
                lower
            }
            None => {
                degraded.insert("covariance not positive definite; diagonal used".to_string());
                let sd: Vec<f64> = (0..covariance.len())
                    .map(|i| covariance[i][i].max(0.0).sqrt())
                    .collect();
                linalg::diagonal(&sd)
            }
        };
        StratumFit { mean, lower }
    }
}

/// `n` standard-normal vectors of length `dim`.
///
/// Moment-matched blocks are whitened so their sample mean is exactly zero
/// and their n-1 sample covariance exactly the identity.
fn draw_block(rng: &mut SynthRng, n: usize, dim: usize, mode: SamplingMode) -> Vec<Vec<f64>> {
    let block: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..dim).map(|_| standard_normal(rng)).collect())
        .collect();
    if mode == SamplingMode::Independent || dim == 0 || n <= dim + 1 {
        return block;
    }
    let (mean, covariance) = linalg::mean_and_covariance(&block, dim);
    let Some(factor) = linalg::cholesky(&covariance) else {
        return block;
    };
    block
        .iter()
        .map(|z| {
            let centered: Vec<f64> = z.iter().zip(&mean).map(|(v, m)| v - m).collect();
            linalg::forward_solve(&factor, &centered)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moment_matched_block_has_exact_moments() {
        let mut rng = stream_rng(1, Stream::Distribution);
        let block = draw_block(&mut rng, 30, 3, SamplingMode::MomentMatched);
        let (mean, covariance) = linalg::mean_and_covariance(&block, 3);
        for i in 0..3 {
            assert!(mean[i].abs() < 1e-10);
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((covariance[i][j] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn parameters_are_validated() {
        let names = vec!["SYSBP".to_string(), "DIABP".to_string()];
        assert!(DistributionParameters::new(names.clone(), vec![120.0], vec![]).is_err());
        let asymmetric = vec![vec![4.0, 1.0], vec![0.0, 4.0]];
        assert!(DistributionParameters::new(names.clone(), vec![120.0, 80.0], asymmetric).is_err());
        let valid = vec![vec![225.0, 60.0], vec![60.0, 100.0]];
        assert!(DistributionParameters::new(names, vec![120.0, 80.0], valid).is_ok());
    }

    #[test]
    fn without_reference_output_is_degraded() {
        let config = GenerationConfig::new(GenerationMethod::Distribution).with_n_per_arm(10);
        let dataset = DistributionGenerator::new()
            .generate(None, &config)
            .expect("prior sampling");
        assert!(dataset.metadata().has_flag(DataFlag::Degraded));
        assert_eq!(dataset.len(), 2 * 10 * 4);
    }

    #[test]
    fn supplied_parameters_need_no_reference() {
        let parameters = DistributionParameters::new(
            vec!["SYSBP".to_string()],
            vec![150.0],
            vec![vec![100.0]],
        )
        .expect("parameters");
        let config = GenerationConfig::new(GenerationMethod::Distribution)
            .with_n_per_arm(40)
            .with_visits(["Baseline"]);
        let dataset = DistributionGenerator::with_parameters(parameters)
            .generate(None, &config)
            .expect("parametric sampling");
        assert!(!dataset.is_degraded());
        let placebo: Vec<f64> = dataset
            .rows()
            .iter()
            .filter(|row| row.arm == "Placebo")
            .filter_map(|row| row.num("SYSBP"))
            .collect();
        assert!((linalg::mean(&placebo) - 150.0).abs() < 0.5);
    }

    #[test]
    fn unknown_parameter_variable_is_rejected() {
        let parameters =
            DistributionParameters::new(vec!["LDL".to_string()], vec![3.0], vec![vec![1.0]])
                .expect("parameters");
        let config = GenerationConfig::new(GenerationMethod::Distribution);
        let result = DistributionGenerator::with_parameters(parameters).generate(None, &config);
        assert!(matches!(result, Err(SynthError::UnknownVariable(name)) if name == "LDL"));
    }
}
