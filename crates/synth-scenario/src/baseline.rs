//! Baseline (first-visit) measurement model of a simulated subject.

use synth_common::linalg::{self, Matrix};
use synth_common::rng::{choose_weighted, standard_normal};
use synth_common::SynthRng;
use synth_model::{Dataset, Schema};
use tracing::debug;

/// Multivariate normal over the continuous variables plus empirical level
/// frequencies for the categorical ones.
#[derive(Debug, Clone)]
pub struct BaselineModel {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub sd: Vec<f64>,
    lower: Matrix,
    categorical: Vec<CategoricalMarginal>,
}

#[derive(Debug, Clone)]
struct CategoricalMarginal {
    name: String,
    levels: Vec<String>,
    weights: Vec<f64>,
}

/// Fitted model plus the reason it fell back to schema priors, if it did.
#[derive(Debug, Clone)]
pub struct BaselineFit {
    pub model: BaselineModel,
    pub fallback: Option<String>,
}

impl BaselineModel {
    pub fn fit(schema: &Schema, reference: Option<&Dataset>) -> BaselineFit {
        let columns = schema.continuous_names();
        let dim = columns.len();
        let categorical = schema
            .categorical()
            .map(|variable| {
                let levels = variable.levels().to_vec();
                let weights = levels
                    .iter()
                    .map(|level| match reference {
                        Some(reference) => reference
                            .categorical_column(&variable.name)
                            .iter()
                            .filter(|value| **value == level.as_str())
                            .count() as f64,
                        None => 1.0,
                    })
                    .collect();
                CategoricalMarginal {
                    name: variable.name.clone(),
                    levels,
                    weights,
                }
            })
            .collect();

        let mut fallback = None;
        let moments = match reference {
            Some(reference) => {
                let vectors = baseline_vectors(reference, &columns);
                if vectors.len() >= dim + 2 {
                    Some(linalg::mean_and_covariance(&vectors, dim))
                } else {
                    fallback = Some(format!(
                        "reference has {} complete baseline rows, {} needed; baseline drawn from schema priors",
                        vectors.len(),
                        dim + 2
                    ));
                    None
                }
            }
            None => None,
        };
        let (mean, covariance) = moments.unwrap_or_else(|| {
            let priors: Vec<_> = schema
                .continuous()
                .map(|variable| variable.prior_or_default())
                .collect();
            let mean = priors.iter().map(|prior| prior.mean).collect();
            let variances: Vec<f64> = priors.iter().map(|prior| prior.sd * prior.sd).collect();
            (mean, linalg::diagonal(&variances))
        });
        let sd: Vec<f64> = (0..dim).map(|i| covariance[i][i].max(0.0).sqrt()).collect();
        let lower = match linalg::regularized_cholesky(&covariance) {
            Some((lower, ridge)) => {
                if ridge > 0.0 {
                    debug!(ridge, "baseline covariance regularised");
                }
                lower
            }
            None => linalg::diagonal(&sd),
        };
        BaselineFit {
            model: Self {
                columns,
                mean,
                sd,
                lower,
                categorical,
            },
            fallback,
        }
    }

    pub fn draw(&self, rng: &mut SynthRng) -> Vec<f64> {
        let z: Vec<f64> = (0..self.columns.len())
            .map(|_| standard_normal(rng))
            .collect();
        linalg::lower_mul(&self.lower, &z)
            .into_iter()
            .zip(&self.mean)
            .map(|(offset, mean)| mean + offset)
            .collect()
    }

    /// One level per categorical variable; subject-level traits do not change
    /// between visits.
    pub fn draw_categorical(&self, rng: &mut SynthRng) -> Vec<(String, String)> {
        self.categorical
            .iter()
            .map(|marginal| {
                let index = choose_weighted(rng, &marginal.weights);
                (marginal.name.clone(), marginal.levels[index].clone())
            })
            .collect()
    }
}

/// Complete continuous vectors at the first visit, or at any visit when the
/// first has too few.
fn baseline_vectors(reference: &Dataset, columns: &[String]) -> Vec<Vec<f64>> {
    let complete = |visit: Option<&str>| -> Vec<Vec<f64>> {
        reference
            .rows()
            .iter()
            .filter(|row| visit.is_none_or(|visit| row.visit == visit))
            .filter_map(|row| {
                columns
                    .iter()
                    .map(|column| row.num(column))
                    .collect::<Option<Vec<f64>>>()
            })
            .collect()
    };
    let visits = reference.visits();
    let first = complete(visits.first().map(String::as_str));
    if first.len() >= columns.len() + 2 {
        first
    } else {
        complete(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_common::{Stream, stream_rng};

    #[test]
    fn priors_drive_the_model_without_reference() {
        let schema = Schema::vital_signs();
        let fit = BaselineModel::fit(&schema, None);
        assert!(fit.fallback.is_none());
        assert_eq!(fit.model.columns, schema.continuous_names());
        assert_eq!(fit.model.mean[0], 128.0);
        assert!((fit.model.sd[0] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn draws_are_centered_on_the_mean() {
        let fit = BaselineModel::fit(&Schema::vital_signs(), None);
        let mut rng = stream_rng(4, Stream::Trajectory);
        let draws: Vec<f64> = (0..4000).map(|_| fit.model.draw(&mut rng)[0]).collect();
        assert!((linalg::mean(&draws) - 128.0).abs() < 1.5);
    }
}
