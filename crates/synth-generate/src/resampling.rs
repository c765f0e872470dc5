//! Stratified bootstrap of reference rows with optional Gaussian jitter.

use std::collections::BTreeMap;

use rand::Rng;
use synth_common::rng::normal;
use synth_common::{Stream, stream_rng, subject_label};
use synth_model::{
    Dataset, DatasetMetadata, GenerationConfig, GenerationMethod, Result, Row, SynthError, Value,
};
use tracing::debug;

use crate::cache::StatisticsCache;
use crate::common::arm_plans;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResamplingGenerator;

impl ResamplingGenerator {
    /// Draw one reference row per synthetic subject and visit, with
    /// replacement, from the matching (arm, visit) stratum.
    ///
    /// A missing stratum falls back to the visit pooled over arms and then to
    /// the whole reference. Continuous values get N(0, `jitter_frac` x sd)
    /// noise; missing cells stay missing.
    pub fn generate(&self, reference: &Dataset, config: &GenerationConfig) -> Result<Dataset> {
        if reference.is_empty() {
            return Err(SynthError::invalid_config(
                "resampling requires a non-empty reference dataset",
            ));
        }
        let stats = StatisticsCache::global().get_or_compute(reference)?;
        let schema = reference.schema();
        let rows = reference.rows();
        let visits = config.visit_schedule(Some(reference));

        let mut by_stratum: BTreeMap<(&str, &str), Vec<usize>> = BTreeMap::new();
        let mut by_visit: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, row) in rows.iter().enumerate() {
            by_stratum
                .entry((row.arm.as_str(), row.visit.as_str()))
                .or_default()
                .push(index);
            by_visit.entry(row.visit.as_str()).or_default().push(index);
        }
        let everything: Vec<usize> = (0..rows.len()).collect();

        let mut rng = stream_rng(config.seed, Stream::Resampling);
        let mut output = Vec::with_capacity(2 * config.n_per_arm * visits.len());
        for arm in arm_plans(config, Some(reference)) {
            let source = arm.source.as_deref().unwrap_or_default();
            let pools: Vec<&[usize]> = visits
                .iter()
                .map(|visit| {
                    by_stratum
                        .get(&(source, visit.as_str()))
                        .or_else(|| by_visit.get(visit.as_str()))
                        .map_or(everything.as_slice(), Vec::as_slice)
                })
                .collect();
            debug!(arm = %arm.label, source, "resampling arm");
            for i in 0..config.n_per_arm {
                let subject = subject_label(arm.first_ordinal + i);
                let mut site = None;
                for (visit, pool) in visits.iter().zip(&pools) {
                    let drawn = &rows[pool[rng.random_range(0..pool.len())]];
                    let site = site.get_or_insert_with(|| drawn.site_id.clone());
                    let mut row = Row::new(&subject, site.as_str(), &arm.label, visit);
                    for variable in &schema.variables {
                        let value = match drawn.value(&variable.name) {
                            None => None,
                            Some(Value::Num(value)) if config.jitter_frac > 0.0 => {
                                let sd = config.jitter_frac * stats.sd(&variable.name);
                                let jittered = normal(&mut rng, *value, sd);
                                Some(Value::Num(variable.clip_and_round(jittered)))
                            }
                            Some(value) => Some(value.clone()),
                        };
                        row.values.insert(variable.name.clone(), value);
                    }
                    output.push(row);
                }
            }
        }

        let metadata = DatasetMetadata::generated(GenerationMethod::Resampling, config.seed);
        Ok(reference.with_rows(output)?.with_metadata(metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_model::{Schema, VariableSpec};

    fn reference() -> Dataset {
        let schema = Schema::new(vec![
            VariableSpec::continuous("X", 0.0, 100.0, 1),
            VariableSpec::categorical("SEX", ["F", "M"]),
        ])
        .expect("schema");
        let rows = (0..20)
            .map(|i| {
                let row = Row::new(format!("R{i}"), "07", if i < 10 { "A" } else { "B" }, "V1")
                    .with_cat("SEX", if i % 2 == 0 { "F" } else { "M" });
                if i == 3 {
                    row.with_missing("X")
                } else {
                    row.with_num("X", 20.0 + f64::from(i))
                }
            })
            .collect();
        Dataset::new(schema, rows).expect("dataset")
    }

    #[test]
    fn strata_follow_reference_arms_by_position() {
        let config = GenerationConfig::new(GenerationMethod::Resampling)
            .with_n_per_arm(30)
            .with_jitter_frac(0.0);
        let dataset = ResamplingGenerator
            .generate(&reference(), &config)
            .expect("resampling");
        for row in dataset.rows() {
            if let Some(x) = row.num("X") {
                if row.arm == "Placebo" {
                    assert!(x < 30.0);
                } else {
                    assert!(x >= 30.0);
                }
            }
            assert_eq!(row.site_id, "07");
        }
        assert_eq!(dataset.len(), 60);
    }

    #[test]
    fn jitter_moves_values_but_keeps_them_in_range() {
        let config = GenerationConfig::new(GenerationMethod::Resampling)
            .with_n_per_arm(50)
            .with_jitter_frac(0.5);
        let reference = reference();
        let dataset = ResamplingGenerator
            .generate(&reference, &config)
            .expect("resampling");
        let observed = reference.numeric_column("X");
        let novel = dataset
            .numeric_column("X")
            .into_iter()
            .filter(|x| !observed.contains(x))
            .count();
        assert!(novel > 0);
        assert!(dataset.numeric_column("X").iter().all(|x| (0.0..=100.0).contains(x)));
    }
}
