//! Parallel evaluation of several generation configurations.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rayon::prelude::*;
use synth_generate::generate;
use synth_model::{
    CompositeWeights, Dataset, GenerationConfig, MethodComparison, MethodResult,
    PerformanceMetrics, Result, SynthError,
};
use synth_privacy::{PrivacyAssessor, PrivacyConfig};
use synth_quality::{QualityComparator, QualityConfig};
use tracing::{debug, info, info_span};

use crate::ranking::rank_methods;

/// One named configuration to benchmark.
#[derive(Debug, Clone)]
pub struct BenchmarkCase {
    pub name: String,
    pub config: GenerationConfig,
}

impl BenchmarkCase {
    pub fn new(name: impl Into<String>, config: GenerationConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// A case named after its generation method.
    pub fn for_config(config: GenerationConfig) -> Self {
        Self::new(config.method.as_str(), config)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Benchmark {
    quality: QualityConfig,
    privacy: PrivacyConfig,
}

impl Benchmark {
    pub fn new(quality: QualityConfig, privacy: PrivacyConfig) -> Self {
        Self { quality, privacy }
    }

    /// Weights used both for each quality composite and for the ranking.
    pub fn with_weights(mut self, weights: CompositeWeights) -> Self {
        self.quality = self.quality.with_weights(weights);
        self
    }

    /// Generate, score and rank every case against `reference`.
    pub fn run(&self, reference: &Dataset, cases: &[BenchmarkCase]) -> Result<MethodComparison> {
        self.run_with_progress(reference, cases, |_| {})
    }

    /// As [`Benchmark::run`], calling `progress` with each case's name once
    /// it has been scored. Calls arrive from worker threads in any order.
    pub fn run_with_progress<F>(
        &self,
        reference: &Dataset,
        cases: &[BenchmarkCase],
        progress: F,
    ) -> Result<MethodComparison>
    where
        F: Fn(&str) + Sync,
    {
        let mut seen = BTreeSet::new();
        for case in cases {
            if !seen.insert(case.name.as_str()) {
                return Err(SynthError::invalid_config(format!(
                    "duplicate benchmark case name: {}",
                    case.name
                )));
            }
        }
        if cases.is_empty() {
            return Err(SynthError::invalid_config("no benchmark cases given"));
        }
        self.quality.validate()?;
        self.privacy.validate()?;

        let span = info_span!("benchmark", cases = cases.len(), reference_rows = reference.len());
        let _guard = span.enter();
        let comparator = QualityComparator::new(self.quality);
        let assessor = PrivacyAssessor::new(self.privacy.clone());

        let results = cases
            .par_iter()
            .map(|case| {
                let started = Instant::now();
                let candidate = generate(Some(reference), &case.config)?;
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                let quality = comparator.compare(reference, &candidate)?;
                let privacy = assessor.assess(reference, &candidate)?;
                debug!(case = %case.name, elapsed_ms, rows = candidate.len(), "case scored");
                progress(&case.name);
                Ok((
                    case.name.clone(),
                    MethodResult {
                        quality,
                        privacy,
                        performance: PerformanceMetrics {
                            elapsed_ms,
                            rows: candidate.len(),
                        },
                    },
                ))
            })
            .collect::<Result<BTreeMap<String, MethodResult>>>()?;

        let comparison = rank_methods(results, self.quality.weights)?;
        info!(
            best = comparison.best().map(|ranked| ranked.name.as_str()),
            "benchmark complete"
        );
        Ok(comparison)
    }
}

/// Benchmark `cases`, ranking with the weights in `quality`.
pub fn benchmark(
    reference: &Dataset,
    cases: &[BenchmarkCase],
    quality: &QualityConfig,
    privacy: &PrivacyConfig,
) -> Result<MethodComparison> {
    Benchmark::new(*quality, privacy.clone()).run(reference, cases)
}
