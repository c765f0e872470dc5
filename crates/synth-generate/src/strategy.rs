//! Method dispatch: one entry point over every generator.

use synth_model::{DataFlag, Dataset, GenerationConfig, GenerationMethod, Result, SynthError};
use synth_scenario::ScenarioGenerator;
use tracing::{info, info_span};

use crate::distribution::DistributionGenerator;
use crate::graphical::GraphicalGenerator;
use crate::imputation::ImputationGenerator;
use crate::resampling::ResamplingGenerator;

/// Closed set of generation strategies.
#[derive(Debug, Clone)]
pub enum Generator {
    Distribution(DistributionGenerator),
    Resampling(ResamplingGenerator),
    Graphical(GraphicalGenerator),
    Imputation(ImputationGenerator),
    Realistic(ScenarioGenerator),
}

impl Generator {
    pub fn for_method(method: GenerationMethod) -> Self {
        match method {
            GenerationMethod::Distribution => Generator::Distribution(DistributionGenerator::new()),
            GenerationMethod::Resampling => Generator::Resampling(ResamplingGenerator),
            GenerationMethod::Graphical => Generator::Graphical(GraphicalGenerator),
            GenerationMethod::Imputation => Generator::Imputation(ImputationGenerator),
            GenerationMethod::Realistic => Generator::Realistic(ScenarioGenerator),
        }
    }

    pub fn method(&self) -> GenerationMethod {
        match self {
            Generator::Distribution(_) => GenerationMethod::Distribution,
            Generator::Resampling(_) => GenerationMethod::Resampling,
            Generator::Graphical(_) => GenerationMethod::Graphical,
            Generator::Imputation(_) => GenerationMethod::Imputation,
            Generator::Realistic(_) => GenerationMethod::Realistic,
        }
    }

    /// Validate `config` and run this strategy.
    ///
    /// Identical `reference` and `config` always produce identical rows.
    pub fn generate(
        &self,
        reference: Option<&Dataset>,
        config: &GenerationConfig,
    ) -> Result<Dataset> {
        let method = self.method();
        let span = info_span!("generate", method = %method, seed = config.seed);
        let _guard = span.enter();

        config.validate(reference)?;
        let dataset = match self {
            Generator::Distribution(generator) => generator.generate(reference, config)?,
            Generator::Resampling(generator) => {
                generator.generate(required(reference, method)?, config)?
            }
            Generator::Graphical(generator) => {
                generator.generate(required(reference, method)?, config)?
            }
            Generator::Imputation(generator) => {
                generator.generate(required(reference, method)?, config)?
            }
            Generator::Realistic(generator) => generator.generate(reference, config)?,
        };

        let metadata = dataset.metadata();
        info!(
            rows = dataset.len(),
            subjects = dataset.subjects().len(),
            degraded = metadata.has_flag(DataFlag::Degraded),
            unconverged = metadata.has_flag(DataFlag::Unconverged),
            "generation complete"
        );
        Ok(dataset)
    }
}

fn required(reference: Option<&Dataset>, method: GenerationMethod) -> Result<&Dataset> {
    reference.filter(|reference| !reference.is_empty()).ok_or_else(|| {
        SynthError::invalid_config(format!(
            "{method} generation requires a non-empty reference dataset"
        ))
    })
}

/// Generate with the strategy named by `config.method`.
pub fn generate(reference: Option<&Dataset>, config: &GenerationConfig) -> Result<Dataset> {
    Generator::for_method(config.method).generate(reference, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_method_maps_back_to_itself() {
        for method in [
            GenerationMethod::Distribution,
            GenerationMethod::Resampling,
            GenerationMethod::Graphical,
            GenerationMethod::Imputation,
            GenerationMethod::Realistic,
        ] {
            assert_eq!(Generator::for_method(method).method(), method);
        }
    }

    #[test]
    fn reference_methods_refuse_to_run_without_one() {
        for method in [
            GenerationMethod::Resampling,
            GenerationMethod::Graphical,
            GenerationMethod::Imputation,
        ] {
            let config = GenerationConfig::new(method);
            assert!(matches!(
                generate(None, &config),
                Err(SynthError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn mismatched_generator_still_checks_its_own_requirement() {
        let config = GenerationConfig::new(GenerationMethod::Distribution);
        let result = Generator::for_method(GenerationMethod::Resampling).generate(None, &config);
        assert!(matches!(result, Err(SynthError::InvalidConfiguration(_))));
    }
}
