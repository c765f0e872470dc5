use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, info_span, warn};

use synth_cli::settings::RunSettings;
use synth_cli::summary::{
    dataset_table, methods_table, privacy_table, quality_table, ranking_table,
    recommendation_lines, validity_lines,
};
use synth_generate::generate;
use synth_ingest::{ReadOptions, load_schema, read_reference, write_dataset, write_json};
use synth_model::{
    Dataset, GenerationMethod, MethodResult, PerformanceMetrics, PrivacyReport, QualityReport,
};
use synth_privacy::PrivacyAssessor;
use synth_quality::QualityComparator;
use synth_report::{Benchmark, BenchmarkCase};

use crate::cli::{BenchmarkArgs, CompareArgs, GenerateArgs, ReferenceArgs, overrides};

/// Quality and privacy scores of one candidate.
#[derive(Serialize)]
struct Scores<'a> {
    quality: &'a QualityReport,
    privacy: &'a PrivacyReport,
}

pub fn run_methods() -> Result<()> {
    println!("{}", methods_table());
    Ok(())
}

fn read_options(input: &ReferenceArgs) -> Result<ReadOptions> {
    let mut options = ReadOptions::default();
    if let Some(path) = &input.schema {
        let schema =
            load_schema(path).with_context(|| format!("load schema: {}", path.display()))?;
        options = options.with_schema(schema);
    }
    Ok(options)
}

fn load_reference(path: &Path, options: &ReadOptions) -> Result<Dataset> {
    read_reference(path, options).with_context(|| format!("read reference: {}", path.display()))
}

fn score(
    settings: &RunSettings,
    reference: &Dataset,
    candidate: &Dataset,
) -> Result<(QualityReport, PrivacyReport)> {
    let quality = QualityComparator::new(settings.quality)
        .compare(reference, candidate)
        .context("quality comparison")?;
    let privacy = PrivacyAssessor::new(settings.privacy.clone())
        .assess(reference, candidate)
        .context("privacy assessment")?;
    Ok((quality, privacy))
}

fn print_scores(quality: &QualityReport, privacy: &PrivacyReport) {
    println!("{}", quality_table(quality));
    println!("{}", privacy_table(privacy));
    for line in validity_lines("quality", &quality.validity)
        .into_iter()
        .chain(validity_lines("privacy", &privacy.validity))
    {
        eprintln!("warning: {line}");
    }
}

/// Returns `true` when the scored candidate is unsafe for release.
pub fn run_generate(args: &GenerateArgs) -> Result<bool> {
    let settings = RunSettings::load_or_default(args.input.config.as_deref())?
        .with_overrides(&overrides(args.method, &args.generation, &args.scoring));
    settings.validate()?;
    let config = &settings.generation;
    let span = info_span!("generate_command", method = %config.method);
    let _guard = span.enter();

    let options = read_options(&args.input)?;
    let reference = args
        .reference
        .as_deref()
        .map(|path| load_reference(path, &options))
        .transpose()?;
    if reference.is_none() && config.method.requires_reference() {
        bail!("{} generation needs --reference", config.method);
    }
    let config = match (&reference, &options.schema) {
        (None, Some(schema)) if config.schema.is_none() => {
            config.clone().with_schema(schema.clone())
        }
        _ => config.clone(),
    };

    let started = Instant::now();
    let dataset = generate(reference.as_ref(), &config).context("generation")?;
    let elapsed = started.elapsed();
    info!(
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        rows = dataset.len(),
        "dataset generated"
    );
    println!("{}", dataset_table(&dataset));

    if let Some(path) = &args.output {
        write_dataset(&dataset, path)
            .with_context(|| format!("write dataset: {}", path.display()))?;
        println!("Dataset: {}", path.display());
    }

    let Some(reference) = reference.filter(|_| !args.no_score) else {
        return Ok(false);
    };
    let (quality, privacy) = score(&settings, &reference, &dataset)?;
    print_scores(&quality, &privacy);
    let unsafe_release = !privacy.safe_for_release;
    if let Some(path) = &args.report {
        let result = MethodResult {
            quality,
            privacy,
            performance: PerformanceMetrics {
                elapsed_ms: elapsed.as_secs_f64() * 1000.0,
                rows: dataset.len(),
            },
        };
        write_json(&result, path).with_context(|| format!("write report: {}", path.display()))?;
        println!("Report: {}", path.display());
    }
    Ok(unsafe_release)
}

/// Returns `true` when the candidate is unsafe for release.
pub fn run_compare(args: &CompareArgs) -> Result<bool> {
    let settings = RunSettings::load_or_default(args.input.config.as_deref())?
        .with_overrides(&overrides(None, &Default::default(), &args.scoring));
    settings.validate()?;

    let options = read_options(&args.input)?;
    let reference = load_reference(&args.reference, &options)?;
    let candidate_options = ReadOptions {
        schema: Some(reference.schema().clone()),
        ..options
    };
    let candidate = read_reference(&args.candidate, &candidate_options)
        .with_context(|| format!("read candidate: {}", args.candidate.display()))?;

    let (quality, privacy) = score(&settings, &reference, &candidate)?;
    print_scores(&quality, &privacy);
    if let Some(path) = &args.output {
        write_json(
            &Scores {
                quality: &quality,
                privacy: &privacy,
            },
            path,
        )
        .with_context(|| format!("write scores: {}", path.display()))?;
        println!("Scores: {}", path.display());
    }
    Ok(!privacy.safe_for_release)
}

pub fn run_benchmark(args: &BenchmarkArgs) -> Result<()> {
    let settings = RunSettings::load_or_default(args.input.config.as_deref())?
        .with_overrides(&overrides(None, &args.generation, &args.scoring));
    settings.validate()?;
    if args.methods.is_empty() {
        bail!("no methods to benchmark");
    }

    let reference = load_reference(&args.reference, &read_options(&args.input)?)?;
    let mut methods: Vec<GenerationMethod> = Vec::new();
    for method in args.methods.iter().copied().map(GenerationMethod::from) {
        if methods.contains(&method) {
            warn!(%method, "method listed twice; benchmarked once");
        } else {
            methods.push(method);
        }
    }
    let cases: Vec<BenchmarkCase> = methods
        .into_iter()
        .map(|method| {
            let mut config = settings.generation.clone();
            config.method = method;
            BenchmarkCase::for_config(config)
        })
        .collect();

    let progress = ProgressBar::new(cases.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    progress.set_message("benchmarking");
    let comparison = Benchmark::new(settings.quality, settings.privacy.clone())
        .run_with_progress(&reference, &cases, |name| {
            progress.set_message(name.to_string());
            progress.inc(1);
        })
        .context("benchmark");
    progress.finish_and_clear();
    let comparison = comparison?;

    println!("{}", ranking_table(&comparison));
    for line in recommendation_lines(&comparison.recommendations) {
        println!("{line}");
    }
    println!();
    for ranked in &comparison.ranking {
        if let Some(rationale) = comparison.rationale.get(&ranked.name) {
            println!("{}: {rationale}", ranked.name);
        }
    }
    if let Some(path) = &args.output {
        write_json(&comparison, path)
            .with_context(|| format!("write comparison: {}", path.display()))?;
        println!("Comparison: {}", path.display());
    }
    Ok(())
}
