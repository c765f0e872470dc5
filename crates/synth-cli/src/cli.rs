//! CLI argument definitions for `trial-synth`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use synth_cli::settings::Overrides;
use synth_model::{EstimatorChoice, GenerationMethod};

#[derive(Parser)]
#[command(
    name = "trial-synth",
    version,
    about = "Generate and validate synthetic clinical-trial data",
    long_about = "Generate synthetic subject-visit data from a reference dataset or from priors,\n\
                  then score it for statistical fidelity and re-identification risk.\n\n\
                  Methods: distribution, resampling, graphical, imputation, realistic."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a synthetic dataset and score it against the reference.
    Generate(GenerateArgs),

    /// Score an existing candidate dataset against a reference.
    Compare(CompareArgs),

    /// Run several methods on one reference and rank them.
    Benchmark(BenchmarkArgs),

    /// List the available generation methods.
    Methods,
}

/// Reference input shared by every subcommand.
#[derive(Args)]
pub struct ReferenceArgs {
    /// JSON schema for the CSV inputs (inferred from the columns when omitted).
    #[arg(long = "schema", value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// JSON settings file with `generation`, `quality` and `privacy` sections.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Default)]
pub struct GenerationFlags {
    /// Subjects per treatment arm.
    #[arg(long = "n-per-arm", value_name = "N")]
    pub n_per_arm: Option<usize>,

    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Offset added to the effect variable in the treatment arm.
    #[arg(long = "target-effect", value_name = "DELTA", allow_negative_numbers = true)]
    pub target_effect: Option<f64>,

    #[arg(long = "dropout-rate", value_name = "RATE")]
    pub dropout_rate: Option<f64>,

    #[arg(long = "missing-rate", value_name = "RATE")]
    pub missing_rate: Option<f64>,

    #[arg(long = "sites", value_name = "N")]
    pub n_sites: Option<usize>,

    /// Per-column model for imputation.
    #[arg(long = "estimator", value_enum)]
    pub estimator: Option<EstimatorArg>,
}

#[derive(Args, Default)]
pub struct ScoringFlags {
    /// Significance level of the two-sample tests.
    #[arg(long = "alpha")]
    pub alpha: Option<f64>,

    /// Quasi-identifier columns (repeat or comma-separate).
    #[arg(long = "quasi-identifier", value_name = "COLUMN", value_delimiter = ',')]
    pub quasi_identifiers: Vec<String>,

    /// Column the attribute-inference attack tries to recover.
    #[arg(long = "sensitive", value_name = "COLUMN")]
    pub sensitive: Option<String>,
}

#[derive(Parser)]
pub struct GenerateArgs {
    /// Reference CSV; required by every method except distribution and realistic.
    #[arg(long = "reference", value_name = "CSV")]
    pub reference: Option<PathBuf>,

    #[arg(long = "method", value_enum)]
    pub method: Option<MethodArg>,

    /// Where to write the dataset (.json for JSON, CSV otherwise).
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Where to write the quality and privacy scores as JSON.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Skip scoring against the reference.
    #[arg(long = "no-score")]
    pub no_score: bool,

    #[command(flatten)]
    pub input: ReferenceArgs,

    #[command(flatten)]
    pub generation: GenerationFlags,

    #[command(flatten)]
    pub scoring: ScoringFlags,
}

#[derive(Parser)]
pub struct CompareArgs {
    #[arg(long = "reference", value_name = "CSV")]
    pub reference: PathBuf,

    /// Candidate CSV, read with the reference's schema.
    #[arg(long = "candidate", value_name = "CSV")]
    pub candidate: PathBuf,

    /// Where to write the scores as JSON.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub input: ReferenceArgs,

    #[command(flatten)]
    pub scoring: ScoringFlags,
}

#[derive(Parser)]
pub struct BenchmarkArgs {
    #[arg(long = "reference", value_name = "CSV")]
    pub reference: PathBuf,

    /// Methods to compare (comma-separated).
    #[arg(
        long = "methods",
        value_enum,
        value_delimiter = ',',
        default_value = "distribution,resampling,graphical,imputation"
    )]
    pub methods: Vec<MethodArg>,

    /// Where to write the full comparison as JSON.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub input: ReferenceArgs,

    #[command(flatten)]
    pub generation: GenerationFlags,

    #[command(flatten)]
    pub scoring: ScoringFlags,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Distribution,
    Resampling,
    Graphical,
    Imputation,
    Realistic,
}

impl From<MethodArg> for GenerationMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Distribution => GenerationMethod::Distribution,
            MethodArg::Resampling => GenerationMethod::Resampling,
            MethodArg::Graphical => GenerationMethod::Graphical,
            MethodArg::Imputation => GenerationMethod::Imputation,
            MethodArg::Realistic => GenerationMethod::Realistic,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EstimatorArg {
    Linear,
    Ensemble,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

/// Fold the generation and scoring flags into settings overrides.
pub fn overrides(
    method: Option<MethodArg>,
    generation: &GenerationFlags,
    scoring: &ScoringFlags,
) -> Overrides {
    Overrides {
        method: method.map(GenerationMethod::from),
        n_per_arm: generation.n_per_arm,
        seed: generation.seed,
        target_effect: generation.target_effect,
        dropout_rate: generation.dropout_rate,
        missing_rate: generation.missing_rate,
        n_sites: generation.n_sites,
        estimator: generation.estimator.map(|estimator| match estimator {
            EstimatorArg::Linear => EstimatorChoice::Linear,
            EstimatorArg::Ensemble => EstimatorChoice::Ensemble,
        }),
        alpha: scoring.alpha,
        quasi_identifiers: scoring.quasi_identifiers.clone(),
        sensitive_attribute: scoring.sensitive.clone(),
    }
}
