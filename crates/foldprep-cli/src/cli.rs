use clap::{Args, Parser, Subcommand, ValueEnum};
use foldprep::engine::config::{MsaMethod, PairMode};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "foldprep - prepare protein-sequence inputs for structure prediction: MSA retrieval, cross-chain pairing, filtering, and feature-tensor assembly.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prepare the model inputs for one job: retrieve alignments, pair and
    /// filter them, and assemble the feature tensors.
    Prepare(PrepareArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum MsaMethodArg {
    SingleSequence,
    Mmseqs2,
    Jackhmmer,
    Precomputed,
}

impl From<MsaMethodArg> for MsaMethod {
    fn from(arg: MsaMethodArg) -> Self {
        match arg {
            MsaMethodArg::SingleSequence => MsaMethod::SingleSequence,
            MsaMethodArg::Mmseqs2 => MsaMethod::Mmseqs2,
            MsaMethodArg::Jackhmmer => MsaMethod::Jackhmmer,
            MsaMethodArg::Precomputed => MsaMethod::Precomputed,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum PairModeArg {
    Unpaired,
    UnpairedPaired,
    Paired,
}

impl From<PairModeArg> for PairMode {
    fn from(arg: PairModeArg) -> Self {
        match arg {
            PairModeArg::Unpaired => PairMode::Unpaired,
            PairModeArg::UnpairedPaired => PairMode::UnpairedPaired,
            PairModeArg::Paired => PairMode::Paired,
        }
    }
}

/// Arguments for the `prepare` subcommand.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    // --- Core Arguments ---
    /// Query sequence. Use `:` between chains and `/` for a residue-numbering
    /// break inside a chain.
    #[arg(short, long, required = true, value_name = "SEQUENCE")]
    pub sequence: String,

    /// Copies of each chain, colon-separated (e.g. '2:1'); a single value
    /// applies to every chain.
    #[arg(long, default_value = "1", value_name = "COUNTS")]
    pub oligomer: String,

    /// Job name; the output directory is derived from it and the sequence.
    #[arg(short = 'n', long, default_value = "job", value_name = "NAME")]
    pub job_name: String,

    /// Directory the per-job output directory is created under.
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    pub output_dir: PathBuf,

    /// Pipeline configuration file in TOML format; flags below override it.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- MSA Overrides ---
    /// Override the MSA-retrieval method.
    #[arg(short, long, value_enum, value_name = "METHOD")]
    pub msa_method: Option<MsaMethodArg>,

    /// Override how per-chain alignments are combined for complexes.
    #[arg(short, long, value_enum, value_name = "MODE")]
    pub pair_mode: Option<PairModeArg>,

    /// Alignment snapshot consumed by the precomputed method.
    #[arg(long, value_name = "PATH")]
    pub precomputed: Option<PathBuf>,

    /// Extra A3M alignment appended after retrieval.
    #[arg(long, value_name = "PATH")]
    pub custom_msa: Option<PathBuf>,

    /// Directory for cached per-chain alignments.
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    // --- Filtering Overrides ---
    /// Residue ranges to keep, comma-separated (e.g. '5-100,B10-B50').
    #[arg(long, value_name = "RANGES")]
    pub trim: Option<String>,

    /// Remove the listed ranges instead of keeping them.
    #[arg(long, requires = "trim")]
    pub trim_inverse: bool,

    /// Drop alignment rows below this fractional query coverage.
    #[arg(long = "cov", value_name = "FRACTION")]
    pub min_coverage: Option<f64>,

    /// Drop alignment rows below this fractional query identity.
    #[arg(long = "qid", value_name = "FRACTION")]
    pub min_identity: Option<f64>,

    // --- Feature Overrides ---
    /// Include the all-zero template placeholders the full model expects.
    #[arg(long)]
    pub templates: bool,

    /// Seed for deterministic alignment subsampling.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Remove files left by a previous run of the same job first.
    #[arg(long)]
    pub clean: bool,
}
