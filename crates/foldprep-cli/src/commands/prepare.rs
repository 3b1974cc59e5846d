use crate::cli::PrepareArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use foldprep::core::models::job::JobSpec;
use foldprep::engine::backends::jackhmmer::JackhmmerBackend;
use foldprep::engine::backends::mmseqs::{MmseqsBackend, MmseqsClient};
use foldprep::engine::backends::single::SingleSequenceBackend;
use foldprep::engine::backends::AlignmentBackend;
use foldprep::engine::cache::MsaCache;
use foldprep::engine::config::{MsaMethod, PrepConfig, RowFilterConfig, TrimConfig};
use foldprep::engine::pairing::HhFilter;
use foldprep::engine::progress::ProgressReporter;
use foldprep::workflows::prepare;
use tracing::info;

pub fn run(args: PrepareArgs) -> Result<()> {
    let config = build_config(&args)?;
    let job = JobSpec::new(&args.sequence, &args.oligomer, &args.job_name, &args.output_dir)?;
    if args.clean {
        job.ensure_output_dir(true)?;
    }

    let handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(handler.get_callback());
    let backend = build_backend(&config)?;
    let redundancy = HhFilter::default();

    let prepared = prepare::run(job, &config, backend.as_ref(), Some(&redundancy), &reporter)?;

    info!(
        output = %prepared.job.output_dir.display(),
        rows = prepared.features.num_rows(),
        residues = prepared.features.num_residues(),
        "Inputs prepared"
    );
    println!(
        "Prepared {} residues x {} alignment rows -> {}",
        prepared.features.num_residues(),
        prepared.features.num_rows(),
        prepared.job.output_dir.display()
    );
    Ok(())
}

fn build_backend(config: &PrepConfig) -> Result<Box<dyn AlignmentBackend>> {
    let cache = MsaCache::new(&config.cache_dir)?;
    Ok(match config.msa_method {
        // The precomputed method never fetches; the workflow reads the
        // snapshot directly.
        MsaMethod::SingleSequence | MsaMethod::Precomputed => Box::new(SingleSequenceBackend),
        MsaMethod::Jackhmmer => Box::new(JackhmmerBackend::new(cache, config.network.clone())),
        MsaMethod::Mmseqs2 => Box::new(MmseqsBackend::new(
            MmseqsClient::public(true, config.network.clone()),
            cache,
        )),
    })
}

fn build_config(args: &PrepareArgs) -> Result<PrepConfig> {
    let mut config = match &args.config {
        Some(path) => PrepConfig::from_toml_file(path)?,
        None => PrepConfig::default(),
    };

    if let Some(method) = args.msa_method {
        config.msa_method = method.into();
    }
    if let Some(mode) = args.pair_mode {
        config.pair_mode = mode.into();
    }
    if let Some(path) = &args.precomputed {
        config.precomputed = Some(path.clone());
    }
    if let Some(path) = &args.custom_msa {
        config.custom_msa = Some(path.clone());
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(ranges) = &args.trim {
        config.trim = Some(TrimConfig {
            ranges: ranges.clone(),
            inverse: args.trim_inverse,
        });
    }
    if args.min_coverage.is_some() || args.min_identity.is_some() {
        config.row_filter = Some(RowFilterConfig {
            min_coverage: args.min_coverage.unwrap_or(0.0),
            min_identity: args.min_identity.unwrap_or(0.0),
        });
    }
    if args.templates {
        config.fast_mode = false;
    }
    if let Some(seed) = args.seed {
        config.subsample_seed = seed;
    }

    if config.msa_method == MsaMethod::Precomputed && config.precomputed.is_none() {
        return Err(CliError::Argument(
            "--msa-method precomputed requires --precomputed <PATH>".to_string(),
        ));
    }
    Ok(config)
}
