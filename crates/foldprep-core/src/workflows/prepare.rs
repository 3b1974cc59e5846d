//! End-to-end input preparation.

use crate::core::io::a3m::parse_a3m;
use crate::core::models::alignment::{AlignmentSet, AlignmentTrack, ChainLayout};
use crate::core::models::features::FeatureDict;
use crate::core::models::job::JobSpec;
use crate::engine::backends::AlignmentBackend;
use crate::engine::backends::precomputed::load_precomputed_tracks;
use crate::engine::cache::{MsaBundle, write_job_snapshot};
use crate::engine::config::{MsaMethod, PrepConfig};
use crate::engine::error::EngineError;
use crate::engine::features::{assemble_features, homooligomerize, plot_lengths};
use crate::engine::filter::{apply_row_filter, apply_trim};
use crate::engine::pairing::{PairedAlignment, RedundancyFilter, pair_all, reduce_redundancy};
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument, warn};

/// Everything the prediction stage needs, plus the job-level tracks for
/// inspection and the per-copy lengths for plotting chain boundaries.
#[derive(Debug, Clone)]
pub struct PreparedInputs {
    pub job: JobSpec,
    pub tracks: Vec<AlignmentTrack>,
    pub features: FeatureDict,
    pub plot_lengths: Vec<usize>,
}

/// Expand each chain's flattened alignment to job width: one padded track
/// per chain, hits gap-filled outside their own chain.
fn padded_chain_tracks(
    job: &JobSpec,
    sets: &[AlignmentSet],
    layout: &ChainLayout,
) -> Result<Vec<AlignmentTrack>, EngineError> {
    let mut padded = Vec::with_capacity(sets.len());
    for (k, set) in sets.iter().enumerate() {
        let flat = set.flattened();
        if flat.width() != job.lengths[k] {
            return Err(EngineError::InvalidInput(format!(
                "Alignment for chain {} is {} columns wide but the chain has {} residues",
                k + 1,
                flat.width(),
                job.lengths[k]
            )));
        }
        padded.push(AlignmentTrack {
            rows: flat.rows.iter().map(|r| layout.pad_row(&[(k, r)])).collect(),
            deletions: flat
                .deletions
                .iter()
                .map(|d| layout.pad_deletions(&[(k, d)]))
                .collect(),
            names: flat.names,
        });
    }
    Ok(padded)
}

/// Expand one stitched chain pair into a job-width track with the pair's
/// query row first.
fn padded_paired_track(
    job: &JobSpec,
    pair_chains: (usize, usize),
    paired: &PairedAlignment,
    layout: &ChainLayout,
) -> AlignmentTrack {
    let (a, b) = pair_chains;
    let n = paired.num_pairs();
    let mut rows = Vec::with_capacity(n + 1);
    let mut deletions = Vec::with_capacity(n + 1);
    let mut names = Vec::with_capacity(n + 1);

    rows.push(layout.pad_row(&[(a, &job.chains[a]), (b, &job.chains[b])]));
    deletions.push(vec![0; layout.width()]);
    names.push("query".to_string());

    for i in 0..n {
        rows.push(layout.pad_row(&[
            (a, paired.tracks[0].rows[i].as_str()),
            (b, paired.tracks[1].rows[i].as_str()),
        ]));
        deletions.push(layout.pad_deletions(&[
            (a, paired.tracks[0].deletions[i].as_slice()),
            (b, paired.tracks[1].deletions[i].as_slice()),
        ]));
        names.push(
            paired.tracks[0]
                .names
                .as_ref()
                .map_or_else(String::new, |ns| ns[i].clone()),
        );
    }
    AlignmentTrack {
        rows,
        deletions,
        names: Some(names),
    }
}

fn custom_msa_track(path: &std::path::Path, expected_width: usize) -> Result<AlignmentTrack, EngineError> {
    let parsed = parse_a3m(&std::fs::read_to_string(path)?)?;
    let track = AlignmentTrack::from(parsed);
    if track.width() != expected_width {
        return Err(EngineError::InvalidInput(format!(
            "Custom alignment '{}' is {} columns wide but the job sequence has {} residues",
            path.display(),
            track.width(),
            expected_width
        )));
    }
    Ok(track)
}

/// Assemble the job-level tracks for the configured method and pair mode.
fn retrieve_tracks(
    job: &JobSpec,
    config: &PrepConfig,
    backend: &dyn AlignmentBackend,
    redundancy: Option<&dyn RedundancyFilter>,
    reporter: &ProgressReporter,
) -> Result<Vec<AlignmentTrack>, EngineError> {
    if config.msa_method == MsaMethod::Precomputed {
        let path = config.precomputed.as_ref().ok_or_else(|| {
            EngineError::InvalidInput(
                "The precomputed method needs the path of an alignment snapshot".to_string(),
            )
        })?;
        return load_precomputed_tracks(path, job.sequence.len());
    }

    let sets = backend.fetch(&job.chains, reporter)?;
    let layout = ChainLayout::new(&job.lengths);

    let mut tracks = vec![AlignmentTrack::query_only(&job.sequence)];
    let mut paired_tracks = 0;
    if job.chains.len() > 1 && config.pair_mode.wants_paired() {
        let primary: Vec<AlignmentTrack> = sets.iter().map(|s| s.tracks[0].clone()).collect();
        for pair in pair_all(&job.chains, &primary, &config.pairing) {
            let alignment = match redundancy {
                Some(filter) => reduce_redundancy(pair.alignment, filter, &config.pairing)?,
                None => pair.alignment,
            };
            info!(
                chain_a = pair.chains.0,
                chain_b = pair.chains.1,
                pairs = alignment.num_pairs(),
                "Added paired alignment track"
            );
            tracks.push(padded_paired_track(job, pair.chains, &alignment, &layout));
            paired_tracks += 1;
        }
        if paired_tracks == 0 {
            warn!("Pairing produced no rows; continuing with unpaired alignments only");
        }
    }
    if config.pair_mode.wants_unpaired() || paired_tracks == 0 {
        tracks.extend(padded_chain_tracks(job, &sets, &layout)?);
    }
    if let Some(path) = &config.custom_msa {
        tracks.push(custom_msa_track(path, job.sequence.len())?);
    }
    Ok(tracks)
}

/// Run the whole preparation pipeline for one job.
#[instrument(skip_all, fields(job = %job.job_name))]
pub fn run(
    job: JobSpec,
    config: &PrepConfig,
    backend: &dyn AlignmentBackend,
    redundancy: Option<&dyn RedundancyFilter>,
    reporter: &ProgressReporter,
) -> Result<PreparedInputs, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Input preparation",
    });
    job.ensure_output_dir(false)?;
    info!(
        sequence = %job.ori_sequence,
        chains = job.chains.len(),
        total_length = job.full_sequence.len(),
        output = %job.output_dir.display(),
        "Prepared job"
    );
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "MSA retrieval",
    });
    let tracks = retrieve_tracks(&job, config, backend, redundancy, reporter)?;
    write_job_snapshot(
        &job.output_dir,
        &MsaBundle::from_set(&AlignmentSet::new(tracks.clone())),
    )?;
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart { name: "Filtering" });
    let (job, tracks) = match &config.trim {
        Some(trim) => apply_trim(&job, tracks, trim)?,
        None => (job, tracks),
    };
    let tracks = match &config.row_filter {
        Some(row_filter) => apply_row_filter(tracks, row_filter),
        None => tracks,
    };
    reporter.report(Progress::PhaseFinish);

    reporter.report(Progress::PhaseStart {
        name: "Feature assembly",
    });
    let expanded = homooligomerize(&tracks, &job.lengths, &job.multiplicities);
    let features = assemble_features(&job, &expanded, config.fast_mode, config.subsample_seed);
    info!(
        rows = features.num_rows(),
        residues = features.num_residues(),
        "Assembled feature tensors"
    );
    reporter.report(Progress::PhaseFinish);

    let plot_lengths = plot_lengths(&job);
    Ok(PreparedInputs {
        job,
        tracks,
        features,
        plot_lengths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backends::single::SingleSequenceBackend;
    use crate::engine::config::{MsaMethod, PairMode, PrepConfigBuilder, TrimConfig};

    fn config_in(dir: &std::path::Path) -> PrepConfig {
        PrepConfigBuilder::new()
            .msa_method(MsaMethod::SingleSequence)
            .cache_dir(dir.join("cache"))
            .build()
            .unwrap()
    }

    fn run_single(job: JobSpec, config: &PrepConfig) -> PreparedInputs {
        run(
            job,
            config,
            &SingleSequenceBackend,
            None,
            &ProgressReporter::new(),
        )
        .unwrap()
    }

    #[test]
    fn single_sequence_job_produces_consistent_outputs() {
        let base = tempfile::tempdir().unwrap();
        let job = JobSpec::new("MKVL:GG", "2:1", "demo", base.path()).unwrap();
        let config = config_in(base.path());
        let prepared = run_single(job, &config);

        // Query track plus one padded track per chain.
        assert_eq!(prepared.tracks.len(), 3);
        assert!(prepared.tracks.iter().all(|t| t.width() == 6));
        assert_eq!(prepared.tracks[0].rows[0], "MKVLGG");
        assert_eq!(prepared.tracks[2].rows[0], "----GG");

        assert_eq!(prepared.features.num_residues(), 10);
        assert_eq!(prepared.plot_lengths, vec![4, 4, 2]);
        assert!(prepared.job.output_dir.join("msa.json").exists());
    }

    #[test]
    fn paired_mode_falls_back_when_nothing_pairs() {
        let base = tempfile::tempdir().unwrap();
        let job = JobSpec::new("MKVL:GG", "1", "demo", base.path()).unwrap();
        let mut config = config_in(base.path());
        config.pair_mode = PairMode::Paired;
        let prepared = run_single(job, &config);
        // Single-row chain alignments cannot pair; unpaired tracks remain.
        assert_eq!(prepared.tracks.len(), 3);
    }

    #[test]
    fn trim_is_applied_before_feature_assembly() {
        let base = tempfile::tempdir().unwrap();
        let job = JobSpec::new("MKVLTTAQ", "1", "demo", base.path()).unwrap();
        let mut config = config_in(base.path());
        config.trim = Some(TrimConfig {
            ranges: "2-5".to_string(),
            inverse: false,
        });
        let prepared = run_single(job, &config);
        assert_eq!(prepared.job.sequence, "KVLT");
        assert_eq!(prepared.features.num_residues(), 4);
    }

    #[test]
    fn snapshot_round_trips_through_the_precomputed_method() {
        let base = tempfile::tempdir().unwrap();
        let job = JobSpec::new("MKVL:GG", "1", "demo", base.path()).unwrap();
        let config = config_in(base.path());
        let first = run_single(job.clone(), &config);

        let mut replay = config_in(base.path());
        replay.msa_method = MsaMethod::Precomputed;
        replay.precomputed = Some(first.job.output_dir.join("msa.json"));
        let second = run_single(job, &replay);
        assert_eq!(second.tracks, first.tracks);
        assert_eq!(second.features.msa, first.features.msa);
    }

    #[test]
    fn precomputed_without_a_path_is_rejected() {
        let base = tempfile::tempdir().unwrap();
        let job = JobSpec::new("MKVL", "1", "demo", base.path()).unwrap();
        let mut config = config_in(base.path());
        config.msa_method = MsaMethod::Precomputed;
        let err = run(
            job,
            &config,
            &SingleSequenceBackend,
            None,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn custom_alignment_width_mismatch_is_fatal() {
        let base = tempfile::tempdir().unwrap();
        let job = JobSpec::new("MKVL", "1", "demo", base.path()).unwrap();
        let custom = base.path().join("extra.a3m");
        std::fs::write(&custom, ">hit\nMKVLTT\n").unwrap();
        let mut config = config_in(base.path());
        config.custom_msa = Some(custom);
        let err = run(
            job,
            &config,
            &SingleSequenceBackend,
            None,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn custom_alignment_of_the_right_width_is_appended() {
        let base = tempfile::tempdir().unwrap();
        let job = JobSpec::new("MKVL", "1", "demo", base.path()).unwrap();
        let custom = base.path().join("extra.a3m");
        std::fs::write(&custom, ">q\nMKVL\n>hit\nMKIL\n").unwrap();
        let mut config = config_in(base.path());
        config.custom_msa = Some(custom);
        let prepared = run_single(job, &config);
        assert!(prepared.tracks.iter().any(|t| t.rows.contains(&"MKIL".to_string())));
        assert_eq!(prepared.features.num_rows(), 2);
    }
}
