//! Cross-chain pairing.
//!
//! For a hetero-complex, rows that originate from the same source sequence
//! (same accession label) in every chain's alignment are stitched into joint
//! rows, giving the model coevolution signal across the chain boundary.
//! Pairing is best-effort: when any chain has no usable hits or no label is
//! shared by all chains, the job falls back to unpaired tracks.

use crate::core::models::alignment::AlignmentTrack;
use crate::engine::config::PairingConfig;
use crate::engine::error::EngineError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info, warn};

/// Fraction of non-gap positions in an aligned row.
pub(crate) fn coverage(row: &str) -> f64 {
    if row.is_empty() {
        return 0.0;
    }
    let non_gap = row.chars().filter(|&c| c != '-').count();
    non_gap as f64 / row.len() as f64
}

/// Fraction of positions identical to the query.
pub(crate) fn identity(query: &str, row: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let matches = query
        .chars()
        .zip(row.chars())
        .filter(|(q, r)| q == r && *q != '-')
        .count();
    matches as f64 / query.len() as f64
}

/// Extract the source accession from an alignment row name: the region
/// before any `/start-end` suffix, with a database prefix before `_`
/// stripped. `UniRef100_A0A5E8/24-76` becomes `A0A5E8`.
pub fn source_label(name: &str) -> Option<&str> {
    let stem = name.split('/').next()?.split_whitespace().next()?;
    if stem.is_empty() {
        return None;
    }
    Some(match stem.split_once('_') {
        Some((_, accession)) if !accession.is_empty() => accession,
        _ => stem,
    })
}

/// Pairable hits of one chain: labels in row order, plus a lookup from label
/// to the first row that carried it.
struct PairCandidates {
    ordered: Vec<String>,
    by_label: HashMap<String, usize>,
}

fn index_by_label(track: &AlignmentTrack, query: &str, config: &PairingConfig) -> PairCandidates {
    let mut ordered = Vec::new();
    let mut by_label: HashMap<String, usize> = HashMap::new();
    let names = match &track.names {
        Some(names) => names,
        None => {
            return PairCandidates {
                ordered,
                by_label,
            };
        }
    };
    for (i, name) in names.iter().enumerate().skip(1) {
        let row = &track.rows[i];
        if coverage(row) < config.min_coverage || identity(query, row) < config.min_identity {
            continue;
        }
        let Some(label) = source_label(name) else {
            continue;
        };
        if !by_label.contains_key(label) {
            by_label.insert(label.to_string(), i);
            ordered.push(label.to_string());
        }
    }
    PairCandidates { ordered, by_label }
}

/// Per-chain tracks whose rows are index-aligned: row `i` of every track
/// comes from the same source sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedAlignment {
    pub tracks: Vec<AlignmentTrack>,
}

impl PairedAlignment {
    pub fn num_pairs(&self) -> usize {
        self.tracks.first().map_or(0, AlignmentTrack::len)
    }
}

/// One stitched chain pair: the chain indices plus a two-track
/// [`PairedAlignment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedPair {
    pub chains: (usize, usize),
    pub alignment: PairedAlignment,
}

fn stitch_track(
    candidates: &PairCandidates,
    track: &AlignmentTrack,
    shared: &[&String],
) -> AlignmentTrack {
    let mut rows = Vec::with_capacity(shared.len());
    let mut deletions = Vec::with_capacity(shared.len());
    let mut names = Vec::with_capacity(shared.len());
    for label in shared {
        let i = candidates.by_label[*label];
        rows.push(track.rows[i].clone());
        deletions.push(track.deletions[i].clone());
        names.push((*label).clone());
    }
    AlignmentTrack {
        rows,
        deletions,
        names: Some(names),
    }
}

/// Stitch every unordered chain pair by shared source label.
///
/// `tracks[k]` must be chain `k`'s chain-local track with the query at row
/// zero. Chains with no pairable hits and pairs sharing no label are
/// skipped; the result is empty when nothing pairs at all. Within a pair,
/// row order follows the lower-indexed chain.
pub fn pair_all(
    chains: &[String],
    tracks: &[AlignmentTrack],
    config: &PairingConfig,
) -> Vec<PairedPair> {
    if chains.len() < 2 || tracks.len() != chains.len() {
        return Vec::new();
    }
    let candidates: Vec<PairCandidates> = chains
        .iter()
        .zip(tracks)
        .map(|(chain, track)| index_by_label(track, chain, config))
        .collect();
    for (k, c) in candidates.iter().enumerate() {
        if c.ordered.is_empty() {
            warn!(chain = k, "Chain has no pairable hits");
        }
    }

    let mut pairs = Vec::new();
    for a in 0..chains.len() {
        for b in a + 1..chains.len() {
            let shared: Vec<&String> = candidates[a]
                .ordered
                .iter()
                .filter(|label| candidates[b].by_label.contains_key(*label))
                .collect();
            if shared.is_empty() {
                info!(a, b, "No source sequence shared between chains; pair skipped");
                continue;
            }
            debug!(a, b, rows = shared.len(), "Stitched chain pair");
            pairs.push(PairedPair {
                chains: (a, b),
                alignment: PairedAlignment {
                    tracks: vec![
                        stitch_track(&candidates[a], &tracks[a], &shared),
                        stitch_track(&candidates[b], &tracks[b], &shared),
                    ],
                },
            });
        }
    }
    pairs
}

/// Redundancy reduction over paired rows, separated out so tests can avoid
/// the external binary.
pub trait RedundancyFilter {
    /// Indices of rows that survive filtering at the given identity cutoff.
    fn survivors(&self, rows: &[String], identity_percent: u8) -> Result<Vec<usize>, EngineError>;
}

/// The `hhfilter` binary from the HH-suite.
#[derive(Debug, Clone)]
pub struct HhFilter {
    binary: PathBuf,
}

impl Default for HhFilter {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("hhfilter"),
        }
    }
}

impl RedundancyFilter for HhFilter {
    fn survivors(&self, rows: &[String], identity_percent: u8) -> Result<Vec<usize>, EngineError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("paired.a3m");
        let output = scratch.path().join("filtered.a3m");
        let records: Vec<(String, String)> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (i.to_string(), row.clone()))
            .collect();
        crate::core::io::fasta::write_fasta(&input, &records)?;

        let run = Command::new(&self.binary)
            .arg("-id")
            .arg(identity_percent.to_string())
            .arg("-i")
            .arg(&input)
            .arg("-o")
            .arg(&output)
            .output()?;
        if !run.status.success() {
            return Err(EngineError::Tool {
                tool: "hhfilter",
                message: String::from_utf8_lossy(&run.stderr).trim().to_string(),
            });
        }

        let text = std::fs::read_to_string(&output)?;
        let mut survivors = Vec::new();
        for (name, _) in crate::core::io::fasta::parse_fasta(&text)? {
            let index = name.parse::<usize>().map_err(|_| EngineError::Tool {
                tool: "hhfilter",
                message: format!("unexpected record name '{name}' in filter output"),
            })?;
            survivors.push(index);
        }
        survivors.sort_unstable();
        Ok(survivors)
    }
}

/// Measure redundancy among the stitched rows and, only when configured to,
/// drop the non-survivors. The measurement is always logged so heavily
/// redundant pairings are visible either way.
pub fn reduce_redundancy(
    paired: PairedAlignment,
    filter: &dyn RedundancyFilter,
    config: &PairingConfig,
) -> Result<PairedAlignment, EngineError> {
    let joint: Vec<String> = (0..paired.num_pairs())
        .map(|i| {
            paired
                .tracks
                .iter()
                .map(|t| t.rows[i].as_str())
                .collect::<String>()
        })
        .collect();
    let survivors = filter.survivors(&joint, config.redundancy_identity)?;
    info!(
        pairs = paired.num_pairs(),
        non_redundant = survivors.len(),
        applied = config.apply_redundancy_filter,
        "Redundancy among paired rows"
    );
    if !config.apply_redundancy_filter {
        return Ok(paired);
    }

    let tracks = paired
        .tracks
        .into_iter()
        .map(|track| {
            let names = track.names.unwrap_or_default();
            let mut kept = AlignmentTrack {
                rows: Vec::with_capacity(survivors.len()),
                deletions: Vec::with_capacity(survivors.len()),
                names: Some(Vec::with_capacity(survivors.len())),
            };
            for &i in &survivors {
                kept.rows.push(track.rows[i].clone());
                kept.deletions.push(track.deletions[i].clone());
                if let Some(kept_names) = &mut kept.names {
                    kept_names.push(names[i].clone());
                }
            }
            kept
        })
        .collect();
    Ok(PairedAlignment { tracks })
}
