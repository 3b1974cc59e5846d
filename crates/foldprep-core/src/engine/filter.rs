//! Positional trimming and row filtering.
//!
//! Trimming keeps (or, inverted, removes) user-listed residue ranges and
//! rewrites the job plus every alignment column to match, inserting a
//! residue-numbering break where an excision leaves a gap inside a chain.
//! Row filtering drops weak alignment rows by coverage and identity; the
//! query row is never dropped.

use super::pairing::{coverage, identity};
use crate::core::models::alignment::AlignmentTrack;
use crate::core::models::job::JobSpec;
use crate::engine::config::{RowFilterConfig, TrimConfig};
use crate::engine::error::EngineError;
use tracing::info;

/// One parsed trim range: a chain index plus a 0-based inclusive residue
/// span within that chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrimRange {
    chain: usize,
    start: usize,
    end: usize,
}

fn parse_bound(text: &str) -> Result<(Option<usize>, usize), EngineError> {
    let letters: String = text.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &text[letters.len()..];
    let chain = match letters.len() {
        0 => None,
        1 => Some((letters.as_bytes()[0].to_ascii_uppercase() - b'A') as usize),
        _ => {
            return Err(EngineError::InvalidInput(format!(
                "Trim bound '{text}' has a multi-letter chain prefix"
            )));
        }
    };
    let pos: usize = digits.parse().map_err(|_| {
        EngineError::InvalidInput(format!("Trim bound '{text}' has no residue number"))
    })?;
    if pos == 0 {
        return Err(EngineError::InvalidInput(
            "Trim positions are 1-based; 0 is not a residue".to_string(),
        ));
    }
    Ok((chain, pos - 1))
}

/// Parse a comma-separated trim expression such as `5-100,B10-B50`. A bound
/// without a chain letter refers to the first chain; the right bound may
/// omit the letter and inherits the left one.
fn parse_ranges(spec: &str, lengths: &[usize]) -> Result<Vec<TrimRange>, EngineError> {
    let mut ranges = Vec::new();
    for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (left, right) = item.split_once('-').ok_or_else(|| {
            EngineError::InvalidInput(format!("Trim range '{item}' is not of the form start-end"))
        })?;
        let (left_chain, start) = parse_bound(left)?;
        let (right_chain, end) = parse_bound(right)?;
        let chain = left_chain.unwrap_or(0);
        if right_chain.is_some_and(|c| c != chain) {
            return Err(EngineError::InvalidInput(format!(
                "Trim range '{item}' spans two chains"
            )));
        }
        if chain >= lengths.len() {
            return Err(EngineError::InvalidInput(format!(
                "Trim range '{item}' names chain {} but the job has {} chains",
                (b'A' + chain as u8) as char,
                lengths.len()
            )));
        }
        if start > end || end >= lengths[chain] {
            return Err(EngineError::InvalidInput(format!(
                "Trim range '{item}' is outside the {}-residue chain",
                lengths[chain]
            )));
        }
        ranges.push(TrimRange { chain, start, end });
    }
    if ranges.is_empty() {
        return Err(EngineError::InvalidInput(
            "Trim expression lists no ranges".to_string(),
        ));
    }
    Ok(ranges)
}

/// Per-residue keep mask over the concatenated unique chains.
fn keep_mask(config: &TrimConfig, job: &JobSpec) -> Result<Vec<bool>, EngineError> {
    let ranges = parse_ranges(&config.ranges, &job.lengths)?;
    let total: usize = job.lengths.iter().sum();
    let mut offsets = Vec::with_capacity(job.lengths.len());
    let mut acc = 0;
    for &len in &job.lengths {
        offsets.push(acc);
        acc += len;
    }

    let mut listed = vec![false; total];
    for range in ranges {
        let base = offsets[range.chain];
        for slot in &mut listed[base + range.start..=base + range.end] {
            *slot = true;
        }
    }
    let mask: Vec<bool> = if config.inverse {
        listed.iter().map(|&k| !k).collect()
    } else {
        listed
    };
    if mask.iter().all(|&k| !k) {
        return Err(EngineError::InvalidInput(
            "Trim expression removes every residue".to_string(),
        ));
    }
    Ok(mask)
}

/// Rebuild `ori_sequence` under the mask. An excision inside a chain leaves
/// a `/` numbering break; chains trimmed to nothing are dropped along with
/// their multiplicity.
fn trim_ori_sequence(job: &JobSpec, mask: &[bool]) -> (String, Vec<usize>) {
    let mut kept_chains = Vec::new();
    let mut kept_mults = Vec::new();
    let mut cursor = 0;
    for (chain_text, &mult) in job.ori_sequence.split(':').zip(&job.multiplicities) {
        let mut kept = String::new();
        let mut pending_break = false;
        for ch in chain_text.chars() {
            if ch == '/' {
                pending_break = !kept.is_empty();
                continue;
            }
            let keep = mask[cursor];
            cursor += 1;
            if keep {
                if pending_break {
                    kept.push('/');
                    pending_break = false;
                }
                kept.push(ch);
            } else {
                pending_break = !kept.is_empty();
            }
        }
        if !kept.is_empty() {
            kept_chains.push(kept);
            kept_mults.push(mult);
        }
    }
    (kept_chains.join(":"), kept_mults)
}

/// Apply a trim pass to the job and its job-level tracks. Track columns are
/// sliced with the same mask, so rows stay congruent with the new sequence.
pub fn apply_trim(
    job: &JobSpec,
    tracks: Vec<AlignmentTrack>,
    config: &TrimConfig,
) -> Result<(JobSpec, Vec<AlignmentTrack>), EngineError> {
    let mask = keep_mask(config, job)?;
    let (ori_sequence, multiplicities) = trim_ori_sequence(job, &mask);
    let trimmed_job = JobSpec::from_parts(
        &ori_sequence,
        multiplicities,
        &job.job_name,
        &job.output_dir,
        Some(job.output_dir.clone()),
    )?;

    let slice_row = |row: &str| -> String {
        row.chars()
            .zip(&mask)
            .filter_map(|(c, &keep)| keep.then_some(c))
            .collect()
    };
    let tracks = tracks
        .into_iter()
        .map(|track| AlignmentTrack {
            rows: track.rows.iter().map(|r| slice_row(r)).collect(),
            deletions: track
                .deletions
                .iter()
                .map(|d| {
                    d.iter()
                        .zip(&mask)
                        .filter_map(|(&v, &keep)| keep.then_some(v))
                        .collect()
                })
                .collect(),
            names: track.names,
        })
        .collect();

    info!(
        kept = mask.iter().filter(|&&k| k).count(),
        of = mask.len(),
        sequence = %trimmed_job.ori_sequence,
        "Trimmed job"
    );
    Ok((trimmed_job, tracks))
}

/// Drop rows below the coverage/identity thresholds, measured against each
/// track's query row. Row zero always survives.
pub fn apply_row_filter(
    tracks: Vec<AlignmentTrack>,
    config: &RowFilterConfig,
) -> Vec<AlignmentTrack> {
    tracks
        .into_iter()
        .map(|track| {
            let query = track.rows.first().cloned().unwrap_or_default();
            let names = track.names.unwrap_or_default();
            let mut kept = AlignmentTrack {
                rows: Vec::new(),
                deletions: Vec::new(),
                names: if names.is_empty() { None } else { Some(Vec::new()) },
            };
            let before = track.rows.len();
            for (i, row) in track.rows.iter().enumerate() {
                let keep = i == 0
                    || (coverage(row) >= config.min_coverage
                        && identity(&query, row) >= config.min_identity);
                if keep {
                    kept.rows.push(row.clone());
                    kept.deletions.push(track.deletions[i].clone());
                    if let (Some(kept_names), Some(name)) = (&mut kept.names, names.get(i)) {
                        kept_names.push(name.clone());
                    }
                }
            }
            if kept.rows.len() < before {
                info!(before, after = kept.rows.len(), "Filtered alignment rows");
            }
            kept
        })
        .collect()
}
