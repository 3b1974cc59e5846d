//! Feature-tensor assembly.
//!
//! The last pipeline stage: job-level alignment tracks are expanded to the
//! full homo-oligomer width, deduplicated, capped at the MSA cell budget,
//! and encoded into the numeric tensors the prediction model consumes.

use crate::core::models::alignment::AlignmentTrack;
use crate::core::models::features::{
    FeatureDict, NUM_SEQUENCE_TYPES, TemplateFeatures, UNKNOWN_INDEX, aa_index,
};
use crate::core::models::job::JobSpec;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use tracing::{debug, info};

/// Total cell budget of the emitted MSA; the row cap is this divided by the
/// sequence length.
const SUBSAMPLE_CELL_BUDGET: f64 = 3e7;

/// Expand job-level rows (unique-chain width) to the full homo-oligomer
/// width. For each copy slot `c`, every chain with at least `c + 1` copies
/// contributes its fragment at that copy's position; all other positions are
/// gaps. With all multiplicities at one this is the identity.
pub fn homooligomerize(
    tracks: &[AlignmentTrack],
    lengths: &[usize],
    multiplicities: &[usize],
) -> Vec<AlignmentTrack> {
    let max_copies = multiplicities.iter().copied().max().unwrap_or(1);
    if max_copies == 1 {
        return tracks.to_vec();
    }

    tracks
        .iter()
        .map(|track| {
            let mut rows = Vec::new();
            let mut deletions = Vec::new();
            let mut names = Vec::new();
            for (i, row) in track.rows.iter().enumerate() {
                for copy in 0..max_copies {
                    let mut expanded_row = String::new();
                    let mut expanded_dels = Vec::new();
                    let mut offset = 0;
                    let mut placed = false;
                    for (&len, &mult) in lengths.iter().zip(multiplicities) {
                        let fragment = &row[offset..offset + len];
                        let dels = &track.deletions[i][offset..offset + len];
                        for slot in 0..mult {
                            if slot == copy {
                                expanded_row.push_str(fragment);
                                expanded_dels.extend_from_slice(dels);
                                placed |= fragment.chars().any(|c| c != '-');
                            } else {
                                expanded_row.push_str(&"-".repeat(len));
                                expanded_dels.extend(std::iter::repeat_n(0, len));
                            }
                        }
                        offset += len;
                    }
                    if !placed {
                        continue;
                    }
                    rows.push(expanded_row);
                    deletions.push(expanded_dels);
                    if let Some(n) = &track.names {
                        names.push(n[i].clone());
                    }
                }
            }
            AlignmentTrack {
                rows,
                deletions,
                names: track.names.as_ref().map(|_| names),
            }
        })
        .collect()
}

/// Lengths of the physical sub-units in model order: every chain copy,
/// further split at `/` numbering breaks. Drives [`residue_index`].
pub fn sub_unit_lengths(job: &JobSpec) -> Vec<usize> {
    let mut lengths = Vec::new();
    for (chain_text, &mult) in job.ori_sequence.split(':').zip(&job.multiplicities) {
        let segments: Vec<usize> = chain_text
            .split('/')
            .map(str::len)
            .filter(|&l| l > 0)
            .collect();
        for _ in 0..mult {
            lengths.extend(&segments);
        }
    }
    lengths
}

/// Chain-copy lengths without numbering breaks, used to draw chain
/// boundaries in plots.
pub fn plot_lengths(job: &JobSpec) -> Vec<usize> {
    let mut lengths = Vec::new();
    for (&len, &mult) in job.lengths.iter().zip(&job.multiplicities) {
        lengths.extend(std::iter::repeat_n(len, mult));
    }
    lengths
}

/// Chain-break-aware residue numbering: sub-unit `k` starts at `k * T`
/// where `T` is the total length, so the gap between consecutive sub-units
/// always exceeds any physical chain span.
pub fn residue_index(sub_lengths: &[usize]) -> Array1<i32> {
    let total: usize = sub_lengths.iter().sum();
    let mut index = Vec::with_capacity(total);
    for (k, &len) in sub_lengths.iter().enumerate() {
        let start = k * total;
        index.extend((0..len).map(|i| (start + i) as i32));
    }
    Array1::from(index)
}

/// Encode full-width tracks into the stacked MSA tensors. The full query row
/// is prepended, then rows are deduplicated by sequence text in first-seen
/// order, so row zero is always the query.
///
/// The deduplicated stack is capped at the cell budget by uniform sampling,
/// query row included, so the emitted MSA never exceeds the budget. The
/// sample is order-preserving and deterministic in the seed.
pub fn make_msa_features(
    tracks: &[AlignmentTrack],
    full_sequence: &str,
    seed: u64,
) -> (Array2<i32>, Array2<i32>) {
    let width = full_sequence.len();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut kept: Vec<(&str, &[i32])> = Vec::new();

    let query_deletions = vec![0; width];
    seen.insert(full_sequence);
    kept.push((full_sequence, &query_deletions));
    for track in tracks {
        for (row, dels) in track.rows.iter().zip(&track.deletions) {
            if seen.insert(row) {
                kept.push((row, dels));
            }
        }
    }
    debug!(rows = kept.len(), "Deduplicated MSA rows");

    let cap = ((SUBSAMPLE_CELL_BUDGET / width as f64) as usize).max(1);
    if kept.len() > cap {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut picked: Vec<usize> = rand::seq::index::sample(&mut rng, kept.len() - 1, cap - 1)
            .into_iter()
            .map(|i| i + 1)
            .collect();
        picked.sort_unstable();
        info!(
            rows = kept.len(),
            kept = cap,
            "Subsampled MSA to the cell budget"
        );
        kept = std::iter::once(0).chain(picked).map(|i| kept[i]).collect();
    }

    let mut msa = Array2::zeros((kept.len(), width));
    let mut deletion_matrix = Array2::zeros((kept.len(), width));
    for (r, (row, dels)) in kept.iter().enumerate() {
        for (c, ch) in row.chars().enumerate() {
            msa[[r, c]] = aa_index(ch);
            deletion_matrix[[r, c]] = dels[c];
        }
    }
    (msa, deletion_matrix)
}

/// One-hot sequence encoding over the 20 residues plus `X`; gaps cannot
/// occur in a query sequence.
fn one_hot_sequence(full_sequence: &str) -> Array2<f32> {
    let mut aatype = Array2::zeros((full_sequence.len(), NUM_SEQUENCE_TYPES));
    for (i, ch) in full_sequence.chars().enumerate() {
        let index = aa_index(ch).min(UNKNOWN_INDEX);
        aatype[[i, index as usize]] = 1.0;
    }
    aatype
}

/// Assemble the final tensor set from the expanded tracks.
pub fn assemble_features(
    job: &JobSpec,
    expanded_tracks: &[AlignmentTrack],
    fast_mode: bool,
    seed: u64,
) -> FeatureDict {
    let total = job.full_sequence.len();
    let (msa, deletion_matrix_int) = make_msa_features(expanded_tracks, &job.full_sequence, seed);
    let num_rows = msa.nrows() as i32;

    FeatureDict {
        aatype: one_hot_sequence(&job.full_sequence),
        between_segment_residues: Array1::zeros(total),
        domain_name: job.job_name.clone(),
        residue_index: residue_index(&sub_unit_lengths(job)),
        seq_length: Array1::from_elem(total, total as i32),
        sequence: job.full_sequence.clone(),
        msa,
        deletion_matrix_int,
        num_alignments: Array1::from_elem(total, num_rows),
        templates: (!fast_mode).then(|| TemplateFeatures::placeholder(0, total)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn job(seq: &str, olig: &str) -> JobSpec {
        JobSpec::new(seq, olig, "t", Path::new("/tmp")).unwrap()
    }

    #[test]
    fn residue_index_jumps_by_the_total_length_at_breaks() {
        let index = residue_index(&[5, 7]);
        let expected: Vec<i32> = (0..5).chain(12..19).collect();
        assert_eq!(index.to_vec(), expected);
    }

    #[test]
    fn sub_unit_lengths_cover_copies_and_numbering_breaks() {
        let j = job("MKVL/TT:GG", "2:1");
        assert_eq!(sub_unit_lengths(&j), vec![4, 2, 4, 2, 2]);
        assert_eq!(plot_lengths(&j), vec![6, 6, 2]);
    }

    #[test]
    fn monomer_expansion_is_the_identity() {
        let track = AlignmentTrack::query_only("MKVLGG");
        let expanded = homooligomerize(&[track.clone()], &[4, 2], &[1, 1]);
        assert_eq!(expanded, vec![track]);
    }

    #[test]
    fn homooligomer_rows_are_block_diagonal() {
        let track = AlignmentTrack {
            rows: vec!["MKVLGG".to_string()],
            deletions: vec![vec![1, 0, 0, 0, 0, 2]],
            names: Some(vec!["hit".to_string()]),
        };
        let expanded = homooligomerize(&[track], &[4, 2], &[2, 1]);
        assert_eq!(
            expanded[0].rows,
            vec!["MKVL----GG", "----MKVL--"]
        );
        assert_eq!(expanded[0].deletions[0], vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(expanded[0].deletions[1], vec![0, 0, 0, 0, 1, 0, 0, 0, 0, 0]);
        assert_eq!(expanded[0].names.as_ref().unwrap(), &["hit", "hit"]);
    }

    #[test]
    fn msa_features_put_the_query_first_and_deduplicate() {
        let track = AlignmentTrack {
            rows: vec![
                "MKVL".to_string(),
                "MKVA".to_string(),
                "MKVA".to_string(),
            ],
            deletions: vec![vec![0; 4]; 3],
            names: None,
        };
        let (msa, dels) = make_msa_features(&[track], "MKVL", 0);
        assert_eq!(msa.nrows(), 2);
        assert_eq!(msa[[0, 0]], aa_index('M'));
        assert_eq!(msa[[1, 3]], aa_index('A'));
        assert_eq!(dels.nrows(), 2);
    }

    #[test]
    fn the_query_row_is_prepended_when_expansion_omits_it() {
        let expanded = AlignmentTrack {
            rows: vec!["MKVL----".to_string(), "----MKVL".to_string()],
            deletions: vec![vec![0; 8]; 2],
            names: None,
        };
        let (msa, _) = make_msa_features(&[expanded], "MKVLMKVL", 0);
        assert_eq!(msa.nrows(), 3);
        assert!((0..8).all(|c| msa[[0, c]] != aa_index('-')));
    }

    #[test]
    fn the_final_msa_never_exceeds_the_cell_budget() {
        // Width 40000 gives a cap of 750 rows. None of the 1000 hit rows
        // equals the query, so the prepended query must fit inside the cap.
        let width = 40_000;
        let query = "A".repeat(width);
        let rows: Vec<String> = (0..1000).map(|i| format!("{i:A>width$}")).collect();
        let track = AlignmentTrack {
            deletions: vec![vec![0; width]; rows.len()],
            names: None,
            rows,
        };

        let (msa, dels) = make_msa_features(&[track.clone()], &query, 42);
        assert_eq!(msa.nrows(), 750);
        assert_eq!(dels.nrows(), 750);
        // Hit rows end in digits; an 'A' in the last column marks the query.
        assert_eq!(msa[[0, width - 1]], aa_index('A'));

        let (again, _) = make_msa_features(&[track], &query, 42);
        assert_eq!(msa, again);
    }

    #[test]
    fn assembled_features_are_shape_consistent() {
        let j = job("MKVL:GG", "2:1");
        let tracks = homooligomerize(
            &[AlignmentTrack::query_only(&j.sequence)],
            &j.lengths,
            &j.multiplicities,
        );
        let features = assemble_features(&j, &tracks, false, 0);
        let total = j.full_sequence.len();
        assert_eq!(features.aatype.shape(), &[total, NUM_SEQUENCE_TYPES]);
        assert_eq!(features.residue_index.len(), total);
        assert_eq!(features.msa.ncols(), total);
        assert_eq!(features.msa[[0, 0]], aa_index('M'));
        assert_eq!(features.num_alignments[0], features.msa.nrows() as i32);
        // The template slots are present but hold zero templates.
        let templates = features.templates.as_ref().unwrap();
        assert_eq!(templates.template_aatype.shape(), &[0, total, 22]);
        assert_eq!(templates.template_sum_probs.len(), 0);
    }

    #[test]
    fn fast_mode_omits_template_placeholders() {
        let j = job("MKVL", "1");
        let features = assemble_features(&j, &[AlignmentTrack::query_only("MKVL")], true, 0);
        assert!(features.templates.is_none());
    }
}
