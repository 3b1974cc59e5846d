use crate::core::models::alignment::AlignmentTrack;
use crate::engine::cache::read_job_snapshot;
use crate::engine::error::EngineError;
use std::path::Path;
use tracing::info;

/// Load job-level alignment tracks from a previously written snapshot.
///
/// Unlike the search backends this operates on the whole job, not per chain:
/// snapshot rows already span the full concatenated sequence. Any row whose
/// width disagrees with the job aborts the run, since silently misaligned
/// alignments would corrupt every downstream feature.
pub fn load_precomputed_tracks(
    path: &Path,
    expected_width: usize,
) -> Result<Vec<AlignmentTrack>, EngineError> {
    let bundle = read_job_snapshot(path)?;
    let set = bundle.into_set();
    if set.tracks.is_empty() {
        return Err(EngineError::InvalidInput(format!(
            "Precomputed alignment '{}' contains no tracks",
            path.display()
        )));
    }
    for track in &set.tracks {
        if !track.is_rectangular() {
            return Err(EngineError::InvalidInput(format!(
                "Precomputed alignment '{}' has rows of unequal width",
                path.display()
            )));
        }
        if track.width() != expected_width {
            return Err(EngineError::InvalidInput(format!(
                "Precomputed alignment '{}' is {} columns wide but the job sequence has {} residues",
                path.display(),
                track.width(),
                expected_width
            )));
        }
    }
    info!(
        tracks = set.tracks.len(),
        rows = set.tracks.iter().map(AlignmentTrack::len).sum::<usize>(),
        "Loaded precomputed alignment"
    );
    Ok(set.tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::alignment::AlignmentSet;
    use crate::engine::cache::{MsaBundle, write_job_snapshot};

    fn snapshot_with(rows: Vec<&str>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let track = AlignmentTrack {
            deletions: rows.iter().map(|r| vec![0; r.len()]).collect(),
            names: None,
            rows: rows.into_iter().map(String::from).collect(),
        };
        let bundle = MsaBundle::from_set(&AlignmentSet::new(vec![track]));
        write_job_snapshot(dir.path(), &bundle).unwrap();
        dir
    }

    #[test]
    fn accepts_a_snapshot_of_the_right_width() {
        let dir = snapshot_with(vec!["MKVLGG", "MR-LGG"]);
        let tracks = load_precomputed_tracks(&dir.path().join("msa.json"), 6).unwrap();
        assert_eq!(tracks[0].len(), 2);
    }

    #[test]
    fn rejects_a_width_mismatch() {
        let dir = snapshot_with(vec!["MKVLGG"]);
        let err = load_precomputed_tracks(&dir.path().join("msa.json"), 8).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
