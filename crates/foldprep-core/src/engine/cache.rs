//! Persistent alignment cache.
//!
//! Retrieved alignments are expensive (minutes of remote search per chain),
//! so every backend result is written to disk keyed by a content hash of the
//! chain sequence. A later run with the same chain skips retrieval entirely.

use crate::core::models::alignment::{AlignmentSet, AlignmentTrack};
use crate::core::utils::hash::content_hash;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Serialized form of a chain's alignment tracks. Field layout matches the
/// job snapshot file, so a snapshot is loadable as a precomputed bundle.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MsaBundle {
    /// One row list per track.
    pub msas: Vec<Vec<String>>,
    /// One deletion matrix per track, congruent with `msas`.
    pub deletion_matrices: Vec<Vec<Vec<i32>>>,
    /// One name list per track; empty strings where a source had no names.
    pub names: Vec<Vec<String>>,
}

impl MsaBundle {
    pub fn from_set(set: &AlignmentSet) -> Self {
        let mut msas = Vec::with_capacity(set.tracks.len());
        let mut deletion_matrices = Vec::with_capacity(set.tracks.len());
        let mut names = Vec::with_capacity(set.tracks.len());
        for track in &set.tracks {
            msas.push(track.rows.clone());
            deletion_matrices.push(track.deletions.clone());
            names.push(
                track
                    .names
                    .clone()
                    .unwrap_or_else(|| vec![String::new(); track.len()]),
            );
        }
        Self {
            msas,
            deletion_matrices,
            names,
        }
    }

    /// Shape check for bundles read back from disk: the three track lists
    /// must be congruent, hold at least one track, and every track must be
    /// non-empty and rectangular with names matching its rows. A bundle that
    /// deserializes but fails this check would panic deep inside pairing or
    /// padding, so it is treated as corrupt.
    fn is_well_formed(&self) -> bool {
        if self.msas.is_empty()
            || self.msas.len() != self.deletion_matrices.len()
            || self.msas.len() != self.names.len()
        {
            return false;
        }
        self.msas
            .iter()
            .zip(&self.deletion_matrices)
            .zip(&self.names)
            .all(|((rows, deletions), names)| {
                let width = rows.first().map_or(0, String::len);
                !rows.is_empty()
                    && rows.len() == deletions.len()
                    && rows.len() == names.len()
                    && rows.iter().all(|r| r.len() == width)
                    && deletions.iter().all(|d| d.len() == width)
            })
    }

    pub fn into_set(self) -> AlignmentSet {
        let tracks = self
            .msas
            .into_iter()
            .zip(self.deletion_matrices)
            .zip(self.names)
            .map(|((rows, deletions), names)| AlignmentTrack {
                rows,
                deletions,
                names: Some(names),
            })
            .collect();
        AlignmentSet::new(tracks)
    }
}

/// Directory-backed cache of [`MsaBundle`] files, one JSON file per chain.
#[derive(Debug, Clone)]
pub struct MsaCache {
    dir: PathBuf,
}

impl MsaCache {
    pub fn new(dir: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_for(&self, chain: &str) -> PathBuf {
        self.dir.join(format!("{}.msa.json", content_hash(chain)))
    }

    /// Load the cached bundle for a chain, if present. A file that does not
    /// parse, or parses into an inconsistent shape, is treated as a miss so
    /// the pipeline falls back to retrieval.
    pub fn load(&self, chain: &str) -> Option<MsaBundle> {
        let path = self.path_for(chain);
        let text = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<MsaBundle>(&text) {
            Ok(bundle) if bundle.is_well_formed() => {
                debug!(path = %path.display(), "Alignment cache hit");
                Some(bundle)
            }
            Ok(_) => {
                warn!(path = %path.display(), "Discarding cache entry with inconsistent shape");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), "Discarding unreadable cache entry: {e}");
                None
            }
        }
    }

    /// Store a bundle atomically: write to a sibling temp file, then rename.
    pub fn store(&self, chain: &str, bundle: &MsaBundle) -> std::io::Result<()> {
        let path = self.path_for(chain);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(bundle)?)?;
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "Stored alignment cache entry");
        Ok(())
    }
}

/// Write the job-level alignment snapshot next to the other job outputs.
/// The file doubles as the input of the precomputed backend.
pub fn write_job_snapshot(output_dir: &Path, bundle: &MsaBundle) -> std::io::Result<PathBuf> {
    let path = output_dir.join("msa.json");
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(bundle)?)?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

/// Read a previously written job snapshot.
pub fn read_job_snapshot(path: &Path) -> std::io::Result<MsaBundle> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> AlignmentSet {
        AlignmentSet::new(vec![
            AlignmentTrack::query_only("MKVL"),
            AlignmentTrack {
                rows: vec!["MKVL".into(), "MR-L".into()],
                deletions: vec![vec![0; 4], vec![0, 2, 0, 0]],
                names: None,
            },
        ])
    }

    #[test]
    fn bundle_round_trips_through_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MsaCache::new(dir.path()).unwrap();
        let bundle = MsaBundle::from_set(&sample_set());

        assert!(cache.load("MKVL").is_none());
        cache.store("MKVL", &bundle).unwrap();
        assert_eq!(cache.load("MKVL"), Some(bundle));
    }

    #[test]
    fn corrupt_entries_are_treated_as_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MsaCache::new(dir.path()).unwrap();
        fs::write(cache.path_for("MKVL"), "not json").unwrap();
        assert!(cache.load("MKVL").is_none());
    }

    #[test]
    fn bundles_with_inconsistent_shape_are_treated_as_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MsaCache::new(dir.path()).unwrap();

        let hollow = MsaBundle {
            msas: vec![],
            deletion_matrices: vec![],
            names: vec![],
        };
        fs::write(cache.path_for("MKVL"), serde_json::to_vec(&hollow).unwrap()).unwrap();
        assert!(cache.load("MKVL").is_none());

        let ragged = MsaBundle {
            msas: vec![vec!["MKVL".into(), "MK".into()]],
            deletion_matrices: vec![vec![vec![0; 4], vec![0; 4]]],
            names: vec![vec![String::new(), String::new()]],
        };
        fs::write(cache.path_for("GG"), serde_json::to_vec(&ragged).unwrap()).unwrap();
        assert!(cache.load("GG").is_none());
    }

    #[test]
    fn cache_keys_distinguish_chains() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MsaCache::new(dir.path()).unwrap();
        assert_ne!(cache.path_for("MKVL"), cache.path_for("MKVA"));
    }

    #[test]
    fn nameless_tracks_get_placeholder_names() {
        let bundle = MsaBundle::from_set(&sample_set());
        assert_eq!(bundle.names[1], vec!["", ""]);
        let set = bundle.into_set();
        assert_eq!(
            set.tracks[1].names,
            Some(vec![String::new(), String::new()])
        );
    }

    #[test]
    fn snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = MsaBundle::from_set(&sample_set());
        let path = write_job_snapshot(dir.path(), &bundle).unwrap();
        assert_eq!(path.file_name().unwrap(), "msa.json");
        assert_eq!(read_job_snapshot(&path).unwrap(), bundle);
    }
}
