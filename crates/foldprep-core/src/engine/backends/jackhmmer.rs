//! Streamed-chunk jackhmmer search.
//!
//! The reference databases are published as numbered FASTA chunks on a set
//! of regional mirrors. Each chunk is downloaded, searched with the external
//! `jackhmmer` binary, and deleted before the next one, so disk usage stays
//! bounded at one chunk regardless of database size. Per-chunk hit lists are
//! merged by significance afterwards.

use super::AlignmentBackend;
use crate::core::io::fasta::write_fasta;
use crate::core::io::stockholm::{parse_stockholm, parse_tblout};
use crate::core::io::{ParseError, ParsedAlignment};
use crate::core::models::alignment::{AlignmentSet, AlignmentTrack};
use crate::engine::cache::{MsaBundle, MsaCache};
use crate::engine::config::NetworkConfig;
use crate::engine::error::EngineError;
use crate::engine::mirror::select_mirror;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::retry::with_retries;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, info, instrument};

/// One chunked reference database.
#[derive(Debug, Clone, Copy)]
pub struct DatabaseSpec {
    pub name: &'static str,
    pub file: &'static str,
    pub num_chunks: u32,
    /// Database size handed to jackhmmer's `-Z` so e-values are computed
    /// against the whole database rather than one chunk.
    pub z_value: u64,
    /// Cap on merged hits, query row included.
    pub max_hits: Option<usize>,
}

pub const DATABASES: [DatabaseSpec; 3] = [
    DatabaseSpec {
        name: "uniref90",
        file: "uniref90_2021_03.fasta",
        num_chunks: 59,
        z_value: 135_301_051,
        max_hits: None,
    },
    DatabaseSpec {
        name: "smallbfd",
        file: "bfd-first_non_consensus_sequences.fasta",
        num_chunks: 17,
        z_value: 65_984_053,
        max_hits: None,
    },
    DatabaseSpec {
        name: "mgnify",
        file: "mgy_clusters_2019_05.fasta",
        num_chunks: 71,
        z_value: 304_820_129,
        max_hits: Some(501),
    },
];

/// URL of one database chunk on the mirror with the given suffix.
pub fn chunk_url(suffix: &str, db: &DatabaseSpec, chunk: u32) -> String {
    format!(
        "https://storage.googleapis.com/alphafold-colab{suffix}/latest/{}.{chunk}",
        db.file
    )
}

/// Hits from one chunk: the query-aligned rows plus per-target e-values.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub alignment: ParsedAlignment,
    pub e_values: HashMap<String, f64>,
}

/// Invocation of the external search binary, separated out so tests and
/// alternative tools can stand in for the real jackhmmer.
pub trait SearchTool {
    fn search(
        &self,
        query_fasta: &Path,
        database: &Path,
        z_value: u64,
    ) -> Result<ChunkResult, EngineError>;
}

/// The real `jackhmmer` binary, run with one iteration and the filter
/// thresholds the reference pipeline uses.
#[derive(Debug, Clone)]
pub struct JackhmmerTool {
    binary: PathBuf,
    cpu: u32,
}

impl Default for JackhmmerTool {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("jackhmmer"),
            cpu: 8,
        }
    }
}

impl JackhmmerTool {
    pub fn new(binary: PathBuf, cpu: u32) -> Self {
        Self { binary, cpu }
    }
}

impl SearchTool for JackhmmerTool {
    fn search(
        &self,
        query_fasta: &Path,
        database: &Path,
        z_value: u64,
    ) -> Result<ChunkResult, EngineError> {
        let scratch = tempfile::tempdir()?;
        let sto_path = scratch.path().join("hits.sto");
        let tbl_path = scratch.path().join("hits.tbl");

        let output = Command::new(&self.binary)
            .arg("-o")
            .arg("/dev/null")
            .arg("-A")
            .arg(&sto_path)
            .arg("--tblout")
            .arg(&tbl_path)
            .arg("--noali")
            .args(["--F1", "0.0005", "--F2", "5e-05", "--F3", "5e-07"])
            .args(["--incE", "0.0001", "-E", "0.0001"])
            .args(["-N", "1"])
            .arg("--cpu")
            .arg(self.cpu.to_string())
            .arg("-Z")
            .arg(z_value.to_string())
            .arg(query_fasta)
            .arg(database)
            .output()?;
        if !output.status.success() {
            return Err(EngineError::Tool {
                tool: "jackhmmer",
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let alignment = parse_stockholm(&std::fs::read_to_string(&sto_path)?)?;
        let e_values = parse_tblout(&std::fs::read_to_string(&tbl_path)?)?;
        Ok(ChunkResult {
            alignment,
            e_values,
        })
    }
}

/// Merge per-chunk hit lists into one track: the query stays at row zero,
/// the duplicate query rows every later chunk carries are dropped, hits are
/// ordered by ascending e-value, and capped databases are truncated.
pub fn assemble_database_hits(
    db: &DatabaseSpec,
    chunks: &[ChunkResult],
) -> Result<AlignmentTrack, EngineError> {
    let first = chunks
        .first()
        .ok_or_else(|| EngineError::Internal(format!("no chunks searched for {}", db.name)))?;
    let query_name = first.alignment.names[0].clone();
    let query_row = first.alignment.rows[0].clone();
    let width = query_row.len();

    let mut hits: Vec<(f64, String, Vec<i32>, String)> = Vec::new();
    for chunk in chunks {
        for (i, name) in chunk.alignment.names.iter().enumerate() {
            if *name == query_name {
                continue;
            }
            let row = &chunk.alignment.rows[i];
            if row.len() != width {
                return Err(EngineError::Parse {
                    source: ParseError::RaggedAlignment {
                        expected: width,
                        found: row.len(),
                    },
                });
            }
            let e_value = chunk.e_values.get(name).copied().unwrap_or(f64::INFINITY);
            hits.push((
                e_value,
                row.clone(),
                chunk.alignment.deletions[i].clone(),
                name.clone(),
            ));
        }
    }
    hits.sort_by(|a, b| a.0.total_cmp(&b.0));
    if let Some(max) = db.max_hits {
        hits.truncate(max.saturating_sub(1));
    }

    let mut rows = vec![query_row];
    let mut deletions = vec![first.alignment.deletions[0].clone()];
    let mut names = vec![query_name];
    for (_, row, dels, name) in hits {
        rows.push(row);
        deletions.push(dels);
        names.push(name);
    }
    Ok(AlignmentTrack {
        rows,
        deletions,
        names: Some(names),
    })
}

static SELECTED_MIRROR: OnceLock<&'static str> = OnceLock::new();

/// Cache-aware chunked search over all reference databases.
pub struct JackhmmerBackend<T: SearchTool = JackhmmerTool> {
    tool: T,
    cache: MsaCache,
    network: NetworkConfig,
}

impl JackhmmerBackend<JackhmmerTool> {
    pub fn new(cache: MsaCache, network: NetworkConfig) -> Self {
        Self::with_tool(JackhmmerTool::default(), cache, network)
    }
}

impl<T: SearchTool> JackhmmerBackend<T> {
    pub fn with_tool(tool: T, cache: MsaCache, network: NetworkConfig) -> Self {
        Self {
            tool,
            cache,
            network,
        }
    }

    /// Probe the mirrors once per process; later chains reuse the winner.
    fn mirror_suffix(&self) -> Result<&'static str, EngineError> {
        if let Some(&suffix) = SELECTED_MIRROR.get() {
            return Ok(suffix);
        }
        let suffix = select_mirror(&self.network, |s| chunk_url(s, &DATABASES[0], 1))?;
        Ok(*SELECTED_MIRROR.get_or_init(|| suffix))
    }

    #[instrument(skip_all, fields(chain_len = chain.len()))]
    fn search_chain(
        &self,
        chain: &str,
        reporter: &ProgressReporter,
    ) -> Result<AlignmentSet, EngineError> {
        let suffix = self.mirror_suffix()?;
        let scratch = tempfile::tempdir()?;
        let query_path = scratch.path().join("query.fasta");
        write_fasta(&query_path, &[("query".to_string(), chain.to_string())])?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.network.request_timeout())
            .build()?;

        let mut tracks = Vec::with_capacity(DATABASES.len());
        for db in &DATABASES {
            reporter.report(Progress::SearchStart {
                database: db.name.to_string(),
                total_chunks: db.num_chunks as u64,
            });
            let chunk_path = scratch.path().join("chunk.fasta");
            let mut chunks = Vec::with_capacity(db.num_chunks as usize);
            for i in 1..=db.num_chunks {
                let url = chunk_url(suffix, db, i);
                with_retries(&self.network.retry, "chunk download", || {
                    let bytes = client.get(&url).send()?.error_for_status()?.bytes()?;
                    std::fs::write(&chunk_path, &bytes)?;
                    Ok(())
                })?;
                chunks.push(self.tool.search(&query_path, &chunk_path, db.z_value)?);
                std::fs::remove_file(&chunk_path)?;
                reporter.report(Progress::ChunkDone);
            }
            let track = assemble_database_hits(db, &chunks)?;
            debug!(database = db.name, hits = track.len() - 1, "Merged chunk hits");
            tracks.push(track);
            reporter.report(Progress::SearchFinish);
        }
        Ok(AlignmentSet::new(tracks))
    }
}

impl<T: SearchTool> AlignmentBackend for JackhmmerBackend<T> {
    fn fetch(
        &self,
        chains: &[String],
        reporter: &ProgressReporter,
    ) -> Result<Vec<AlignmentSet>, EngineError> {
        let mut sets = Vec::with_capacity(chains.len());
        for chain in chains {
            if let Some(bundle) = self.cache.load(chain) {
                sets.push(bundle.into_set());
                continue;
            }
            info!(chain_len = chain.len(), "Searching reference databases");
            let set = self.search_chain(chain, reporter)?;
            self.cache.store(chain, &MsaBundle::from_set(&set))?;
            sets.push(set);
        }
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(names: &[&str], rows: &[&str], e_values: &[(&str, f64)]) -> ChunkResult {
        ChunkResult {
            alignment: ParsedAlignment {
                rows: rows.iter().map(|r| r.to_string()).collect(),
                deletions: rows.iter().map(|r| vec![0; r.len()]).collect(),
                names: names.iter().map(|n| n.to_string()).collect(),
            },
            e_values: e_values
                .iter()
                .map(|(n, e)| (n.to_string(), *e))
                .collect(),
        }
    }

    #[test]
    fn merged_hits_are_ordered_by_e_value() {
        let chunks = vec![
            chunk(&["query", "weak"], &["MKVL", "MR-L"], &[("weak", 1e-5)]),
            chunk(&["query", "strong"], &["MKVL", "MKVI"], &[("strong", 1e-30)]),
        ];
        let track = assemble_database_hits(&DATABASES[0], &chunks).unwrap();
        assert_eq!(
            track.names.as_ref().unwrap(),
            &["query", "strong", "weak"]
        );
        assert_eq!(track.rows[0], "MKVL");
    }

    #[test]
    fn duplicate_query_rows_from_later_chunks_are_dropped() {
        let chunks = vec![
            chunk(&["query", "a"], &["MKVL", "MKVA"], &[("a", 1e-10)]),
            chunk(&["query", "b"], &["MKVL", "MKVB"], &[("b", 1e-20)]),
            chunk(&["query"], &["MKVL"], &[]),
        ];
        let track = assemble_database_hits(&DATABASES[1], &chunks).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(
            track
                .names
                .as_ref()
                .unwrap()
                .iter()
                .filter(|n| *n == "query")
                .count(),
            1
        );
    }

    #[test]
    fn capped_databases_are_truncated_after_sorting() {
        let mgnify = DatabaseSpec {
            max_hits: Some(3),
            ..DATABASES[2]
        };
        let chunks = vec![chunk(
            &["query", "a", "b", "c", "d"],
            &["MKVL", "MKVA", "MKVB", "MKVC", "MKVD"],
            &[("a", 1e-4), ("b", 1e-40), ("c", 1e-2), ("d", 1e-20)],
        )];
        let track = assemble_database_hits(&mgnify, &chunks).unwrap();
        assert_eq!(track.names.as_ref().unwrap(), &["query", "b", "d"]);
    }

    #[test]
    fn mgnify_keeps_the_501_most_significant_rows_of_600_hits() {
        let names: Vec<String> = std::iter::once("query".to_string())
            .chain((0..600).map(|i| format!("h{i}")))
            .collect();
        let chunk = ChunkResult {
            alignment: ParsedAlignment {
                rows: vec!["MKVL".to_string(); 601],
                deletions: vec![vec![0; 4]; 601],
                names: names.clone(),
            },
            // Later hits are more significant, so sorting must reverse
            // the input order before the cap is applied.
            e_values: (0..600)
                .map(|i| (format!("h{i}"), (600 - i) as f64 * 1e-9))
                .collect(),
        };

        let track = assemble_database_hits(&DATABASES[2], &[chunk]).unwrap();
        assert_eq!(track.len(), 501);
        let kept = track.names.unwrap();
        assert_eq!(kept[0], "query");
        assert_eq!(kept[1], "h599");
        assert_eq!(kept[500], "h100");
        assert!(!kept.contains(&"h99".to_string()));
    }

    #[test]
    fn hits_missing_from_the_significance_table_sort_last() {
        let chunks = vec![chunk(
            &["query", "unscored", "scored"],
            &["MKVL", "MKVU", "MKVS"],
            &[("scored", 1e-3)],
        )];
        let track = assemble_database_hits(&DATABASES[0], &chunks).unwrap();
        assert_eq!(
            track.names.as_ref().unwrap(),
            &["query", "scored", "unscored"]
        );
    }

    #[test]
    fn chunk_urls_carry_the_mirror_suffix() {
        assert_eq!(
            chunk_url("-europe", &DATABASES[0], 3),
            "https://storage.googleapis.com/alphafold-colab-europe/latest/uniref90_2021_03.fasta.3"
        );
        assert_eq!(
            chunk_url("", &DATABASES[2], 71),
            "https://storage.googleapis.com/alphafold-colab/latest/mgy_clusters_2019_05.fasta.71"
        );
    }
}
