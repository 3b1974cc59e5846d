use crate::core::utils::hash::short_hash;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Above this total length a typical accelerator session runs out of memory;
/// exceeding it is a warning, not an error.
const MAX_ADVISED_LENGTH: usize = 1400;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("Sequence is empty after normalization")]
    EmptySequence,
}

/// Immutable description of one preparation job, derived once from raw user
/// input. All derived fields are consistent by construction:
/// `chains.len() == multiplicities.len()`, `lengths[i] == chains[i].len()`,
/// and `full_sequence` is each chain repeated by its multiplicity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job_name: String,
    /// Normalized sequence with `:` chain separators and `/` domain breaks.
    pub ori_sequence: String,
    /// `ori_sequence` with all separators removed.
    pub sequence: String,
    /// One entry per chain, separators removed.
    pub chains: Vec<String>,
    /// Per-chain oligomer multiplicity, reconciled to `chains.len()`.
    pub multiplicities: Vec<usize>,
    /// Each chain repeated by its multiplicity, concatenated.
    pub full_sequence: String,
    pub lengths: Vec<usize>,
    pub output_dir: PathBuf,
}

impl JobSpec {
    /// Normalize raw sequence/oligomer/job-name strings into a job.
    ///
    /// The output directory is keyed by a content hash of the full expanded
    /// sequence, so the same input always maps to the same directory.
    pub fn new(
        raw_sequence: &str,
        raw_oligomer: &str,
        raw_job_name: &str,
        base_dir: &Path,
    ) -> Result<Self, JobError> {
        let ori_sequence = normalize_sequence(raw_sequence);
        if ori_sequence.is_empty() {
            return Err(JobError::EmptySequence);
        }
        let job_name = sanitize_job_name(raw_job_name);
        let oligomer = normalize_oligomer(raw_oligomer);
        let multiplicities: Vec<usize> = oligomer
            .split(':')
            .filter_map(|h| h.parse::<usize>().ok())
            .map(|h| h.max(1))
            .collect();
        Self::from_parts(&ori_sequence, multiplicities, &job_name, base_dir, None)
    }

    /// Rebuild a job from an already-normalized `ori_sequence`, reusing an
    /// existing output directory when given. Used by the positional trim
    /// transform, which recomputes every derived field.
    pub fn from_parts(
        ori_sequence: &str,
        multiplicities: Vec<usize>,
        job_name: &str,
        base_dir: &Path,
        output_dir: Option<PathBuf>,
    ) -> Result<Self, JobError> {
        let chains: Vec<String> = ori_sequence
            .replace('/', "")
            .split(':')
            .map(str::to_string)
            .collect();
        if chains.iter().all(|c| c.is_empty()) {
            return Err(JobError::EmptySequence);
        }
        let multiplicities = reconcile_multiplicities(multiplicities, chains.len());

        let sequence: String = chains.concat();
        let full_sequence: String = chains
            .iter()
            .zip(&multiplicities)
            .map(|(c, &h)| c.repeat(h))
            .collect();
        let lengths: Vec<usize> = chains.iter().map(String::len).collect();

        if full_sequence.len() > MAX_ADVISED_LENGTH {
            warn!(
                total_length = full_sequence.len(),
                limit = MAX_ADVISED_LENGTH,
                "Total modeled length exceeds the advised maximum; prediction may run out of memory"
            );
        }

        let output_dir = output_dir.unwrap_or_else(|| {
            base_dir.join(format!(
                "prediction_{}_{}",
                job_name,
                short_hash(&full_sequence)
            ))
        });

        Ok(Self {
            job_name: job_name.to_string(),
            ori_sequence: ori_sequence.to_string(),
            sequence,
            chains,
            multiplicities,
            full_sequence,
            lengths,
            output_dir,
        })
    }

    /// Create the output directory; idempotent. With `clean`, files left by a
    /// previous run of the same job are removed first.
    pub fn ensure_output_dir(&self, clean: bool) -> std::io::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        if clean {
            for entry in fs::read_dir(&self.output_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(())
    }
}

/// Uppercase, strip everything outside `A-Z:/`, collapse runs of the same
/// separator, and trim leading/trailing separators.
pub fn normalize_sequence(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let ch = ch.to_ascii_uppercase();
        if !(ch.is_ascii_uppercase() || ch == ':' || ch == '/') {
            continue;
        }
        if (ch == ':' || ch == '/') && out.ends_with(ch) {
            continue;
        }
        out.push(ch);
    }
    out.trim_matches(|c| c == ':' || c == '/').to_string()
}

/// Keep digits, collapse separator runs to `:`, trim, default to `"1"`.
pub fn normalize_oligomer(raw: &str) -> String {
    let mut out = String::new();
    for ch in raw.chars() {
        if ch == ':' || ch == '/' {
            if !out.ends_with(':') {
                out.push(':');
            }
        } else if ch.is_ascii_digit() {
            out.push(ch);
        }
    }
    let out = out.trim_matches(':').to_string();
    if out.is_empty() { "1".to_string() } else { out }
}

/// Strip non-word characters from the job name.
pub fn sanitize_job_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Reconcile the multiplicity list with the chain count: broadcast a single
/// value, otherwise pad with `1` or truncate, warning on any mismatch.
fn reconcile_multiplicities(mut multiplicities: Vec<usize>, num_chains: usize) -> Vec<usize> {
    if multiplicities.is_empty() {
        multiplicities.push(1);
    }
    if multiplicities.len() == num_chains {
        return multiplicities;
    }
    if multiplicities.len() == 1 {
        return vec![multiplicities[0]; num_chains];
    }
    warn!(
        chains = num_chains,
        oligomer_values = multiplicities.len(),
        "Mismatch between chain count and oligomer definition; padding/truncating to match"
    );
    multiplicities.resize(num_chains, 1);
    multiplicities
}
