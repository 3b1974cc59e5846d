//! Interchangeable MSA-retrieval strategies.
//!
//! Every backend produces the same shape of result (one [`AlignmentSet`] per
//! chain), so the rest of the pipeline is indifferent to where alignments
//! came from.

use super::error::EngineError;
use super::progress::ProgressReporter;
use crate::core::models::alignment::AlignmentSet;

pub mod jackhmmer;
pub mod mmseqs;
pub mod precomputed;
pub mod single;

/// A source of per-chain alignments. Implementations are expected to be
/// cache-aware: a chain that was retrieved before should not hit the network
/// again.
pub trait AlignmentBackend {
    fn fetch(
        &self,
        chains: &[String],
        reporter: &ProgressReporter,
    ) -> Result<Vec<AlignmentSet>, EngineError>;
}
