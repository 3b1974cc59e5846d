use super::AlignmentBackend;
use crate::core::models::alignment::{AlignmentSet, AlignmentTrack};
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;

/// No search at all: each chain is its own single-row alignment. Useful for
/// fast exploratory runs and for sequences with no homologs.
#[derive(Debug, Default)]
pub struct SingleSequenceBackend;

impl AlignmentBackend for SingleSequenceBackend {
    fn fetch(
        &self,
        chains: &[String],
        _reporter: &ProgressReporter,
    ) -> Result<Vec<AlignmentSet>, EngineError> {
        Ok(chains
            .iter()
            .map(|chain| AlignmentSet::new(vec![AlignmentTrack::query_only(chain)]))
            .collect())
    }
}
