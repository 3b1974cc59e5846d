use crate::core::io::ParseError;
use crate::core::models::job::JobError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or inconsistent user-supplied input; aborts the run.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Job(#[from] JobError),

    /// Every mirror probe failed; the run cannot proceed.
    #[error("All {attempted} database mirror probes failed; no mirror reachable")]
    AllMirrorsFailed { attempted: usize },

    #[error("Network request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("Alignment parsing failed: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("External tool '{tool}' failed: {message}")]
    Tool {
        tool: &'static str,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Transient failures worth retrying with backoff; everything else
    /// surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Network { .. })
    }
}
