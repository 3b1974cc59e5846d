//! Alignment file-format I/O.
//!
//! Thin, replaceable parsing layer for the formats the pipeline consumes:
//! Stockholm blocks and significance tables streamed from the search tool,
//! A3M blobs returned by the remote search service, and FASTA scratch files
//! used by the redundancy filter. Everything here parses into
//! [`ParsedAlignment`], the chain-local shape shared by all backends.

pub mod a3m;
pub mod fasta;
pub mod stockholm;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Empty alignment input")]
    Empty,

    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    #[error("Alignment rows have inconsistent lengths (expected {expected}, found {found})")]
    RaggedAlignment { expected: usize, found: usize },
}

/// A parsed, chain-local alignment: rows are aligned to the query (row 0),
/// every row has the same width, and `deletions[i][j]` counts the residues
/// of row `i` deleted immediately before query column `j`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAlignment {
    pub rows: Vec<String>,
    pub deletions: Vec<Vec<i32>>,
    pub names: Vec<String>,
}

impl ParsedAlignment {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Width of the alignment (query length). Zero when empty.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }
}
