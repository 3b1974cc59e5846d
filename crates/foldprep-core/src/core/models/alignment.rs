use crate::core::io::ParsedAlignment;

/// One MSA track: an ordered set of aligned rows of identical width, the
/// matching deletion matrix, and optionally the source-sequence names.
///
/// Rows of a chain-local track are as wide as the chain; rows of a job-level
/// track span the full concatenated sequence. In a padded job-level track the
/// first row is always the query itself with an all-zero deletion row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentTrack {
    pub rows: Vec<String>,
    pub deletions: Vec<Vec<i32>>,
    pub names: Option<Vec<String>>,
}

impl AlignmentTrack {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Width of the track (length of every row). Zero when empty.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }

    /// True when every row and every deletion row has the track width.
    pub fn is_rectangular(&self) -> bool {
        let width = self.width();
        self.rows.iter().all(|r| r.len() == width)
            && self.deletions.iter().all(|d| d.len() == width)
            && self.rows.len() == self.deletions.len()
    }

    /// A track holding only the query itself.
    pub fn query_only(query: &str) -> Self {
        Self {
            rows: vec![query.to_string()],
            deletions: vec![vec![0; query.len()]],
            names: Some(vec!["query".to_string()]),
        }
    }
}

impl From<ParsedAlignment> for AlignmentTrack {
    fn from(parsed: ParsedAlignment) -> Self {
        Self {
            rows: parsed.rows,
            deletions: parsed.deletions,
            names: Some(parsed.names),
        }
    }
}

/// The alignment tracks retrieved for a single chain, one per contributing
/// database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentSet {
    pub tracks: Vec<AlignmentTrack>,
}

impl AlignmentSet {
    pub fn new(tracks: Vec<AlignmentTrack>) -> Self {
        Self { tracks }
    }

    /// Concatenate all per-database tracks into one track, preserving order.
    pub fn flattened(&self) -> AlignmentTrack {
        let mut rows = Vec::new();
        let mut deletions = Vec::new();
        let mut names = Vec::new();
        for track in &self.tracks {
            rows.extend(track.rows.iter().cloned());
            deletions.extend(track.deletions.iter().cloned());
            match &track.names {
                Some(n) => names.extend(n.iter().cloned()),
                None => names.extend(std::iter::repeat_n(String::new(), track.len())),
            }
        }
        AlignmentTrack {
            rows,
            deletions,
            names: Some(names),
        }
    }
}

/// Positional layout of the chains inside the concatenated query sequence,
/// used to expand chain-local rows to full width.
#[derive(Debug, Clone)]
pub struct ChainLayout {
    lengths: Vec<usize>,
    offsets: Vec<usize>,
    width: usize,
}

impl ChainLayout {
    pub fn new(lengths: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(lengths.len());
        let mut acc = 0;
        for &len in lengths {
            offsets.push(acc);
            acc += len;
        }
        Self {
            lengths: lengths.to_vec(),
            offsets,
            width: acc,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn offset(&self, chain: usize) -> usize {
        self.offsets[chain]
    }

    /// Expand chain-local aligned strings to a full-width row: each placement
    /// lands at its chain's column offset, all other chains are gap-filled.
    pub fn pad_row(&self, placements: &[(usize, &str)]) -> String {
        let mut blanks: Vec<String> = self.lengths.iter().map(|&l| "-".repeat(l)).collect();
        for &(chain, value) in placements {
            blanks[chain] = value.to_string();
        }
        blanks.concat()
    }

    /// Deletion-matrix counterpart of [`pad_row`](Self::pad_row); unmatched
    /// chains contribute all-zero blocks.
    pub fn pad_deletions(&self, placements: &[(usize, &[i32])]) -> Vec<i32> {
        let mut blanks: Vec<Vec<i32>> = self.lengths.iter().map(|&l| vec![0; l]).collect();
        for &(chain, value) in placements {
            blanks[chain] = value.to_vec();
        }
        blanks.concat()
    }
}
