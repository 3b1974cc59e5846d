use ndarray::{Array1, Array2, Array3, Array4};

/// Residue-type order used for all numeric encodings.
pub const RESTYPES: [char; 20] = [
    'A', 'R', 'N', 'D', 'C', 'Q', 'E', 'G', 'H', 'I', 'L', 'K', 'M', 'F', 'P', 'S', 'T', 'W', 'Y',
    'V',
];

/// Index of the unknown residue `X`.
pub const UNKNOWN_INDEX: i32 = 20;
/// Index of the alignment gap `-`, used only in MSA rows.
pub const GAP_INDEX: i32 = 21;
/// One-hot width of the sequence encoding (20 residues + X).
pub const NUM_SEQUENCE_TYPES: usize = 21;

/// Map a residue character to its numeric index; anything unrecognized maps
/// to `X`.
pub fn aa_index(aa: char) -> i32 {
    if aa == '-' {
        return GAP_INDEX;
    }
    RESTYPES
        .iter()
        .position(|&r| r == aa)
        .map_or(UNKNOWN_INDEX, |i| i as i32)
}

/// All-zero template features of fixed shape, inserted when fast mode is off
/// so the downstream model sees the template slots it expects.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFeatures {
    pub template_aatype: Array3<f32>,
    pub template_all_atom_masks: Array3<f32>,
    pub template_all_atom_positions: Array4<f32>,
    pub template_domain_names: Vec<String>,
    pub template_sum_probs: Array1<f32>,
}

impl TemplateFeatures {
    pub fn placeholder(num_templates: usize, num_res: usize) -> Self {
        Self {
            template_aatype: Array3::zeros((num_templates, num_res, 22)),
            template_all_atom_masks: Array3::zeros((num_templates, num_res, 37)),
            template_all_atom_positions: Array4::zeros((num_templates, num_res, 37, 3)),
            template_domain_names: vec![String::new(); num_templates],
            template_sum_probs: Array1::zeros(num_templates),
        }
    }
}

/// The final numeric tensor set handed to the prediction model.
///
/// `residue_index` strictly increases within a sub-unit and jumps by the full
/// combined sequence length at every sub-unit boundary, so physically
/// separate chains are never treated as covalently continuous.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDict {
    /// One-hot sequence encoding, shape `[L, 21]`.
    pub aatype: Array2<f32>,
    /// Zeros, shape `[L]`; kept for model-input compatibility.
    pub between_segment_residues: Array1<i32>,
    pub domain_name: String,
    /// Chain-break-aware residue numbering, shape `[L]`.
    pub residue_index: Array1<i32>,
    /// Total length `L` repeated per residue, shape `[L]`.
    pub seq_length: Array1<i32>,
    pub sequence: String,
    /// Deduplicated MSA stack, shape `[N, L]`; row 0 is the query.
    pub msa: Array2<i32>,
    /// Deletion counts matching `msa`, shape `[N, L]`.
    pub deletion_matrix_int: Array2<i32>,
    /// Row count `N` repeated per residue, shape `[L]`.
    pub num_alignments: Array1<i32>,
    /// Present only when fast mode is off.
    pub templates: Option<TemplateFeatures>,
}

impl FeatureDict {
    pub fn num_residues(&self) -> usize {
        self.residue_index.len()
    }

    pub fn num_rows(&self) -> usize {
        self.msa.nrows()
    }
}
