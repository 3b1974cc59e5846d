use ndarray::{Array1, Array2, Array3};

/// Iteration controls forwarded to the structure-prediction model.
#[derive(Debug, Clone, Copy)]
pub struct PredictControls {
    pub random_seed: u64,
    pub num_recycles: usize,
}

impl Default for PredictControls {
    fn default() -> Self {
        Self {
            random_seed: 0,
            num_recycles: 3,
        }
    }
}

/// Raw per-residue output of the prediction model, before analysis.
///
/// The PDB text is opaque to this crate; it is persisted as-is.
#[derive(Debug, Clone)]
pub struct RawPrediction {
    /// Per-residue confidence, shape `[L]`.
    pub plddt: Array1<f32>,
    /// Distogram logits, shape `[L, L, B]`.
    pub distogram_logits: Array3<f32>,
    /// Distogram bin upper edges, shape `[B - 1]`.
    pub distogram_bin_edges: Array1<f32>,
    /// Predicted aligned error, shape `[L, L]`; pTM models only.
    pub predicted_aligned_error: Option<Array2<f32>>,
    /// Global predicted TM-score; pTM models only.
    pub ptm: Option<f32>,
    /// Unrelaxed structure in PDB format.
    pub pdb: String,
    pub recycles: usize,
    pub tolerance: f32,
}

/// Analyzable numeric view of a prediction.
#[derive(Debug, Clone)]
pub struct ParsedPrediction {
    pub plddt: Array1<f32>,
    pub mean_plddt: f32,
    /// Discretized distance matrix from the distogram argmax, shape `[L, L]`.
    pub distances: Array2<f32>,
    /// Probability of contact within 8 Å, shape `[L, L]`.
    pub contacts: Array2<f32>,
    pub pae: Option<Array2<f32>>,
    pub ptm: Option<f32>,
    pub pdb: String,
    pub recycles: usize,
    pub tolerance: f32,
}
