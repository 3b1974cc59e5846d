//! Prediction-result analysis and persistence.
//!
//! The model itself sits behind [`StructurePredictor`]; this module turns
//! its raw per-residue output into distance and contact matrices plus
//! summary statistics, and writes the unrelaxed structure to disk.

use crate::core::models::features::FeatureDict;
use crate::core::models::prediction::{ParsedPrediction, PredictControls, RawPrediction};
use crate::engine::error::EngineError;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tracing::info;

/// Distance below which two residues are counted as in contact.
const CONTACT_CUTOFF: f32 = 8.0;

/// Opaque structure-prediction model.
pub trait StructurePredictor {
    fn predict(
        &self,
        features: &FeatureDict,
        controls: &PredictControls,
    ) -> Result<RawPrediction, EngineError>;
}

/// Derive the analyzable view of a raw prediction.
///
/// Bin centers are the distogram edges with a leading zero. The distance
/// matrix takes the most likely bin per residue pair; the contact matrix
/// sums the softmax probability mass of all bins under the cutoff.
pub fn parse_prediction(raw: &RawPrediction) -> Result<ParsedPrediction, EngineError> {
    let shape = raw.distogram_logits.shape();
    let (rows, cols, num_bins) = (shape[0], shape[1], shape[2]);
    let mut bins = Vec::with_capacity(num_bins);
    bins.push(0.0f32);
    bins.extend(raw.distogram_bin_edges.iter().copied());
    if bins.len() != num_bins {
        return Err(EngineError::Internal(format!(
            "distogram has {num_bins} bins but {} edges",
            raw.distogram_bin_edges.len()
        )));
    }

    let mut distances = Array2::zeros((rows, cols));
    let mut contacts = Array2::zeros((rows, cols));
    for i in 0..rows {
        for j in 0..cols {
            let logits = raw.distogram_logits.slice(ndarray::s![i, j, ..]);

            let mut best = 0;
            for b in 1..num_bins {
                if logits[b] > logits[best] {
                    best = b;
                }
            }
            distances[[i, j]] = bins[best];

            let max_logit = logits[best];
            let mut total = 0.0f32;
            let mut near = 0.0f32;
            for b in 0..num_bins {
                let p = (logits[b] - max_logit).exp();
                total += p;
                if bins[b] < CONTACT_CUTOFF {
                    near += p;
                }
            }
            contacts[[i, j]] = near / total;
        }
    }

    let mean_plddt = if raw.plddt.is_empty() {
        0.0
    } else {
        raw.plddt.sum() / raw.plddt.len() as f32
    };
    Ok(ParsedPrediction {
        plddt: raw.plddt.clone(),
        mean_plddt,
        distances,
        contacts,
        pae: raw.predicted_aligned_error.clone(),
        ptm: raw.ptm,
        pdb: raw.pdb.clone(),
        recycles: raw.recycles,
        tolerance: raw.tolerance,
    })
}

/// Persist the unrelaxed structure under its model key.
pub fn write_unrelaxed_pdb(
    output_dir: &Path,
    key: &str,
    prediction: &ParsedPrediction,
) -> std::io::Result<PathBuf> {
    let path = output_dir.join(format!("unranked_{key}_unrelaxed.pdb"));
    std::fs::write(&path, &prediction.pdb)?;
    Ok(path)
}

/// One summary line per model, mirroring the per-model report table.
pub fn log_summary(key: &str, prediction: &ParsedPrediction) {
    info!(
        model = key,
        mean_plddt = format!("{:.1}", prediction.mean_plddt),
        ptm = prediction.ptm.map(|p| format!("{p:.3}")),
        recycles = prediction.recycles,
        tolerance = format!("{:.2}", prediction.tolerance),
        "Prediction finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    fn raw_with_logits(logits: Array3<f32>, edges: Vec<f32>) -> RawPrediction {
        RawPrediction {
            plddt: Array1::from(vec![90.0, 70.0]),
            distogram_logits: logits,
            distogram_bin_edges: Array1::from(edges),
            predicted_aligned_error: None,
            ptm: Some(0.82),
            pdb: "END\n".to_string(),
            recycles: 2,
            tolerance: 0.5,
        }
    }

    #[test]
    fn distances_take_the_most_likely_bin() {
        // Bins: [0, 4, 10]. Pair (0,1) peaks in the last bin.
        let mut logits = Array3::zeros((2, 2, 3));
        logits[[0, 1, 2]] = 5.0;
        logits[[1, 0, 1]] = 5.0;
        let parsed = parse_prediction(&raw_with_logits(logits, vec![4.0, 10.0])).unwrap();
        assert_eq!(parsed.distances[[0, 1]], 10.0);
        assert_eq!(parsed.distances[[1, 0]], 4.0);
        assert_eq!(parsed.distances[[0, 0]], 0.0);
    }

    #[test]
    fn contacts_sum_probability_mass_below_the_cutoff() {
        // With uniform logits, two of three bins lie under 8 Angstroms.
        let logits = Array3::zeros((1, 1, 3));
        let parsed = parse_prediction(&raw_with_logits(logits, vec![4.0, 10.0])).unwrap();
        assert!((parsed.contacts[[0, 0]] - 2.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn strongly_peaked_logits_give_confident_contacts() {
        let mut logits = Array3::zeros((1, 1, 3));
        logits[[0, 0, 0]] = 20.0;
        let parsed = parse_prediction(&raw_with_logits(logits, vec![4.0, 10.0])).unwrap();
        assert!(parsed.contacts[[0, 0]] > 0.999);
    }

    #[test]
    fn mean_plddt_and_passthrough_fields() {
        let parsed =
            parse_prediction(&raw_with_logits(Array3::zeros((2, 2, 3)), vec![4.0, 10.0])).unwrap();
        assert_eq!(parsed.mean_plddt, 80.0);
        assert_eq!(parsed.ptm, Some(0.82));
        assert_eq!(parsed.recycles, 2);
    }

    #[test]
    fn mismatched_bin_edges_are_an_error() {
        let raw = raw_with_logits(Array3::zeros((1, 1, 3)), vec![4.0]);
        assert!(parse_prediction(&raw).is_err());
    }

    #[test]
    fn unrelaxed_pdb_lands_under_the_model_key() {
        let dir = tempfile::tempdir().unwrap();
        let parsed =
            parse_prediction(&raw_with_logits(Array3::zeros((1, 1, 3)), vec![4.0, 10.0])).unwrap();
        let path = write_unrelaxed_pdb(dir.path(), "model_1", &parsed).unwrap();
        assert_eq!(path.file_name().unwrap(), "unranked_model_1_unrelaxed.pdb");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "END\n");
    }
}
