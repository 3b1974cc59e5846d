//! Data models shared across the pipeline stages.
//!
//! - [`job`] - the immutable job description derived from raw user input
//! - [`alignment`] - MSA tracks and full-width padding over the chain layout
//! - [`features`] - the final named feature tensors
//! - [`prediction`] - raw and parsed structure-prediction results

pub mod alignment;
pub mod features;
pub mod job;
pub mod prediction;
