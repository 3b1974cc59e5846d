//! # Core Module
//!
//! This module provides the fundamental building blocks for the input
//! preparation pipeline: the data models that flow between stages, the
//! alignment file-format I/O, and shared utilities.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - `JobSpec`, alignment tracks, feature
//!   tensors, and prediction types
//! - **File I/O** ([`io`]) - Stockholm/A3M/FASTA parsing and writing, plus
//!   jackhmmer significance tables
//! - **Utilities** ([`utils`]) - content hashing for cache keys and output
//!   directories

pub mod io;
pub mod models;
pub mod utils;
