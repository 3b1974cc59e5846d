//! # foldprep Core Library
//!
//! A library for turning raw protein-sequence input into the numeric feature
//! tensors consumed by a structure-prediction model: sequence normalization,
//! multiple-sequence-alignment (MSA) retrieval from interchangeable backends,
//! optional cross-chain pairing, coverage/identity filtering, and final
//! feature assembly.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (`JobSpec`,
//!   `AlignmentSet`, `FeatureDict`), alignment file-format I/O, and small
//!   utilities such as content hashing.
//!
//! - **[`engine`]: The Logic Core.** This stateful layer implements the
//!   pipeline stages: alignment backends, the persistent MSA cache, mirror
//!   selection, cross-chain pairing, input filtering, feature assembly, and
//!   prediction-result parsing.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer.
//!   It ties the `engine` and `core` together to execute the complete input
//!   preparation pipeline from a normalized job to a ready feature set.

pub mod core;
pub mod engine;
pub mod workflows;
