//! # Workflows Module
//!
//! High-level orchestration over the engine stages. [`prepare::run`] is the
//! main entry point: it drives a [`JobSpec`] through retrieval, pairing,
//! filtering, and feature assembly.
//!
//! [`JobSpec`]: crate::core::models::job::JobSpec

pub mod prepare;
