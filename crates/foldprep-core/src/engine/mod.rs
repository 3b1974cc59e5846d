//! # Engine Module
//!
//! The stateful pipeline stages that turn a normalized [`JobSpec`] into the
//! feature tensors the prediction model consumes.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - MSA method, pairing mode, thresholds,
//!   network timeouts and retry policy
//! - **Backends** ([`backends`]) - interchangeable MSA-retrieval strategies
//! - **Caching** ([`cache`]) - persistent per-chain alignment bundles keyed
//!   by content hash
//! - **Mirror Selection** ([`mirror`]) - first-success race over database
//!   mirror probes
//! - **Pairing** ([`pairing`]) - cross-chain stitching by shared source label
//! - **Filtering** ([`filter`]) - positional trimming and coverage/identity
//!   row filtering
//! - **Feature Assembly** ([`features`]) - homo-oligomer expansion, feature
//!   construction, chain-break indexing, subsampling
//! - **Results** ([`results`]) - prediction-result parsing and persistence
//! - **Progress Monitoring** ([`progress`]) - callback-based progress events
//! - **Error Handling** ([`error`]) - engine-wide error taxonomy
//!
//! [`JobSpec`]: crate::core::models::job::JobSpec

pub mod backends;
pub mod cache;
pub mod config;
pub mod error;
pub mod features;
pub mod filter;
pub mod mirror;
pub mod pairing;
pub mod progress;
pub(crate) mod retry;
pub mod results;
