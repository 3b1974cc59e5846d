use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Failed to read config file: {0}")]
    Io(String),

    #[error("Failed to parse config file: {0}")]
    Toml(String),
}

/// MSA-retrieval strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsaMethod {
    /// Load a previously written job snapshot bundle.
    Precomputed,
    /// No search at all; the query is its own single-row alignment.
    SingleSequence,
    /// Batch request against the remote search service.
    Mmseqs2,
    /// Streamed chunk search with the external search tool.
    Jackhmmer,
}

/// Whether and how to combine per-chain alignments for a complex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairMode {
    Unpaired,
    UnpairedPaired,
    Paired,
}

impl PairMode {
    pub fn wants_unpaired(&self) -> bool {
        matches!(self, PairMode::Unpaired | PairMode::UnpairedPaired)
    }

    pub fn wants_paired(&self) -> bool {
        matches!(self, PairMode::Paired | PairMode::UnpairedPaired)
    }
}

/// Inclusion thresholds and redundancy handling for cross-chain pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Minimum fractional query coverage for a hit to be pairable.
    pub min_coverage: f64,
    /// Minimum fractional identity to the query for a hit to be pairable.
    pub min_identity: f64,
    /// Identity threshold (percent) handed to the redundancy filter tool.
    pub redundancy_identity: u8,
    /// When false the redundancy-filter result is reported but not applied,
    /// matching the historical behavior; when true non-survivors are dropped.
    pub apply_redundancy_filter: bool,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            min_coverage: 0.75,
            min_identity: 0.15,
            redundancy_identity: 90,
            apply_redundancy_filter: false,
        }
    }
}

/// Positional trim pass: comma-separated ranges such as `5-100,B10-B50`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimConfig {
    pub ranges: String,
    /// Retain the complement of the listed ranges instead.
    #[serde(default)]
    pub inverse: bool,
}

/// Coverage/identity row filter applied to assembled tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFilterConfig {
    pub min_coverage: f64,
    pub min_identity: f64,
}

/// Bounded retries with linear backoff for network-dependent steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 2,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Timeout for each mirror probe.
    pub probe_timeout_secs: u64,
    /// Timeout for database-chunk and search-service requests.
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 30,
            request_timeout_secs: 600,
            retry: RetryConfig::default(),
        }
    }
}

impl NetworkConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Complete configuration of the preparation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepConfig {
    pub msa_method: MsaMethod,
    pub pair_mode: PairMode,
    pub pairing: PairingConfig,
    /// Snapshot file consumed by the precomputed method.
    pub precomputed: Option<PathBuf>,
    /// Optional A3M file appended as an extra track after retrieval.
    pub custom_msa: Option<PathBuf>,
    pub trim: Option<TrimConfig>,
    pub row_filter: Option<RowFilterConfig>,
    /// Fast mode skips the all-zero template placeholders.
    pub fast_mode: bool,
    pub subsample_seed: u64,
    pub cache_dir: PathBuf,
    pub network: NetworkConfig,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            msa_method: MsaMethod::SingleSequence,
            pair_mode: PairMode::Unpaired,
            pairing: PairingConfig::default(),
            precomputed: None,
            custom_msa: None,
            trim: None,
            row_filter: None,
            fast_mode: true,
            subsample_seed: 0,
            cache_dir: PathBuf::from(".foldprep_cache"),
            network: NetworkConfig::default(),
        }
    }
}

impl PrepConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&text).map_err(|e| ConfigError::Toml(e.to_string()))
    }
}

#[derive(Default)]
pub struct PrepConfigBuilder {
    msa_method: Option<MsaMethod>,
    pair_mode: Option<PairMode>,
    pairing: Option<PairingConfig>,
    precomputed: Option<PathBuf>,
    custom_msa: Option<PathBuf>,
    trim: Option<TrimConfig>,
    row_filter: Option<RowFilterConfig>,
    fast_mode: Option<bool>,
    subsample_seed: Option<u64>,
    cache_dir: Option<PathBuf>,
    network: Option<NetworkConfig>,
}

impl PrepConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn msa_method(mut self, method: MsaMethod) -> Self {
        self.msa_method = Some(method);
        self
    }
    pub fn pair_mode(mut self, mode: PairMode) -> Self {
        self.pair_mode = Some(mode);
        self
    }
    pub fn pairing(mut self, pairing: PairingConfig) -> Self {
        self.pairing = Some(pairing);
        self
    }
    pub fn precomputed(mut self, path: PathBuf) -> Self {
        self.precomputed = Some(path);
        self
    }
    pub fn custom_msa(mut self, path: PathBuf) -> Self {
        self.custom_msa = Some(path);
        self
    }
    pub fn trim(mut self, trim: TrimConfig) -> Self {
        self.trim = Some(trim);
        self
    }
    pub fn row_filter(mut self, filter: RowFilterConfig) -> Self {
        self.row_filter = Some(filter);
        self
    }
    pub fn fast_mode(mut self, fast: bool) -> Self {
        self.fast_mode = Some(fast);
        self
    }
    pub fn subsample_seed(mut self, seed: u64) -> Self {
        self.subsample_seed = Some(seed);
        self
    }
    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }
    pub fn network(mut self, network: NetworkConfig) -> Self {
        self.network = Some(network);
        self
    }

    pub fn build(self) -> Result<PrepConfig, ConfigError> {
        let defaults = PrepConfig::default();
        Ok(PrepConfig {
            msa_method: self
                .msa_method
                .ok_or(ConfigError::MissingParameter("msa_method"))?,
            pair_mode: self.pair_mode.unwrap_or(defaults.pair_mode),
            pairing: self.pairing.unwrap_or(defaults.pairing),
            precomputed: self.precomputed,
            custom_msa: self.custom_msa,
            trim: self.trim,
            row_filter: self.row_filter,
            fast_mode: self.fast_mode.unwrap_or(defaults.fast_mode),
            subsample_seed: self.subsample_seed.unwrap_or(defaults.subsample_seed),
            cache_dir: self
                .cache_dir
                .ok_or(ConfigError::MissingParameter("cache_dir"))?,
            network: self.network.unwrap_or(defaults.network),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_method_and_cache_dir() {
        let err = PrepConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("msa_method"));

        let err = PrepConfigBuilder::new()
            .msa_method(MsaMethod::SingleSequence)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("cache_dir"));
    }

    #[test]
    fn pair_mode_flags() {
        assert!(PairMode::UnpairedPaired.wants_unpaired());
        assert!(PairMode::UnpairedPaired.wants_paired());
        assert!(!PairMode::Paired.wants_unpaired());
        assert!(!PairMode::Unpaired.wants_paired());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = PrepConfig {
            msa_method: MsaMethod::Jackhmmer,
            pair_mode: PairMode::UnpairedPaired,
            ..PrepConfig::default()
        };
        let text = toml::to_string(&config).unwrap();
        let parsed: PrepConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: PrepConfig = toml::from_str("msa_method = \"mmseqs2\"").unwrap();
        assert_eq!(parsed.msa_method, MsaMethod::Mmseqs2);
        assert_eq!(parsed.pair_mode, PairMode::Unpaired);
        assert_eq!(parsed.network.retry.max_attempts, 3);
    }
}
