//! TOML configuration
//!
//! Every section defaults independently, so a file only needs the keys it
//! overrides:
//!
//! ```toml
//! [propagation]
//! decay = 0.9
//!
//! [scoring]
//! traversal = "outgoing"
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use vouch_core::{PropagationConfig, Traversal, DEFAULT_DEPTH, DEFAULT_MAX_HOPS};
use vouch_sources::{ActivityConfig, AttestationConfig};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Aggregator settings
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Neighborhood radius when the caller gives none
    pub default_depth: usize,
    /// Hop limit for path queries when the caller gives none
    pub default_max_hops: usize,
    /// Edge orientations followed when extracting the scoring neighborhood
    pub traversal: Traversal,
    /// Weight of the network trust factor
    pub graph_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_depth: DEFAULT_DEPTH,
            default_max_hops: DEFAULT_MAX_HOPS,
            traversal: Traversal::Both,
            graph_weight: 0.4,
        }
    }
}

impl ScoringConfig {
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.default_depth = depth;
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VouchConfig {
    pub propagation: PropagationConfig,
    pub scoring: ScoringConfig,
    pub attestation: AttestationConfig,
    pub activity: ActivityConfig,
}

impl VouchConfig {
    /// Load from a TOML file; a missing file yields defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}
