//! Node configuration with TOML file support.

use crate::pool_synchronizer::SyncConfig;
use crate::NodeError;
use conclave_types::ConsensusParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a conclave node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File holding the Base58 public key of this node.
    #[serde(default = "default_public_key_file")]
    pub public_key_file: PathBuf,

    /// File holding the Base58 private key of this node.
    #[serde(default = "default_private_key_file")]
    pub private_key_file: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Consensus timing and sizing parameters.
    #[serde(default)]
    pub consensus: ConsensusParams,

    /// Pool synchronizer tuning.
    #[serde(default)]
    pub sync: SyncConfig,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./conclave_data")
}

fn default_public_key_file() -> PathBuf {
    PathBuf::from("NodePublic.txt")
}

fn default_private_key_file() -> PathBuf {
    PathBuf::from("NodePrivate.txt")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            public_key_file: default_public_key_file(),
            private_key_file: default_private_key_file(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            consensus: ConsensusParams::default(),
            sync: SyncConfig::default(),
        }
    }
}
