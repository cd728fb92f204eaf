//! Validator configuration and first-boot key provisioning.
//!
//! Configuration lives in a coordinator-issued JSON document
//! (`configs/validator_config.json` by default), loaded through the
//! `config` crate so `PAIRCHAIN_*` environment variables can override
//! individual values (`PAIRCHAIN_DATABASE__NAME` style for nested
//! keys). Binary flags layer on top of the parsed result.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use pairchain_core::crypto::NodeSigner;

use crate::error::NodeError;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "configs/validator_config.json";

/// Configuration for one validator node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    /// Stable validator identity, assigned by the coordinator.
    pub node_id: String,
    /// Address advertised in heartbeats.
    #[serde(default = "default_address")]
    pub address: String,
    /// Advertised port, kept as a string because the coordinator echoes
    /// it verbatim.
    #[serde(default = "default_port")]
    pub port: String,
    /// Inline PEM private key. When absent, the key file under
    /// [`NodeConfig::key_path`] is loaded or generated.
    #[serde(default)]
    pub private_key: Option<String>,
    /// Role announced during the handshake.
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub owner_actor: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Coordinator TCP endpoint as `host:port`.
    #[serde(default = "default_coordinator_addr")]
    pub coordinator_addr: String,
    /// Loopback bind for the debug HTTP surface; `None` disables it.
    #[serde(default = "default_debug_bind")]
    pub debug_bind: Option<String>,
    /// Root directory for the chain database and key file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Consecutive failed connects tolerated before the node gives up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Log level filter string (e.g. "info", "pairchain_node=debug").
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Chain database settings. Only `name` is consulted; `host`/`port`
/// belong to the issued config shape and name a document store this
/// node does not contact.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_address")]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: default_db_name(),
            host: default_address(),
            port: 0,
        }
    }
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> String {
    "5100".to_string()
}

fn default_role() -> String {
    "validator".to_string()
}

fn default_coordinator_addr() -> String {
    "127.0.0.1:5099".to_string()
}

fn default_debug_bind() -> Option<String> {
    Some("127.0.0.1:5101".to_string())
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pairchain")
}

fn default_max_reconnect_attempts() -> u32 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_name() -> String {
    "chaindata".to_string()
}

impl NodeConfig {
    /// Load from `path` and apply `PAIRCHAIN_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, NodeError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Json))
            .add_source(config::Environment::with_prefix("PAIRCHAIN").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Directory of the RocksDB chain database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.database.name)
    }

    /// Location of the persisted identity key.
    pub fn key_path(&self) -> PathBuf {
        self.data_dir.join("node_key.pem")
    }
}

/// Resolve the signing identity: an inline PEM key wins, else the key
/// file under the data directory is loaded, else a fresh RSA-2048 key
/// is generated and persisted for the next boot.
pub fn provision_signer(config: &NodeConfig) -> Result<NodeSigner, NodeError> {
    if let Some(pem) = config.private_key.as_deref() {
        if !pem.trim().is_empty() {
            return Ok(NodeSigner::from_pem(pem)?);
        }
    }

    let path = config.key_path();
    if path.exists() {
        let pem = std::fs::read_to_string(&path)?;
        return Ok(NodeSigner::from_pem(&pem)?);
    }

    let signer = NodeSigner::generate()?;
    std::fs::create_dir_all(&config.data_dir)?;
    std::fs::write(&path, signer.to_pkcs8_pem()?)?;
    tracing::info!(path = %path.display(), "generated node identity key");
    Ok(signer)
}
