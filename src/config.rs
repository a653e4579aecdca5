//! Config (C9): the enumerated options the core recognizes (§6), grouped
//! the way the original's `get_defaults()` groups them.
//!
//! Structure, `Default` impls, and `from_file`/`to_file` via `toml` are
//! carried over verbatim in style from this codebase's own `config.rs`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::content::P2pClientKind;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlephConfig {
    pub queue_topic: String,
    pub host: String,
    pub port: u16,
}

impl Default for AlephConfig {
    fn default() -> Self {
        Self {
            queue_topic: "ALEPH-QUEUE".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://127.0.0.1:27006".to_string(),
            database: "aleph".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpfsConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            // The original's defaults dict has no top-level `ipfs.enabled`
            // key; the rest of the source treats IPFS as opt-in
            // (`app["config"].ipfs.enabled.value`), so this stays disabled
            // until the operator turns it on.
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 5001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct P2pConfig {
    pub clients: HashSet<P2pClientKind>,
}

impl Default for P2pConfig {
    fn default() -> Self {
        let mut clients = HashSet::new();
        clients.insert(P2pClientKind::Protocol);
        clients.insert(P2pClientKind::Http);
        Self { clients }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NulsConfig {
    pub chain_id: u32,
    pub packing_node: bool,
    pub private_key: Option<String>,
}

impl Default for NulsConfig {
    fn default() -> Self {
        Self {
            chain_id: 8964,
            packing_node: false,
            private_key: None,
        }
    }
}

impl Drop for NulsConfig {
    fn drop(&mut self) {
        if let Some(key) = self.private_key.as_mut() {
            key.zeroize();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    pub aleph: AlephConfig,
    pub mongodb: MongoConfig,
    pub ipfs: IpfsConfig,
    pub p2p: P2pConfig,
    pub nuls: NulsConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("./data"))
            .join("aleph-node")
    }

    pub fn default_config_file() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "parse error: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "serialize error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
