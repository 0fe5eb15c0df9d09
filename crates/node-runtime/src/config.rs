//! # Node Configuration
//!
//! Configuration for one site node: identity, storage location, roster
//! seed and the embedded sequencer tunables.
//!
//! ## Sources
//!
//! 1. TOML file named by `SM_CONFIG` (optional)
//! 2. Environment overrides: `SM_SITE_ID`, `SM_DATA_DIR`, `SM_KEY_SEED`,
//!    `SM_PERIODIC_SECS`
//!
//! ## Security Requirements
//!
//! - `key_seed` MUST NOT be the all-zero default in production

use ism_sequencer::SequencerConfig;
use serde::Deserialize;
use shared_crypto::SiteSigningKey;
use shared_types::{SitePublicKey, SiteId, SiteRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Hex of the all-zero seed.
const ZERO_SEED_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Complete node configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's site id.
    pub site_id: u16,
    /// Hex-encoded 32-byte Ed25519 seed.
    pub key_seed: String,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Seconds between periodic checks.
    pub periodic_secs: u64,
    /// Sites written into the roster on first start.
    pub peers: Vec<PeerConfig>,
    /// Sequencer tunables.
    pub sequencer: SequencerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            site_id: 1,
            key_seed: ZERO_SEED_HEX.to_string(),
            storage: StorageConfig::default(),
            periodic_secs: 30,
            peers: Vec::new(),
            sequencer: SequencerConfig::default(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for held messages, the archive and the roster.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// A peer site known at start-up.
#[derive(Debug, Clone, Deserialize)]
pub struct PeerConfig {
    pub site_id: u16,
    /// Hex-encoded Ed25519 verifying key.
    pub public_key: String,
}

impl PeerConfig {
    /// Roster entry for this peer, with empty watermarks.
    pub fn to_record(&self) -> Result<SiteRecord, ConfigError> {
        let bytes = hex::decode(self.public_key.trim()).map_err(|e| ConfigError::InvalidPeerKey {
            site_id: self.site_id,
            reason: e.to_string(),
        })?;
        let key: SitePublicKey =
            bytes
                .try_into()
                .map_err(|v: Vec<u8>| ConfigError::InvalidPeerKey {
                    site_id: self.site_id,
                    reason: format!("expected 32 bytes, got {}", v.len()),
                })?;
        Ok(SiteRecord::active(SiteId(self.site_id), key))
    }
}

impl NodeConfig {
    /// Loads the TOML file named by `SM_CONFIG`, then applies env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("SM_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parses a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Applies `SM_*` overrides from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("SM_SITE_ID") {
            self.site_id = parse_env("SM_SITE_ID", &value)?;
        }
        if let Some(value) = lookup("SM_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("SM_KEY_SEED") {
            self.key_seed = value;
        }
        if let Some(value) = lookup("SM_PERIODIC_SECS") {
            self.periodic_secs = parse_env("SM_PERIODIC_SECS", &value)?;
        }
        Ok(())
    }

    /// The local site's signing key.
    pub fn signing_key(&self) -> Result<SiteSigningKey, ConfigError> {
        SiteSigningKey::from_hex_seed(&self.key_seed)
            .map_err(|e| ConfigError::InvalidKeySeed(e.to_string()))
    }

    /// Validate configuration for production readiness.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - the key seed is the default zero value
    /// - the site id is zero
    /// - the periodic interval is zero
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.key_seed.trim() == ZERO_SEED_HEX {
            return Err(ConfigError::InsecureKeySeed);
        }
        if self.site_id == 0 {
            return Err(ConfigError::InvalidSiteId);
        }
        if self.periodic_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "periodic_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name,
        reason: e.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "SECURITY VIOLATION: key seed is the default zero value. \
         Set SM_KEY_SEED environment variable or provide key_seed in config."
    )]
    InsecureKeySeed,

    #[error("Site id 0 is reserved")]
    InvalidSiteId,

    #[error("Invalid key seed: {0}")]
    InvalidKeySeed(String),

    #[error("Invalid public key for peer {site_id}: {reason}")]
    InvalidPeerKey { site_id: u16, reason: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Cannot read {path:?}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Cannot parse configuration: {0}")]
    Parse(String),
}
