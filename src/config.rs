//! Vault configuration.
//!
//! Defines the user-configurable settings. The host application builds a
//! [`VaultConfig`] (usually from a JSON file) and hands it to the
//! orchestrator; nothing in the library reads the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::DEFAULT_ITERATIONS;

/// Errors from loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main configuration of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Ledger address that holds the secret log.
    pub own_address: String,

    /// Name of the signing wallet; defaults to `own_address`.
    pub wallet: Option<String>,

    /// PBKDF2 rounds for the operational key.
    pub kdf_iterations: u32,

    /// Salt used to derive the operational key from the master mnemonic.
    pub operational_salt: String,

    pub page_size: u32,
    pub max_pages: u32,
    pub fetch_concurrency: usize,

    /// Custodian packages unlocked in parallel.
    pub unpack_concurrency: usize,

    pub max_retries: u32,
    pub retry_backoff_ms: u64,

    /// Longest memo the ledger accepts, in bytes.
    pub max_memo_len: usize,

    /// Where checkpoint, sealed cache and transaction log live.
    pub state_dir: PathBuf,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            own_address: String::new(),
            wallet: None,
            kdf_iterations: DEFAULT_ITERATIONS,
            operational_salt: String::from("shardledger-operational-v1"),
            page_size: 50,
            max_pages: 10,
            fetch_concurrency: 4,
            unpack_concurrency: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_memo_len: 256,
            state_dir: PathBuf::from(".shardledger"),
        }
    }
}

impl VaultConfig {
    /// Parses and validates a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.own_address.trim().is_empty() {
            return Err(ConfigError::Invalid("own_address is required".into()));
        }
        if self.kdf_iterations == 0 {
            return Err(ConfigError::Invalid("kdf_iterations must be positive".into()));
        }
        if self.operational_salt.is_empty() {
            return Err(ConfigError::Invalid("operational_salt must not be empty".into()));
        }
        if self.page_size == 0 || self.max_pages == 0 {
            return Err(ConfigError::Invalid("page_size and max_pages must be positive".into()));
        }
        if self.fetch_concurrency == 0 || self.unpack_concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency limits must be positive".into()));
        }
        if self.max_memo_len == 0 {
            return Err(ConfigError::Invalid("max_memo_len must be positive".into()));
        }
        Ok(())
    }

    /// Wallet used to sign submissions.
    pub fn wallet_name(&self) -> &str {
        self.wallet.as_deref().unwrap_or(&self.own_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = VaultConfig::from_json(r#"{"own_address": "akash1abc"}"#).unwrap();
        assert_eq!(config.kdf_iterations, 100_000);
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_pages, 10);
        assert_eq!(config.fetch_concurrency, 4);
        assert_eq!(config.wallet_name(), "akash1abc");
    }

    #[test]
    fn test_validation() {
        assert!(matches!(VaultConfig::from_json("{}"), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            VaultConfig::from_json(r#"{"own_address": "a", "page_size": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(VaultConfig::from_json("not json"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, r#"{"own_address": "akash1abc", "wallet": "ops", "max_retries": 5}"#).unwrap();
        let config = VaultConfig::load(&path).unwrap();
        assert_eq!(config.wallet_name(), "ops");
        assert_eq!(config.max_retries, 5);

        assert!(matches!(VaultConfig::load(dir.path().join("missing.json")), Err(ConfigError::Io { .. })));
    }
}
