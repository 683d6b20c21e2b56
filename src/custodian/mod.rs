//! Custodian packages.
//!
//! Each custodian holds exactly one share of the master secret, encrypted
//! under a key derived from that custodian's personal password. A package is
//! a self-describing JSON blob: nothing but the password is needed to open it.
//!
//! # Components
//! - `package`: `AgentPackage`, `AgentData`, pack/unpack.
//! - `distribute`: split a master mnemonic and pack one share per custodian.
//!
//! # Scheme
//! 1. **Salt**: 16 random bytes per package, stored in clear next to the ciphertext.
//! 2. **KDF**: PBKDF2-HMAC-SHA256(password, salt, iterations) -> package key.
//! 3. **Encryption**: ChaCha20-Poly1305 token over the JSON of `AgentData`.

pub mod distribute;
pub mod package;

pub use distribute::{default_role, distribute, Custodian};
pub use package::{AgentData, AgentPackage, Packager, PACKAGE_VERSION};

use crate::crypto::CryptoError;
use crate::mpc::MpcError;

/// Errors for packing and unpacking custodian shares.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackageError {
    /// Rejected before any cryptographic work.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Wrong password or tampered package.
    #[error("authentication failed for custodian '{agent_id}'")]
    Authentication { agent_id: String },
    /// The package or its decrypted content is not in the expected shape.
    #[error("malformed package for '{agent_id}': {reason}")]
    Malformed { agent_id: String, reason: String },
    /// Package written by an unknown format version.
    #[error("unsupported package version '{0}'")]
    UnsupportedVersion(String),
    /// Splitting the master secret failed.
    #[error("secret sharing failed: {0}")]
    Sharing(#[from] MpcError),
    /// Key derivation or encryption failed for a reason other than authentication.
    #[error("crypto failure: {0}")]
    Crypto(CryptoError),
}

impl PackageError {
    pub(crate) fn from_crypto(err: CryptoError, agent_id: &str) -> Self {
        match err {
            CryptoError::Authentication => PackageError::Authentication { agent_id: agent_id.to_string() },
            CryptoError::InvalidInput(reason) => PackageError::InvalidInput(reason.to_string()),
            other => PackageError::Crypto(other),
        }
    }
}
