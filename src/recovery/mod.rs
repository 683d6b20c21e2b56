//! Disaster recovery.
//!
//! Brings a vault back from nothing but custodian packages, their passwords
//! and the ledger: unlock enough shares, reconstruct the master mnemonic,
//! derive the operational key, then replay the secret log.
//!
//! # Components
//! - `orchestrator`: `RecoveryOrchestrator` (recover, store secrets).
//! - `merge`: folding records into one payload per service.

pub mod merge;
pub mod orchestrator;

pub use merge::merge_by_service;
pub use orchestrator::{CustodianUnlock, Recovered, RecoveryOrchestrator};

use core::fmt;

use crate::config::ConfigError;
use crate::crypto::CryptoError;
use crate::custodian::PackageError;
use crate::ledger::{LedgerError, ScanIncomplete};
use crate::mpc::MpcError;
use crate::storage::StorageError;

/// A custodian whose package could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustodianFailure {
    pub agent_id: String,
    pub error: PackageError,
}

impl fmt::Display for CustodianFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.agent_id, self.error)
    }
}

fn threshold_label(required: &Option<u8>) -> String {
    required.map_or_else(|| "unknown".to_string(), |k| k.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// Rejected before any work, or custodians that contradict each other.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Not enough shares could be unlocked. Nothing was reconstructed.
    #[error("recovery aborted: {collected} share(s) unlocked, threshold {}", threshold_label(.required))]
    RecoveryAborted {
        collected: usize,
        /// `None` when no package could be opened at all.
        required: Option<u8>,
        failures: Vec<CustodianFailure>,
    },
    /// The shares interpolated to something that is not the master secret.
    #[error("reconstructed master secret failed its integrity check")]
    Integrity,
    #[error("reconstruction failed: {0}")]
    Reconstruction(MpcError),
    /// The scan halted; `partial` holds everything recovered so far.
    #[error("{incomplete}")]
    ScanIncomplete { incomplete: ScanIncomplete, partial: Box<Recovered> },
    #[error("cancelled")]
    Cancelled,
    #[error("background task failed: {0}")]
    Task(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("package error: {0}")]
    Package(#[from] PackageError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<MpcError> for RecoveryError {
    fn from(err: MpcError) -> Self {
        match err {
            MpcError::IntegrityFailure | MpcError::InvalidMnemonic(_) => RecoveryError::Integrity,
            other => RecoveryError::Reconstruction(other),
        }
    }
}
