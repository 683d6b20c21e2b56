//! Ledger-backed secret log.
//!
//! Operational secrets are stored as self-transfers: a transaction from the
//! operator's address to itself whose memo is an encrypted JSON payload and
//! whose amount is a free, non-confidential tag (`amount_code`). Recovery
//! pages through the address history and keeps every memo that
//! authenticates under the operational key.
//!
//! # Components
//! - `types`: ledger entries, secret records, scan state.
//! - `client`: the query and submission collaborators (async traits).
//! - `codec`: memo encoding and the per-entry decode decision.
//! - `store`: `LedgerSecretStore` (encode, publish, paginated scan).
//! - `memory`: an in-memory ledger with fault injection, for tests.
//!
//! # Idempotence
//! Entries already in the `SecretCache` are never decrypted twice, and the
//! checkpoint only moves forward once a full pass has been committed, so a
//! scan can be interrupted and rerun at any point.

pub mod client;
pub mod codec;
pub mod store;
pub mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use client::{LedgerQuery, LedgerSubmit};
pub use codec::{MemoOutcome, SkipReason};
pub use store::{CommitSink, HaltReason, LedgerSecretStore, NoCommit, ScanIncomplete, ScanOptions, ScanReport, ScanStats};
pub use types::{
    EncodedTransfer, LedgerEntry, ScanCheckpoint, ScanCursor, ScanState, SecretCache, SecretRecord,
    SortOrder, SubmitReceipt, TransferPage,
};

use crate::crypto::CryptoError;

/// Message type of a plain bank transfer; anything else is never a secret record.
pub const SIMPLE_TRANSFER_TYPE: &str = "/cosmos.bank.v1beta1.MsgSend";

/// Errors from the ledger collaborators and the secret store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Network or RPC failure talking to the ledger.
    #[error("transport error: {0}")]
    Transport(String),
    /// The collaborator did not answer in time.
    #[error("ledger request timed out")]
    Timeout,
    /// The upstream asked us to slow down.
    #[error("rate limited by ledger endpoint")]
    RateLimited,
    /// The collaborator answered with data that breaks its contract.
    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
    /// The ledger rejected a submitted transfer.
    #[error("transfer rejected: {0}")]
    Submission(String),
    /// Rejected before any work.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Encrypting a payload failed.
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),
}

impl LedgerError {
    /// Worth retrying after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transport(_) | LedgerError::Timeout | LedgerError::RateLimited)
    }
}
