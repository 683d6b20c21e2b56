//! Threshold-secured, ledger-backed secret store.
//!
//! A master mnemonic is split k-of-n among custodians, each share sealed
//! under that custodian's password. Operational secrets are written to a
//! public ledger as encrypted self-transfer memos under a key derived from
//! the mnemonic, and recovered by replaying the address history.

extern crate alloc;

pub mod config;
pub mod core;
pub mod crypto;
pub mod custodian;
pub mod ledger;
pub mod mpc;
pub mod recovery;
pub mod storage;

pub use config::{ConfigError, VaultConfig};
pub use recovery::{CustodianUnlock, Recovered, RecoveryError, RecoveryOrchestrator};
