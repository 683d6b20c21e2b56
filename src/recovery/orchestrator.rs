//! `RecoveryOrchestrator`: from custodian packages to operational secrets.
//!
//! # Flow
//! 0. **Local**: the transaction log is read once, before anything else; it
//!    tells the replay which published secrets the cache must account for.
//! 1. **Unlock**: every offered package is opened with its password on the
//!    blocking pool (PBKDF2 is CPU-bound), at most `unpack_concurrency` at once.
//! 2. **Check**: unlocked shares must come from one split and hold distinct
//!    indices; at least `k` of them are required.
//! 3. **Reconstruct**: interpolate, verify the checksum, parse the mnemonic.
//! 4. **Derive**: operational key = PBKDF2(mnemonic, configured salt).
//! 5. **Replay**: load the persisted state, scan the ledger (persisting after
//!    every committed page), merge by service. A lost cache or a logged
//!    secret missing from it turns the scan into a pass from height zero,
//!    resumed across runs; the checkpoint never moves back.
//!
//! Every step is restartable: the persisted state only ever holds committed
//! progress.

use core::fmt;
use std::collections::BTreeMap;
use std::pin::pin;

use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use super::{merge_by_service, CustodianFailure, RecoveryError};
use crate::config::VaultConfig;
use crate::crypto::{self, Key};
use crate::custodian::{AgentData, AgentPackage, PackageError, Packager};
use crate::ledger::{HaltReason, LedgerQuery, LedgerSecretStore, LedgerSubmit, ScanIncomplete, ScanStats};
use crate::mpc::{reconstruct_secret, MasterSecret, Share};
use crate::storage::{StateStore, TxLogEntry};

/// A package together with the password its custodian typed in.
pub struct CustodianUnlock {
    pub package: AgentPackage,
    pub password: Zeroizing<String>,
}

impl CustodianUnlock {
    pub fn new(package: AgentPackage, password: impl Into<String>) -> Self {
        Self { package, password: Zeroizing::new(password.into()) }
    }
}

impl fmt::Debug for CustodianUnlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodianUnlock")
            .field("agent_id", &self.package.agent_id)
            .field("password", &"***SENSITIVE***")
            .finish()
    }
}

/// Outcome of a recovery.
#[derive(Clone, PartialEq)]
pub struct Recovered {
    /// Latest payload per service.
    pub secrets: BTreeMap<String, Map<String, Value>>,
    /// Records in the cache after the scan.
    pub records: usize,
    /// Records first seen by this run.
    pub discovered: usize,
    pub stats: ScanStats,
    pub checkpoint: u64,
    /// False when the scan stopped at its page limit; the next run continues.
    pub complete: bool,
}

impl fmt::Debug for Recovered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recovered")
            .field("services", &self.secrets.keys().collect::<Vec<_>>())
            .field("records", &self.records)
            .field("discovered", &self.discovered)
            .field("checkpoint", &self.checkpoint)
            .field("complete", &self.complete)
            .finish()
    }
}

/// Drives recovery and secret storage for one vault.
#[derive(Debug, Clone)]
pub struct RecoveryOrchestrator {
    config: VaultConfig,
    store: LedgerSecretStore,
    state: StateStore,
}

impl RecoveryOrchestrator {
    /// Validates `config` and opens its state directory.
    pub fn new(config: VaultConfig) -> Result<Self, RecoveryError> {
        config.validate()?;
        let store = LedgerSecretStore::from_config(&config)?;
        let state = StateStore::open(&config.state_dir)?;
        Ok(Self { config, store, state })
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn state_store(&self) -> &StateStore {
        &self.state
    }

    /// Full recovery: unlock, reconstruct, derive, replay.
    pub async fn recover<Q: LedgerQuery + ?Sized>(
        &self,
        ledger: &Q,
        custodians: Vec<CustodianUnlock>,
        cancel: &CancellationToken,
    ) -> Result<Recovered, RecoveryError> {
        let known = self.state.read_tx_log()?;
        log::info!("{} secret transaction(s) known locally", known.len());

        let master = self.unlock_master(custodians, cancel).await?;
        let key = self.operational_key(&master).await?;
        drop(master);
        self.replay_log(ledger, &key, &known, cancel).await
    }

    /// Opens the packages and reconstructs the master secret.
    ///
    /// # Errors
    /// * `RecoveryAborted` - fewer than `k` packages could be opened.
    /// * `InvalidInput` - duplicate custodians, shares from different splits,
    ///   or two custodians holding the same share index.
    /// * `Integrity` - the shares do not reproduce a valid mnemonic.
    pub async fn unlock_master(
        &self,
        custodians: Vec<CustodianUnlock>,
        cancel: &CancellationToken,
    ) -> Result<MasterSecret, RecoveryError> {
        if custodians.is_empty() {
            return Err(RecoveryError::InvalidInput("no custodian packages offered".into()));
        }
        for (i, c) in custodians.iter().enumerate() {
            if custodians[..i].iter().any(|o| o.package.agent_id == c.package.agent_id) {
                return Err(RecoveryError::InvalidInput(format!(
                    "custodian '{}' offered twice",
                    c.package.agent_id
                )));
            }
        }
        log::info!("Unlocking {} custodian package(s)", custodians.len());

        let mut unlocked = pin!(stream::iter(custodians)
            .map(|custodian| tokio::task::spawn_blocking(move || unpack(custodian)))
            .buffer_unordered(self.config.unpack_concurrency));

        let mut opened: Vec<AgentData> = Vec::new();
        let mut failures = Vec::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RecoveryError::Cancelled),
                next = unlocked.next() => next,
            };
            let Some(joined) = next else { break };
            let (agent_id, result) = joined.map_err(|e| RecoveryError::Task(e.to_string()))?;
            match result {
                Ok(data) => {
                    log::info!("Custodian '{}' unlocked share {} of {}", agent_id, data.share.index, data.n);
                    opened.push(data);
                }
                Err(error) => {
                    log::warn!("Custodian '{}' could not be unlocked: {}", agent_id, error);
                    failures.push(CustodianFailure { agent_id, error });
                }
            }
        }
        // Completion order is arbitrary.
        opened.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));

        let shares = check_quorum(&opened, failures)?;
        let secret = reconstruct_secret(&shares)?;
        let master = MasterSecret::from_bytes(&secret)?;
        log::info!("Master secret reconstructed from {} share(s)", shares.len());
        Ok(master)
    }

    /// Derives the operational key from the master mnemonic.
    pub async fn operational_key(&self, master: &MasterSecret) -> Result<Key, RecoveryError> {
        let phrase = Zeroizing::new(master.phrase().to_string());
        let salt = self.config.operational_salt.clone();
        let iterations = self.config.kdf_iterations;
        let key = tokio::task::spawn_blocking(move || crypto::derive(&phrase, salt.as_bytes(), iterations))
            .await
            .map_err(|e| RecoveryError::Task(e.to_string()))??;
        Ok(key)
    }

    /// Loads the persisted state, scans the ledger and merges by service.
    ///
    /// A scan that stops at its page limit still returns `Ok` with
    /// `complete == false`; any other halt is `ScanIncomplete` carrying the
    /// partial result.
    pub async fn replay<Q: LedgerQuery + ?Sized>(
        &self,
        ledger: &Q,
        key: &Key,
        cancel: &CancellationToken,
    ) -> Result<Recovered, RecoveryError> {
        let known = self.state.read_tx_log()?;
        self.replay_log(ledger, key, &known, cancel).await
    }

    async fn replay_log<Q: LedgerQuery + ?Sized>(
        &self,
        ledger: &Q,
        key: &Key,
        known: &[TxLogEntry],
        cancel: &CancellationToken,
    ) -> Result<Recovered, RecoveryError> {
        let _lock = self.state.lock()?;
        let state = self.state.load(key, known)?;
        // An unfinished pass keeps its own lower bound.
        let from = state.cursor.map(|c| c.from_height);
        let from_genesis = from.unwrap_or(state.checkpoint.last_scanned_height) == 0;
        log::info!(
            "Replaying secret log from height {} ({} cached record(s), {} logged)",
            from.unwrap_or(state.checkpoint.last_scanned_height),
            state.cache.len(),
            known.len()
        );

        let report = {
            let mut sink = self.state.sink(key);
            self.store.scan(ledger, key, state, from, &mut sink, cancel).await
        };
        match &report.incomplete {
            Some(ScanIncomplete { reason: HaltReason::PersistFailed(cause), .. }) => {
                log::warn!("State not saved after failed commit: {}", cause);
            }
            _ => self.state.save(&report.state, key)?,
        }
        if report.incomplete.is_none() && from_genesis {
            self.state.mark_log_verified(known.len())?;
        }

        let recovered = Recovered {
            secrets: merge_by_service(report.state.cache.records_desc()),
            records: report.state.cache.len(),
            discovered: report.discovered.len(),
            stats: report.stats,
            checkpoint: report.state.checkpoint.last_scanned_height,
            complete: report.incomplete.is_none(),
        };

        match report.incomplete {
            None => {
                log::info!(
                    "Recovered {} service(s) from {} record(s)",
                    recovered.secrets.len(),
                    recovered.records
                );
                Ok(recovered)
            }
            Some(incomplete) if matches!(incomplete.reason, HaltReason::PageLimit(_)) => {
                log::warn!("Page limit reached; run again to continue from page {}", incomplete.resume_page);
                Ok(recovered)
            }
            Some(incomplete) => {
                Err(RecoveryError::ScanIncomplete { incomplete, partial: Box::new(recovered) })
            }
        }
    }

    /// Publishes a secret and records it in the transaction log.
    ///
    /// The record enters the cache when a later scan finds it on the ledger.
    pub async fn store_secret<S: LedgerSubmit + ?Sized>(
        &self,
        ledger: &S,
        key: &Key,
        payload: &Map<String, Value>,
        amount_code: u64,
    ) -> Result<String, RecoveryError> {
        let _lock = self.state.lock()?;
        let tx_hash = self
            .store
            .publish(ledger, self.config.wallet_name(), payload, amount_code, key)
            .await?;
        self.state.append_tx(&tx_hash, amount_code)?;
        Ok(tx_hash)
    }
}

fn unpack(custodian: CustodianUnlock) -> (String, Result<AgentData, PackageError>) {
    let result = Packager::default().unpack(&custodian.package, &custodian.password);
    (custodian.package.agent_id, result)
}

/// Checks that the opened shares can be combined and returns them.
fn check_quorum(opened: &[AgentData], failures: Vec<CustodianFailure>) -> Result<Vec<Share>, RecoveryError> {
    let Some(first) = opened.first() else {
        return Err(RecoveryError::RecoveryAborted { collected: 0, required: None, failures });
    };

    for (i, data) in opened.iter().enumerate() {
        if !data.share.same_split(&first.share) {
            return Err(RecoveryError::InvalidInput(format!(
                "custodians '{}' and '{}' hold shares of different splits",
                first.agent_id, data.agent_id
            )));
        }
        if let Some(other) = opened[..i].iter().find(|o| o.share.index == data.share.index) {
            return Err(RecoveryError::InvalidInput(format!(
                "custodians '{}' and '{}' both hold share {}",
                other.agent_id, data.agent_id, data.share.index
            )));
        }
    }

    let k = first.share.k;
    if opened.len() < k as usize {
        log::warn!("Only {} of {} required shares unlocked", opened.len(), k);
        return Err(RecoveryError::RecoveryAborted { collected: opened.len(), required: Some(k), failures });
    }
    Ok(opened.iter().map(|d| d.share.clone()).collect())
}
