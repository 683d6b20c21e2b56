//! Ledger and scan data types.

use alloc::collections::BTreeMap;
use core::fmt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One transfer as reported by the ledger query collaborator. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub tx_hash: String,
    pub height: u64,
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
    pub memo: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Message type URL of the (first) message in the transaction.
    pub msg_type: String,
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPage {
    pub entries: Vec<LedgerEntry>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// What the submission collaborator needs to write a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTransfer {
    pub recipient: String,
    pub amount: u64,
    pub memo: String,
}

/// Result of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub success: bool,
    pub tx_hash: String,
    pub error_detail: String,
}

/// An operational secret recovered from a ledger entry.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretRecord {
    pub tx_hash: String,
    pub height: u64,
    pub amount_code: u64,
    pub service: String,
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("tx_hash", &self.tx_hash)
            .field("height", &self.height)
            .field("amount_code", &self.amount_code)
            .field("service", &self.service)
            .field("fields", &self.payload.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Highest height covered by a completed scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCheckpoint {
    pub last_scanned_height: u64,
}

impl ScanCheckpoint {
    /// Moves the checkpoint forward; never backwards.
    pub fn advance(&mut self, height: u64) {
        self.last_scanned_height = self.last_scanned_height.max(height);
    }
}

/// Progress of a scan pass that has not reached its end yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    /// Lower height bound of the pass.
    pub from_height: u64,
    /// First page not yet committed (1-based).
    pub next_page: u32,
    /// Lowest height seen in committed pages.
    pub low_water: Option<u64>,
    /// Highest height seen in committed pages.
    pub high_water: Option<u64>,
}

impl ScanCursor {
    pub fn new(from_height: u64) -> Self {
        Self { from_height, next_page: 1, low_water: None, high_water: None }
    }

    pub(crate) fn observe(&mut self, height: u64) {
        self.low_water = Some(self.low_water.map_or(height, |h| h.min(height)));
        self.high_water = Some(self.high_water.map_or(height, |h| h.max(height)));
    }
}

/// Append-only `tx_hash -> SecretRecord` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretCache {
    records: BTreeMap<String, SecretRecord>,
}

impl SecretCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tx_hash: &str) -> bool {
        self.records.contains_key(tx_hash)
    }

    pub fn get(&self, tx_hash: &str) -> Option<&SecretRecord> {
        self.records.get(tx_hash)
    }

    /// Inserts a record unless its hash is already known. Returns `true` if inserted.
    pub fn insert(&mut self, record: SecretRecord) -> bool {
        if self.records.contains_key(&record.tx_hash) {
            return false;
        }
        self.records.insert(record.tx_hash.clone(), record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, highest height first (ties by hash).
    pub fn records_desc(&self) -> Vec<&SecretRecord> {
        let mut all: Vec<&SecretRecord> = self.records.values().collect();
        all.sort_by(|a, b| b.height.cmp(&a.height).then_with(|| a.tx_hash.cmp(&b.tx_hash)));
        all
    }
}

/// Everything a scan reads and produces; passed in and returned by value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanState {
    pub checkpoint: ScanCheckpoint,
    pub cache: SecretCache,
    pub cursor: Option<ScanCursor>,
}
