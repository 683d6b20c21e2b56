//! In-memory ledger for tests, with fault injection.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::client::{LedgerQuery, LedgerSubmit};
use super::types::{LedgerEntry, SortOrder, SubmitReceipt, TransferPage};
use super::{LedgerError, SIMPLE_TRANSFER_TYPE};

/// First height handed out by `submit_transfer`.
const GENESIS_HEIGHT: u64 = 1_000;

#[derive(Default)]
struct Inner {
    entries: Vec<LedgerEntry>,
    faults: HashMap<u32, VecDeque<LedgerError>>,
    delays: HashMap<u32, Duration>,
    page_calls: HashMap<u32, usize>,
    calls: usize,
    next_height: u64,
    next_tx: u64,
    reject_next: Option<String>,
    unfiltered: bool,
}

/// A ledger that lives in a `Vec`. Submitted transfers get increasing
/// heights and `TX000001`-style hashes.
pub struct MemoryLedger {
    inner: Mutex<Inner>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { next_height: GENESIS_HEIGHT, ..Inner::default() }) }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a raw entry as-is.
    pub fn push(&self, entry: LedgerEntry) {
        self.lock().entries.push(entry);
    }

    /// Fails the next `times` queries for `page` with `err`.
    pub fn fail_page(&self, page: u32, err: LedgerError, times: usize) {
        let mut inner = self.lock();
        let queue = inner.faults.entry(page).or_default();
        queue.extend(std::iter::repeat(err).take(times));
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Makes every query for `page` take at least `delay`.
    pub fn delay_page(&self, page: u32, delay: Duration) {
        self.lock().delays.insert(page, delay);
    }

    /// With the filter off, queries return every entry in range, as a
    /// backend without sender/recipient filtering would.
    pub fn set_server_filter(&self, enabled: bool) {
        self.lock().unfiltered = !enabled;
    }

    /// The next submission is refused with `detail`.
    pub fn reject_next_submit(&self, detail: &str) {
        self.lock().reject_next = Some(detail.to_string());
    }

    /// Total number of queries.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    /// Number of queries for one page.
    pub fn page_calls(&self, page: u32) -> usize {
        self.lock().page_calls.get(&page).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock().entries.clone()
    }
}

#[async_trait]
impl LedgerQuery for MemoryLedger {
    async fn query_own_transfers(
        &self,
        address: &str,
        from_height: u64,
        page: u32,
        page_size: u32,
        order: SortOrder,
    ) -> Result<TransferPage, LedgerError> {
        let delay = {
            let mut inner = self.lock();
            inner.calls += 1;
            *inner.page_calls.entry(page).or_default() += 1;
            if let Some(err) = inner.faults.get_mut(&page).and_then(VecDeque::pop_front) {
                return Err(err);
            }
            inner.delays.get(&page).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let inner = self.lock();
        let mut matching: Vec<&LedgerEntry> = inner
            .entries
            .iter()
            .filter(|e| e.height >= from_height)
            .filter(|e| inner.unfiltered || (e.sender == address && e.recipient == address))
            .collect();
        match order {
            SortOrder::Ascending => matching.sort_by_key(|e| e.height),
            SortOrder::Descending => matching.sort_by(|a, b| b.height.cmp(&a.height)),
        }

        let size = page_size as usize;
        let start = (page.saturating_sub(1) as usize).saturating_mul(size);
        let entries: Vec<LedgerEntry> = matching.iter().skip(start).take(size).map(|e| (*e).clone()).collect();
        let has_more = matching.len() > start.saturating_add(size);
        Ok(TransferPage { entries, has_more })
    }
}

#[async_trait]
impl LedgerSubmit for MemoryLedger {
    async fn submit_transfer(
        &self,
        wallet: &str,
        recipient: &str,
        amount: u64,
        memo: &str,
    ) -> Result<SubmitReceipt, LedgerError> {
        let mut inner = self.lock();
        if let Some(detail) = inner.reject_next.take() {
            return Ok(SubmitReceipt { success: false, tx_hash: String::new(), error_detail: detail });
        }
        inner.next_tx += 1;
        let tx_hash = format!("TX{:06}", inner.next_tx);
        let height = inner.next_height;
        inner.next_height += 1;
        inner.entries.push(LedgerEntry {
            tx_hash: tx_hash.clone(),
            height,
            sender: wallet.to_string(),
            recipient: recipient.to_string(),
            amount,
            memo: memo.to_string(),
            timestamp: None,
            msg_type: SIMPLE_TRANSFER_TYPE.to_string(),
        });
        Ok(SubmitReceipt { success: true, tx_hash, error_detail: String::new() })
    }
}
