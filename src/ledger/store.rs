//! `LedgerSecretStore`: encoding, publishing and the paginated scan.
//!
//! # Scan commit model
//! A pass walks heights `>= from_height` in descending order, page by page.
//! Each page is staged in full (filter, decrypt, collect) and only then
//! committed: records enter the cache, the cursor moves to the next page and
//! the [`CommitSink`] persists the new state. A page that fails never touches
//! the state.
//!
//! When the pass reaches its last page the checkpoint becomes the highest
//! height seen and the cursor is cleared. A pass that halts early keeps the
//! checkpoint where it was and leaves the cursor behind, so the next scan with
//! the same lower bound resumes at the first uncommitted page.
//!
//! # Concurrency
//! Up to `fetch_concurrency` pages are fetched ahead; results are consumed in
//! page order regardless of completion order. Cancellation is checked before
//! every page and during backoff sleeps; dropping the stream aborts in-flight
//! fetches.

use core::fmt;
use std::pin::pin;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::client::{LedgerQuery, LedgerSubmit};
use super::codec::{self, MemoOutcome, SkipReason};
use super::types::{EncodedTransfer, ScanCursor, ScanState, SecretRecord, SortOrder, TransferPage};
use super::LedgerError;
use crate::config::VaultConfig;
use crate::crypto::Key;

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Tuning of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub page_size: u32,
    /// Pages fetched per scan call.
    pub max_pages: u32,
    /// Pages in flight at once.
    pub fetch_concurrency: usize,
    /// Retries per page on transient errors (attempts = retries + 1).
    pub max_retries: u32,
    /// First backoff; doubles on every retry.
    pub retry_backoff: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&VaultConfig::default())
    }
}

impl From<&VaultConfig> for ScanOptions {
    fn from(config: &VaultConfig) -> Self {
        Self {
            page_size: config.page_size,
            max_pages: config.max_pages,
            fetch_concurrency: config.fetch_concurrency,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Receives the scan state after every committed page.
pub trait CommitSink {
    type Error: fmt::Display;

    fn commit(&mut self, state: &ScanState) -> Result<(), Self::Error>;
}

/// Sink that persists nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommit;

impl CommitSink for NoCommit {
    type Error = core::convert::Infallible;

    fn commit(&mut self, _state: &ScanState) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Why a pass stopped before its last page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HaltReason {
    #[error("page {page} failed after {attempts} attempt(s): {cause}")]
    FetchFailed { page: u32, attempts: u32, cause: LedgerError },
    #[error("page {page} rejected: {cause}")]
    InvalidEntry { page: u32, cause: LedgerError },
    #[error("page limit of {0} reached")]
    PageLimit(u32),
    #[error("cancelled")]
    Cancelled,
    #[error("could not persist scan progress: {0}")]
    PersistFailed(String),
}

/// A pass that did not reach its end. The state in the report is still valid
/// and contains everything committed so far.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scan incomplete at page {resume_page}: {reason} (checkpoint {checkpoint}, {discovered} new record(s))")]
pub struct ScanIncomplete {
    /// Checkpoint height, unchanged by the halted pass.
    pub checkpoint: u64,
    /// First page the next scan will fetch.
    pub resume_page: u32,
    /// Lowest height committed in this pass.
    pub low_water: Option<u64>,
    pub reason: HaltReason,
    /// Records committed before the halt.
    pub discovered: usize,
}

/// Counters for one scan call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub pages: u32,
    pub entries: usize,
    pub cache_hits: usize,
    /// Not a self-transfer of ours, or outside the height range.
    pub foreign: usize,
    /// Self-transfers whose memo did not decode.
    pub undecryptable: usize,
    pub decoded: usize,
    pub pass_complete: bool,
}

/// Result of a scan. `incomplete` is `None` when the pass reached its end.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub state: ScanState,
    /// Records first seen in this call, highest height first.
    pub discovered: Vec<SecretRecord>,
    pub stats: ScanStats,
    pub incomplete: Option<ScanIncomplete>,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_none()
    }
}

/// Secret log bound to one ledger address.
#[derive(Debug, Clone)]
pub struct LedgerSecretStore {
    own_address: String,
    options: ScanOptions,
    max_memo_len: usize,
}

impl LedgerSecretStore {
    pub fn new(own_address: impl Into<String>, options: ScanOptions) -> Result<Self, LedgerError> {
        let own_address = own_address.into();
        if own_address.trim().is_empty() {
            return Err(LedgerError::InvalidInput("empty ledger address".into()));
        }
        if options.page_size == 0 || options.max_pages == 0 || options.fetch_concurrency == 0 {
            return Err(LedgerError::InvalidInput(
                "page size, page limit and fetch concurrency must be positive".into(),
            ));
        }
        Ok(Self { own_address, options, max_memo_len: VaultConfig::default().max_memo_len })
    }

    pub fn from_config(config: &VaultConfig) -> Result<Self, LedgerError> {
        Ok(Self::new(config.own_address.clone(), ScanOptions::from(config))?.with_max_memo_len(config.max_memo_len))
    }

    /// Longest memo accepted by `encode`.
    pub fn with_max_memo_len(mut self, max_memo_len: usize) -> Self {
        self.max_memo_len = max_memo_len;
        self
    }

    pub fn own_address(&self) -> &str {
        &self.own_address
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Builds the self-transfer carrying `payload`.
    pub fn encode(
        &self,
        payload: &Map<String, Value>,
        amount_code: u64,
        key: &Key,
    ) -> Result<EncodedTransfer, LedgerError> {
        let memo = codec::encode_memo(payload, key)?;
        if memo.len() > self.max_memo_len {
            return Err(LedgerError::InvalidInput(format!(
                "memo of {} bytes exceeds limit of {}",
                memo.len(),
                self.max_memo_len
            )));
        }
        Ok(EncodedTransfer { recipient: self.own_address.clone(), amount: amount_code, memo })
    }

    /// Encodes `payload` and submits it from `wallet`. Returns the transaction hash.
    pub async fn publish<S: LedgerSubmit + ?Sized>(
        &self,
        submitter: &S,
        wallet: &str,
        payload: &Map<String, Value>,
        amount_code: u64,
        key: &Key,
    ) -> Result<String, LedgerError> {
        let transfer = self.encode(payload, amount_code, key)?;
        let receipt = submitter
            .submit_transfer(wallet, &transfer.recipient, transfer.amount, &transfer.memo)
            .await?;
        if !receipt.success {
            log::warn!("Ledger rejected secret transfer: {}", receipt.error_detail);
            return Err(LedgerError::Submission(receipt.error_detail));
        }
        log::info!("Published secret transfer {} (amount code {})", receipt.tx_hash, amount_code);
        Ok(receipt.tx_hash)
    }

    /// Scans the ledger for secrets, starting from `from_height` or the
    /// checkpoint in `state`.
    ///
    /// Never fails outright: problems end the pass early and are described
    /// by [`ScanReport::incomplete`].
    pub async fn scan<Q, C>(
        &self,
        query: &Q,
        key: &Key,
        mut state: ScanState,
        from_height: Option<u64>,
        sink: &mut C,
        cancel: &CancellationToken,
    ) -> ScanReport
    where
        Q: LedgerQuery + ?Sized,
        C: CommitSink + ?Sized,
    {
        let from = from_height.unwrap_or(state.checkpoint.last_scanned_height);
        let mut cursor = match state.cursor {
            Some(cursor) if cursor.from_height == from => {
                log::info!("Resuming scan from height {} at page {}", from, cursor.next_page);
                cursor
            }
            _ => ScanCursor::new(from),
        };
        log::info!("Scanning {} from height {}", self.own_address, from);

        let first_page = cursor.next_page;
        let last_page = first_page.saturating_add(self.options.max_pages - 1);
        let mut pages = pin!(stream::iter(first_page..=last_page)
            .map(move |page| self.fetch_page(query, from, page, cancel))
            .buffered(self.options.fetch_concurrency));

        let mut stats = ScanStats::default();
        let mut discovered = Vec::new();
        let halt = loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Some(HaltReason::Cancelled),
                next = pages.next() => next,
            };
            let (page_no, page) = match next {
                Some(Ok(fetched)) => fetched,
                Some(Err(reason)) => break Some(reason),
                None => break Some(HaltReason::PageLimit(self.options.max_pages)),
            };

            let staged = match self.stage_page(page_no, &page, from, key, &state, &mut stats) {
                Ok(staged) => staged,
                Err(reason) => break Some(reason),
            };

            let mut next_cursor = cursor;
            for height in &staged.heights {
                next_cursor.observe(*height);
            }
            next_cursor.next_page = page_no + 1;
            let last = !page.has_more || page.entries.len() < self.options.page_size as usize;

            let mut candidate = state.clone();
            for record in &staged.records {
                candidate.cache.insert(record.clone());
            }
            if last {
                if let Some(high) = next_cursor.high_water {
                    candidate.checkpoint.advance(high);
                }
                candidate.cursor = None;
            } else {
                candidate.cursor = Some(next_cursor);
            }

            if let Err(e) = sink.commit(&candidate) {
                break Some(HaltReason::PersistFailed(e.to_string()));
            }
            log::debug!(
                "Committed page {} ({} entries, {} new record(s))",
                page_no,
                page.entries.len(),
                staged.records.len()
            );
            state = candidate;
            cursor = next_cursor;
            stats.pages += 1;
            stats.decoded += staged.records.len();
            discovered.extend(staged.records);

            if last {
                break None;
            }
        };

        stats.pass_complete = halt.is_none();
        let incomplete = halt.map(|reason| {
            log::warn!("Scan halted: {}", reason);
            ScanIncomplete {
                checkpoint: state.checkpoint.last_scanned_height,
                resume_page: cursor.next_page,
                low_water: cursor.low_water,
                reason,
                discovered: discovered.len(),
            }
        });
        log::info!(
            "Scan finished: {} page(s), {} entries, {} cached, {} foreign, {} undecryptable, {} new; checkpoint {}",
            stats.pages,
            stats.entries,
            stats.cache_hits,
            stats.foreign,
            stats.undecryptable,
            stats.decoded,
            state.checkpoint.last_scanned_height
        );

        ScanReport { state, discovered, stats, incomplete }
    }

    /// Fetches one page, retrying transient errors with exponential backoff.
    async fn fetch_page<Q: LedgerQuery + ?Sized>(
        &self,
        query: &Q,
        from: u64,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<(u32, TransferPage), HaltReason> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let err = match query
                .query_own_transfers(&self.own_address, from, page, self.options.page_size, SortOrder::Descending)
                .await
            {
                Ok(fetched) => return Ok((page, fetched)),
                Err(err) => err,
            };
            if !err.is_transient() || attempts > self.options.max_retries {
                return Err(HaltReason::FetchFailed { page, attempts, cause: err });
            }

            let delay = self
                .options
                .retry_backoff
                .saturating_mul(1u32 << (attempts - 1).min(16))
                .min(MAX_BACKOFF);
            log::warn!("Page {} attempt {} failed ({}), retrying in {:?}", page, attempts, err, delay);
            tokio::select! {
                _ = cancel.cancelled() => return Err(HaltReason::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Decides every entry of a page without touching `state`.
    fn stage_page(
        &self,
        page_no: u32,
        page: &TransferPage,
        from: u64,
        key: &Key,
        state: &ScanState,
        stats: &mut ScanStats,
    ) -> Result<StagedPage, HaltReason> {
        let mut entries: Vec<_> = page.entries.iter().collect();
        entries.sort_by(|a, b| b.height.cmp(&a.height));

        let mut staged = StagedPage::default();
        for entry in entries {
            stats.entries += 1;
            if entry.height < from {
                stats.foreign += 1;
                continue;
            }
            staged.heights.push(entry.height);

            if state.cache.contains(&entry.tx_hash) || staged.records.iter().any(|r| r.tx_hash == entry.tx_hash) {
                stats.cache_hits += 1;
                continue;
            }
            match codec::decode_entry(entry, &self.own_address, key) {
                MemoOutcome::Decoded(record) => {
                    log::debug!("Decoded {} at height {} ({})", record.tx_hash, record.height, record.service);
                    staged.records.push(record);
                }
                MemoOutcome::Skip(SkipReason::NotSimpleTransfer | SkipReason::NotSelfTransfer) => {
                    stats.foreign += 1;
                }
                MemoOutcome::Skip(SkipReason::Cached) => stats.cache_hits += 1,
                MemoOutcome::Skip(reason) => {
                    log::debug!("Skipping {}: {:?}", entry.tx_hash, reason);
                    stats.undecryptable += 1;
                }
                MemoOutcome::Fatal(cause) => return Err(HaltReason::InvalidEntry { page: page_no, cause }),
            }
        }
        Ok(staged)
    }
}

#[derive(Default)]
struct StagedPage {
    records: Vec<SecretRecord>,
    heights: Vec<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_LEN;
    use crate::ledger::memory::MemoryLedger;
    use crate::ledger::types::LedgerEntry;
    use crate::ledger::SIMPLE_TRANSFER_TYPE;
    use serde_json::json;

    const ADDR: &str = "akash1vault";

    fn key() -> Key {
        Key::from_bytes([5; KEY_LEN])
    }

    fn options(page_size: u32, max_pages: u32) -> ScanOptions {
        ScanOptions {
            page_size,
            max_pages,
            fetch_concurrency: 4,
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
        }
    }

    fn store(page_size: u32, max_pages: u32) -> LedgerSecretStore {
        LedgerSecretStore::new(ADDR, options(page_size, max_pages)).unwrap()
    }

    fn payload(service: &str, token: &str) -> Map<String, Value> {
        json!({ "service": service, "token": token }).as_object().cloned().unwrap()
    }

    async fn publish(ledger: &MemoryLedger, store: &LedgerSecretStore, service: &str, token: &str) -> String {
        store.publish(ledger, ADDR, &payload(service, token), 1001, &key()).await.unwrap()
    }

    #[derive(Default)]
    struct Recorder(Vec<ScanState>);

    impl CommitSink for Recorder {
        type Error = String;

        fn commit(&mut self, state: &ScanState) -> Result<(), String> {
            self.0.push(state.clone());
            Ok(())
        }
    }

    struct Failing;

    impl CommitSink for Failing {
        type Error = &'static str;

        fn commit(&mut self, _state: &ScanState) -> Result<(), &'static str> {
            Err("disk full")
        }
    }

    #[tokio::test]
    async fn test_end_to_end_single_record() {
        let ledger = MemoryLedger::new();
        let store = store(50, 10);
        let hash = publish(&ledger, &store, "telegram_bot", "abc").await;

        let report = store
            .scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &CancellationToken::new())
            .await;
        assert!(report.is_complete());
        assert_eq!(report.discovered.len(), 1);
        let record = &report.discovered[0];
        assert_eq!(record.tx_hash, hash);
        assert_eq!(record.service, "telegram_bot");
        assert_eq!(record.amount_code, 1001);
        assert_eq!(record.payload.get("token"), Some(&json!("abc")));
        assert_eq!(report.state.checkpoint.last_scanned_height, record.height);
        assert!(report.state.cursor.is_none());
    }

    #[tokio::test]
    async fn test_scan_is_idempotent() {
        let ledger = MemoryLedger::new();
        let store = store(2, 10);
        for i in 0..5 {
            publish(&ledger, &store, &format!("svc{}", i), "t").await;
        }
        let cancel = CancellationToken::new();

        let first = store.scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &cancel).await;
        assert!(first.is_complete());
        assert_eq!(first.discovered.len(), 5);

        let second = store.scan(&ledger, &key(), first.state.clone(), None, &mut NoCommit, &cancel).await;
        assert!(second.is_complete());
        assert!(second.discovered.is_empty());
        assert_eq!(second.state, first.state);

        // Even a full rescan finds nothing new.
        let third = store.scan(&ledger, &key(), first.state.clone(), Some(0), &mut NoCommit, &cancel).await;
        assert!(third.discovered.is_empty());
        assert_eq!(third.state.cache, first.state.cache);
        assert_eq!(third.stats.cache_hits, 5);
    }

    #[tokio::test]
    async fn test_checkpoint_is_monotonic() {
        let ledger = MemoryLedger::new();
        let store = store(2, 10);
        let cancel = CancellationToken::new();
        publish(&ledger, &store, "a", "1").await;

        let first = store.scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &cancel).await;
        let cp1 = first.state.checkpoint.last_scanned_height;

        publish(&ledger, &store, "b", "2").await;
        let second = store.scan(&ledger, &key(), first.state, None, &mut NoCommit, &cancel).await;
        let cp2 = second.state.checkpoint.last_scanned_height;
        assert!(cp2 > cp1);
        assert_eq!(second.discovered.len(), 1);

        // A rescan from zero cannot move it back.
        let third = store.scan(&ledger, &key(), second.state, Some(0), &mut NoCommit, &cancel).await;
        assert_eq!(third.state.checkpoint.last_scanned_height, cp2);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let ledger = MemoryLedger::new();
        let store = store(50, 10);
        publish(&ledger, &store, "a", "1").await;
        ledger.fail_page(1, LedgerError::Timeout, 2);

        let report = store
            .scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &CancellationToken::new())
            .await;
        assert!(report.is_complete());
        assert_eq!(report.discovered.len(), 1);
        assert_eq!(ledger.page_calls(1), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_keep_committed_pages() {
        let ledger = MemoryLedger::new();
        let store = store(2, 10);
        for i in 0..6 {
            publish(&ledger, &store, &format!("svc{}", i), "t").await;
        }
        ledger.fail_page(2, LedgerError::Transport("connection reset".into()), 10);
        let mut recorder = Recorder::default();

        let report = store
            .scan(&ledger, &key(), ScanState::default(), None, &mut recorder, &CancellationToken::new())
            .await;
        let incomplete = report.incomplete.clone().unwrap();
        assert_eq!(incomplete.resume_page, 2);
        assert_eq!(incomplete.checkpoint, 0);
        assert!(matches!(incomplete.reason, HaltReason::FetchFailed { page: 2, attempts: 3, .. }));
        assert_eq!(report.discovered.len(), 2);
        assert_eq!(report.state.checkpoint.last_scanned_height, 0);
        assert_eq!(report.state.cursor.map(|c| c.next_page), Some(2));
        assert_eq!(recorder.0.len(), 1);
        assert_eq!(recorder.0[0], report.state);

        // Resume once the endpoint recovers.
        ledger.clear_faults();
        let resumed = store
            .scan(&ledger, &key(), report.state, None, &mut recorder, &CancellationToken::new())
            .await;
        assert!(resumed.is_complete());
        assert_eq!(resumed.discovered.len(), 4);
        assert_eq!(resumed.state.cache.len(), 6);
        assert!(resumed.state.checkpoint.last_scanned_height > 0);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let ledger = MemoryLedger::new();
        let store = store(50, 10);
        ledger.fail_page(1, LedgerError::InvalidResponse("bad json".into()), 1);
        let report = store
            .scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &CancellationToken::new())
            .await;
        assert!(matches!(
            report.incomplete.map(|i| i.reason),
            Some(HaltReason::FetchFailed { page: 1, attempts: 1, .. })
        ));
        assert_eq!(ledger.page_calls(1), 1);
    }

    #[tokio::test]
    async fn test_cancelled_scan_commits_nothing() {
        let ledger = MemoryLedger::new();
        let store = store(50, 10);
        publish(&ledger, &store, "a", "1").await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut recorder = Recorder::default();

        let report = store.scan(&ledger, &key(), ScanState::default(), None, &mut recorder, &cancel).await;
        assert_eq!(report.incomplete.map(|i| i.reason), Some(HaltReason::Cancelled));
        assert!(report.discovered.is_empty());
        assert_eq!(report.state, ScanState::default());
        assert!(recorder.0.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_slow_fetch() {
        let ledger = MemoryLedger::new();
        let store = store(50, 10);
        publish(&ledger, &store, "a", "1").await;
        ledger.delay_page(1, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            store.scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &cancel),
        )
        .await
        .unwrap();
        assert_eq!(report.incomplete.map(|i| i.reason), Some(HaltReason::Cancelled));
    }

    #[tokio::test]
    async fn test_page_limit_leaves_cursor() {
        let ledger = MemoryLedger::new();
        let store = store(2, 2);
        for i in 0..7 {
            publish(&ledger, &store, &format!("svc{}", i), "t").await;
        }
        let cancel = CancellationToken::new();

        let first = store.scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &cancel).await;
        assert_eq!(first.incomplete.as_ref().map(|i| i.reason.clone()), Some(HaltReason::PageLimit(2)));
        assert_eq!(first.discovered.len(), 4);
        assert_eq!(first.state.checkpoint.last_scanned_height, 0);

        let second = store.scan(&ledger, &key(), first.state, None, &mut NoCommit, &cancel).await;
        assert!(second.is_complete());
        assert_eq!(second.discovered.len(), 3);
        assert_eq!(second.state.cache.len(), 7);
    }

    #[tokio::test]
    async fn test_pages_commit_in_order() {
        let ledger = MemoryLedger::new();
        let store = store(1, 10);
        for i in 0..4 {
            publish(&ledger, &store, &format!("svc{}", i), "t").await;
        }
        // Page 1 completes last.
        ledger.delay_page(1, Duration::from_millis(50));
        let mut recorder = Recorder::default();

        let report = store
            .scan(&ledger, &key(), ScanState::default(), None, &mut recorder, &CancellationToken::new())
            .await;
        assert!(report.is_complete());
        let heights: Vec<u64> = report.discovered.iter().map(|r| r.height).collect();
        let mut sorted = heights.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(heights, sorted);
        let pages: Vec<Option<u32>> = recorder.0.iter().map(|s| s.cursor.map(|c| c.next_page)).collect();
        assert_eq!(pages, [Some(2), Some(3), Some(4), None]);
    }

    #[tokio::test]
    async fn test_client_side_filtering_and_noise() {
        let ledger = MemoryLedger::new();
        ledger.set_server_filter(false);
        let store = store(50, 10);
        publish(&ledger, &store, "real", "1").await;

        let foreign_key = Key::from_bytes([6; KEY_LEN]);
        let foreign = store.encode(&payload("evil", "x"), 1, &foreign_key).unwrap();
        ledger.submit_transfer(ADDR, ADDR, 1, &foreign.memo).await.unwrap();
        ledger.submit_transfer(ADDR, ADDR, 1, "hello there").await.unwrap();
        ledger.submit_transfer(ADDR, ADDR, 1, "").await.unwrap();
        let ours = store.encode(&payload("outgoing", "x"), 1, &key()).unwrap();
        ledger.submit_transfer(ADDR, "akash1other", 1, &ours.memo).await.unwrap();
        ledger.push(LedgerEntry {
            tx_hash: "DELEGATE".into(),
            height: 1,
            sender: ADDR.into(),
            recipient: ADDR.into(),
            amount: 1,
            memo: ours.memo.clone(),
            timestamp: None,
            msg_type: "/cosmos.staking.v1beta1.MsgDelegate".into(),
        });

        let report = store
            .scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &CancellationToken::new())
            .await;
        assert!(report.is_complete());
        assert_eq!(report.discovered.len(), 1);
        assert_eq!(report.discovered[0].service, "real");
        assert_eq!(report.stats.foreign, 2);
        assert_eq!(report.stats.undecryptable, 3);
    }

    #[tokio::test]
    async fn test_missing_hash_halts_page() {
        let ledger = MemoryLedger::new();
        let store = store(50, 10);
        ledger.push(LedgerEntry {
            tx_hash: String::new(),
            height: 3,
            sender: ADDR.into(),
            recipient: ADDR.into(),
            amount: 1,
            memo: "x".into(),
            timestamp: None,
            msg_type: SIMPLE_TRANSFER_TYPE.into(),
        });
        let report = store
            .scan(&ledger, &key(), ScanState::default(), None, &mut NoCommit, &CancellationToken::new())
            .await;
        assert!(matches!(
            report.incomplete.map(|i| i.reason),
            Some(HaltReason::InvalidEntry { page: 1, .. })
        ));
        assert!(report.state.cursor.is_none());
    }

    #[tokio::test]
    async fn test_persist_failure_halts() {
        let ledger = MemoryLedger::new();
        let store = store(50, 10);
        publish(&ledger, &store, "a", "1").await;
        let report = store
            .scan(&ledger, &key(), ScanState::default(), None, &mut Failing, &CancellationToken::new())
            .await;
        assert_eq!(
            report.incomplete.map(|i| i.reason),
            Some(HaltReason::PersistFailed("disk full".into()))
        );
        assert!(report.state.cache.is_empty());
    }

    #[tokio::test]
    async fn test_publish_rejected() {
        let ledger = MemoryLedger::new();
        let store = store(50, 10);
        ledger.reject_next_submit("insufficient fees");
        let err = store.publish(&ledger, ADDR, &payload("a", "1"), 1, &key()).await.unwrap_err();
        assert_eq!(err, LedgerError::Submission("insufficient fees".into()));
    }

    #[test]
    fn test_memo_limit() {
        let store = store(50, 10).with_max_memo_len(64);
        let big = payload("svc", &"x".repeat(200));
        assert!(matches!(store.encode(&big, 1, &key()), Err(LedgerError::InvalidInput(_))));
        let small = store.encode(&Map::new(), 7, &key()).unwrap();
        assert_eq!(small.recipient, ADDR);
        assert_eq!(small.amount, 7);
    }

    #[test]
    fn test_rejects_bad_options() {
        assert!(LedgerSecretStore::new("", options(50, 10)).is_err());
        assert!(LedgerSecretStore::new(ADDR, options(0, 10)).is_err());
    }
}
