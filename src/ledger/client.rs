//! Ledger collaborators.
//!
//! The core never talks to an RPC endpoint itself. Transport, signing and
//! broadcasting live behind these two traits.

use async_trait::async_trait;

use super::types::{SortOrder, SubmitReceipt, TransferPage};
use super::LedgerError;

/// Read side: history of an address.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// Returns page `page` (1-based) of transfers involving `address` with
    /// `height >= from_height`, ordered by height.
    ///
    /// Implementations should filter server-side on `sender == recipient ==
    /// address` where the backend allows it; the caller re-checks every
    /// entry either way.
    async fn query_own_transfers(
        &self,
        address: &str,
        from_height: u64,
        page: u32,
        page_size: u32,
        order: SortOrder,
    ) -> Result<TransferPage, LedgerError>;
}

/// Write side: signing and broadcasting a transfer.
#[async_trait]
pub trait LedgerSubmit: Send + Sync {
    /// Sends `amount` from `wallet` to `recipient` with `memo`.
    ///
    /// A transfer the ledger refused is `Ok` with `success == false`;
    /// `Err` is reserved for transport failures.
    async fn submit_transfer(
        &self,
        wallet: &str,
        recipient: &str,
        amount: u64,
        memo: &str,
    ) -> Result<SubmitReceipt, LedgerError>;
}
