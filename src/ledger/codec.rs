//! Memo encoding and the per-entry decode decision.
//!
//! # Memo format
//! `base64url(token)` where `token` is an [`crate::crypto::cipher`] token over
//! the JSON object of the payload.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use super::types::{LedgerEntry, SecretRecord};
use super::{LedgerError, SIMPLE_TRANSFER_TYPE};
use crate::crypto::{self, Key};

/// Service name used when a payload does not name one.
pub const UNKNOWN_SERVICE: &str = "unknown";

/// Why an entry did not produce a record. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Already in the secret cache.
    Cached,
    /// Not a plain transfer.
    NotSimpleTransfer,
    /// Sender or recipient is not the own address.
    NotSelfTransfer,
    EmptyMemo,
    /// Memo is not base64.
    NotBase64,
    /// Memo did not authenticate: a foreign or noise transaction.
    NotOurs,
    /// Authenticated, but the plaintext is not a JSON object.
    MalformedPayload,
}

/// Outcome of looking at one ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoOutcome {
    Decoded(SecretRecord),
    Skip(SkipReason),
    /// The entry breaks the collaborator contract; the page cannot be trusted.
    Fatal(LedgerError),
}

/// Encrypts `payload` under `key` and wraps it as a memo.
pub fn encode_memo(payload: &Map<String, Value>, key: &Key) -> Result<String, LedgerError> {
    let json = Zeroizing::new(
        serde_json::to_vec(payload).map_err(|e| LedgerError::InvalidInput(e.to_string()))?,
    );
    let token = crypto::encrypt(&json, key)?;
    Ok(URL_SAFE.encode(token))
}

/// Decides what `entry` is, relative to `own_address` and `key`.
///
/// The cache check is the caller's job; everything else happens here, in
/// the order: contract check, transfer type, self-transfer, memo decode.
pub fn decode_entry(entry: &LedgerEntry, own_address: &str, key: &Key) -> MemoOutcome {
    if entry.tx_hash.is_empty() {
        return MemoOutcome::Fatal(LedgerError::InvalidResponse(format!(
            "entry at height {} has no transaction hash",
            entry.height
        )));
    }
    if entry.msg_type != SIMPLE_TRANSFER_TYPE {
        return MemoOutcome::Skip(SkipReason::NotSimpleTransfer);
    }
    if entry.sender != own_address || entry.recipient != own_address {
        return MemoOutcome::Skip(SkipReason::NotSelfTransfer);
    }
    if entry.memo.is_empty() {
        return MemoOutcome::Skip(SkipReason::EmptyMemo);
    }

    let token = match URL_SAFE.decode(entry.memo.trim().as_bytes()) {
        Ok(token) => token,
        Err(_) => return MemoOutcome::Skip(SkipReason::NotBase64),
    };
    let plaintext = match crypto::decrypt(&token, key) {
        Ok(plaintext) => Zeroizing::new(plaintext),
        Err(_) => return MemoOutcome::Skip(SkipReason::NotOurs),
    };
    let payload = match serde_json::from_slice::<Value>(&plaintext) {
        Ok(Value::Object(map)) => map,
        _ => {
            log::warn!("Entry {} authenticated but carries no JSON object", entry.tx_hash);
            return MemoOutcome::Skip(SkipReason::MalformedPayload);
        }
    };

    let service = payload
        .get("service")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_SERVICE)
        .to_string();

    MemoOutcome::Decoded(SecretRecord {
        tx_hash: entry.tx_hash.clone(),
        height: entry.height,
        amount_code: entry.amount,
        service,
        payload,
        timestamp: entry.timestamp.clone(),
    })
}
