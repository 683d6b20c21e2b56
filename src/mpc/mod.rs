//! Threshold secret sharing.
//!
//! Shamir's scheme over GF(256): every secret byte is the constant term of
//! its own random polynomial of degree k-1, and share `i` holds the
//! evaluations at `x = i`.
//!
//! # Components
//! - `share`: A single share, self-describing (index, k, n, checksum).
//! - `quorum`: Threshold validation and polynomial generation (split).
//! - `reconstruct`: Lagrange interpolation at x = 0 plus checksum verification.
//! - `master`: The mnemonic master secret.
//!
//! # Security
//! - **Constant-Time**: All GF(256) operations are constant-time.
//! - **Zeroization**: Share values, coefficients and secrets are zeroized on drop.
//! - **Integrity**: Every share carries a truncated BLAKE3 digest of the
//!   secret; interpolating the wrong set of points fails closed.

pub mod master;
pub mod quorum;
pub mod reconstruct;
pub mod share;
pub(crate) mod polynomial;

pub use master::MasterSecret;
pub use quorum::split_secret;
pub use reconstruct::reconstruct_secret;
pub use share::Share;

/// Length of the split-time checksum stored in every share.
pub const CHECKSUM_LEN: usize = 8;

/// Errors for secret sharing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MpcError {
    /// Share index outside 1..=n.
    #[error("invalid share index {0}")]
    InvalidShareIndex(u8),
    /// Secret or share value is empty.
    #[error("empty secret or share value")]
    EmptyShare,
    /// Threshold configuration error (k > n, k < 2).
    #[error("invalid threshold {k}-of-{n}")]
    InvalidThreshold { k: u8, n: u8 },
    /// Fewer distinct shares than the threshold.
    #[error("insufficient shares: have {have}, need {need}")]
    InsufficientShares { have: usize, need: u8 },
    /// Two different share values claim the same index.
    #[error("conflicting shares for index {0}")]
    DuplicateShareIndex(u8),
    /// Shares disagree on k, n or checksum; they come from different splits.
    #[error("shares come from different splits")]
    InconsistentShares,
    /// Mismatch in share lengths.
    #[error("share length mismatch")]
    ShareLengthMismatch,
    /// Interpolated secret does not match the split-time checksum.
    #[error("reconstructed secret failed its integrity check")]
    IntegrityFailure,
    /// Random number generator failure.
    #[error("random number generator failure")]
    RngFailure,
    /// Not a mnemonic of 12, 15, 18, 21 or 24 words.
    #[error("invalid mnemonic: {0} words")]
    InvalidMnemonic(usize),
}

/// Truncated BLAKE3 digest used to verify a reconstruction.
pub(crate) fn secret_checksum(secret: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = blake3::hash(secret);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest.as_bytes()[..CHECKSUM_LEN]);
    out
}

#[inline(never)]
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
