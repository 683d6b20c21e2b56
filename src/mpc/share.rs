//! Secret Share Definition.
//!
//! A share is a point `(x, y)` on the polynomials hiding the secret, plus the
//! metadata needed to reconstruct without outside context:
//! - `index` (x): non-zero, unique per custodian, `1..=n`.
//! - `value` (y): one evaluation per secret byte.
//! - `k`, `n`: the threshold configuration of the split.
//! - `checksum`: truncated BLAKE3 digest of the secret, identical in every share.
//!
//! # Security
//! - Implements `Zeroize` and `ZeroizeOnDrop` to wipe the value from memory.
//! - `Debug` implementation redacts the value.

use core::fmt;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{MpcError, CHECKSUM_LEN};

/// A share of a secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Share {
    /// The x-coordinate. Public (identifies the holder).
    #[zeroize(skip)]
    pub index: u8,

    /// Threshold required for reconstruction.
    #[zeroize(skip)]
    pub k: u8,

    /// Total number of shares issued.
    #[zeroize(skip)]
    pub n: u8,

    /// Digest of the secret, checked after interpolation.
    #[zeroize(skip)]
    #[serde(with = "hex")]
    pub checksum: [u8; CHECKSUM_LEN],

    /// The y-coordinates. Sensitive.
    #[serde(with = "hex")]
    pub value: Vec<u8>,
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.index)
            .field("k", &self.k)
            .field("n", &self.n)
            .field("length", &self.value.len())
            .field("value", &"***SENSITIVE***")
            .finish()
    }
}

impl Share {
    /// Creates a new share with validation.
    pub fn new(
        index: u8,
        value: Vec<u8>,
        k: u8,
        n: u8,
        checksum: [u8; CHECKSUM_LEN],
    ) -> Result<Self, MpcError> {
        let share = Self { index, k, n, checksum, value };
        share.validate()?;
        Ok(share)
    }

    /// Checks the invariants a deserialized share may have lost.
    pub fn validate(&self) -> Result<(), MpcError> {
        if self.k < 2 || self.k > self.n {
            return Err(MpcError::InvalidThreshold { k: self.k, n: self.n });
        }
        if self.index == 0 || self.index > self.n {
            return Err(MpcError::InvalidShareIndex(self.index));
        }
        if self.value.is_empty() {
            return Err(MpcError::EmptyShare);
        }
        Ok(())
    }

    /// Returns a reference to the value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// True if `other` was produced by the same split.
    pub fn same_split(&self, other: &Share) -> bool {
        self.k == other.k
            && self.n == other.n
            && self.checksum == other.checksum
            && self.value.len() == other.value.len()
    }
}
