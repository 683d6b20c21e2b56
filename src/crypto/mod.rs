//! Symmetric primitives.
//!
//! - `kdf`: PBKDF2-HMAC-SHA256, turning a phrase or password plus salt into a [`Key`].
//! - `cipher`: ChaCha20-Poly1305 tokens that carry their own nonce.
//!
//! # Security
//! - Keys are zeroized on drop and redacted in `Debug`.
//! - Decryption never returns unauthenticated bytes: a wrong key and a
//!   tampered token are indistinguishable and both yield
//!   [`CryptoError::Authentication`].

pub mod cipher;
pub mod kdf;

use core::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub use cipher::{decrypt, encrypt, encrypt_with_rng};
pub use kdf::{derive, DEFAULT_ITERATIONS};

/// Length of every symmetric key in the crate.
pub const KEY_LEN: usize = 32;

/// Errors for key derivation and authenticated encryption.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Rejected before any work (empty phrase, zero iterations).
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrong key or altered token.
    #[error("authentication failed: wrong key or tampered token")]
    Authentication,
    /// The random number generator could not produce a nonce or salt.
    #[error("random number generator failure")]
    RngFailure,
}

/// A 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(***SENSITIVE***)")
    }
}
