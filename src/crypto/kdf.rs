//! Password-based key derivation.
//!
//! PBKDF2 with HMAC-SHA256. Deterministic: the same phrase, salt and
//! iteration count always produce the same key. The iteration count is the
//! brute-force cost knob; [`DEFAULT_ITERATIONS`] matches what existing
//! operators already derived their keys with.

use sha2::Sha256;
use zeroize::Zeroizing;

use super::{CryptoError, Key, KEY_LEN};

/// Default PBKDF2 round count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Derives a 32-byte key from `secret_phrase` and `salt`.
///
/// # Errors
/// * `CryptoError::InvalidInput` if the phrase is empty or `iterations` is 0.
pub fn derive(secret_phrase: &str, salt: &[u8], iterations: u32) -> Result<Key, CryptoError> {
    if secret_phrase.is_empty() {
        return Err(CryptoError::InvalidInput("empty secret phrase"));
    }
    if iterations == 0 {
        return Err(CryptoError::InvalidInput("zero kdf iterations"));
    }

    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(secret_phrase.as_bytes(), salt, iterations, &mut *out);
    Ok(Key::from_bytes(*out))
}
