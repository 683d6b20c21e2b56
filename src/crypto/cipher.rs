//! Authenticated encryption tokens.
//!
//! # Format
//! `[Version (1)] [Nonce (12)] [Ciphertext || Tag (16)]`
//!
//! The version byte is bound as associated data, so it cannot be flipped
//! without failing authentication. A token needs nothing but the key to
//! decrypt.

use alloc::vec::Vec;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key as AeadKey, Nonce};
use rand_core::{CryptoRng, OsRng, RngCore};

use super::{CryptoError, Key};

const TOKEN_VERSION: u8 = 0x01;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 1 + NONCE_LEN;

/// Encrypts `plaintext` under `key` with a fresh nonce from the OS RNG.
pub fn encrypt(plaintext: &[u8], key: &Key) -> Result<Vec<u8>, CryptoError> {
    encrypt_with_rng(plaintext, key, &mut OsRng)
}

/// Encrypts `plaintext` under `key`, drawing the nonce from `rng`.
pub fn encrypt_with_rng<R: RngCore + CryptoRng + ?Sized>(
    plaintext: &[u8],
    key: &Key,
    rng: &mut R,
) -> Result<Vec<u8>, CryptoError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.try_fill_bytes(&mut nonce_bytes)
        .map_err(|_| CryptoError::RngFailure)?;

    let cipher = ChaCha20Poly1305::new(AeadKey::from_slice(key.as_bytes()));
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload { msg: plaintext, aad: &[TOKEN_VERSION] },
        )
        .map_err(|_| CryptoError::Authentication)?;

    let mut token = Vec::with_capacity(HEADER_LEN + sealed.len());
    token.push(TOKEN_VERSION);
    token.extend_from_slice(&nonce_bytes);
    token.extend_from_slice(&sealed);
    Ok(token)
}

/// Decrypts a token produced by [`encrypt`].
///
/// # Errors
/// * `CryptoError::Authentication` for a wrong key, a truncated or altered
///   token, or an unknown version byte.
pub fn decrypt(token: &[u8], key: &Key) -> Result<Vec<u8>, CryptoError> {
    if token.len() < HEADER_LEN + TAG_LEN || token[0] != TOKEN_VERSION {
        return Err(CryptoError::Authentication);
    }

    let (header, sealed) = token.split_at(HEADER_LEN);
    let cipher = ChaCha20Poly1305::new(AeadKey::from_slice(key.as_bytes()));
    cipher
        .decrypt(
            Nonce::from_slice(&header[1..]),
            Payload { msg: sealed, aad: &header[..1] },
        )
        .map_err(|_| CryptoError::Authentication)
}
