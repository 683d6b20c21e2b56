//! Quorum logic: splitting a secret into `n` shares with threshold `k`.
//!
//! # Security
//! - **Constant-Time**: Uses `GF256` arithmetic which is branch-free.
//! - **Zeroization**: Polynomial coefficients are zeroized after use.
//! - **Validation**: Checks threshold parameters (`2 <= k <= n`).

use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use super::polynomial::evaluate_polynomial;
use super::{secret_checksum, MpcError, Share};
use crate::core::gf256::GF256;

/// Splits a secret into `n` shares, requiring `k` shares to reconstruct.
///
/// Share indices are `1..=n`; every share records `k`, `n` and the checksum
/// of `secret`.
pub fn split_secret<R: RngCore + CryptoRng + ?Sized>(
    secret: &[u8],
    k: u8,
    n: u8,
    rng: &mut R,
) -> Result<Vec<Share>, MpcError> {
    if secret.is_empty() {
        return Err(MpcError::EmptyShare);
    }
    if k < 2 || k > n {
        return Err(MpcError::InvalidThreshold { k, n });
    }

    let checksum = secret_checksum(secret);

    // share_values[i] belongs to the share with index i + 1.
    let mut share_values: Vec<Vec<u8>> = (0..n).map(|_| Vec::with_capacity(secret.len())).collect();

    let mut random_buf = Zeroizing::new(vec![0u8; (k - 1) as usize]);
    let mut coeffs: Zeroizing<Vec<GF256>> = Zeroizing::new(Vec::with_capacity(k as usize));

    for &byte in secret {
        rng.try_fill_bytes(&mut random_buf)
            .map_err(|_| MpcError::RngFailure)?;

        coeffs.clear();
        coeffs.push(GF256(byte));
        coeffs.extend(random_buf.iter().map(|&r| GF256(r)));

        for (i, values) in share_values.iter_mut().enumerate() {
            let x = GF256(i as u8 + 1);
            values.push(evaluate_polynomial(&coeffs, x).0);
        }
    }

    share_values
        .into_iter()
        .enumerate()
        .map(|(i, value)| Share::new(i as u8 + 1, value, k, n, checksum))
        .collect()
}
