//! Secret reconstruction from shares.
//!
//! Lagrange interpolation at x = 0 over GF(256), followed by verification of
//! the split-time checksum. Submission order does not matter.
//!
//! # Security
//! - **Fail Closed**: fewer distinct shares than `k` is an error, never a
//!   plausible-looking wrong secret.
//! - **Validation**: Rejects shares from different splits and conflicting
//!   values for one index.

use zeroize::Zeroizing;

use super::polynomial::lagrange_at_zero;
use super::{constant_time_eq, secret_checksum, MpcError, Share};
use crate::core::gf256::GF256;

/// Reconstructs the secret from a list of shares.
///
/// Exact duplicates (same index, same value) are collapsed; the remaining
/// distinct shares must number at least `k`.
///
/// # Errors
/// * `InsufficientShares` - fewer than `k` distinct indices.
/// * `InconsistentShares` / `ShareLengthMismatch` - shares from different splits.
/// * `DuplicateShareIndex` - two different values for one index.
/// * `IntegrityFailure` - interpolation did not reproduce the checksum.
pub fn reconstruct_secret(shares: &[Share]) -> Result<Zeroizing<Vec<u8>>, MpcError> {
    let first = match shares.first() {
        Some(first) => first,
        None => return Err(MpcError::InsufficientShares { have: 0, need: 2 }),
    };

    for share in shares {
        share.validate()?;
        if share.value.len() != first.value.len() {
            return Err(MpcError::ShareLengthMismatch);
        }
        if !share.same_split(first) {
            return Err(MpcError::InconsistentShares);
        }
    }

    let mut distinct: Vec<&Share> = Vec::with_capacity(shares.len());
    for share in shares {
        match distinct.iter().find(|d| d.index == share.index) {
            Some(existing) if existing.value != share.value => {
                return Err(MpcError::DuplicateShareIndex(share.index));
            }
            Some(_) => {}
            None => distinct.push(share),
        }
    }

    if distinct.len() < first.k as usize {
        return Err(MpcError::InsufficientShares { have: distinct.len(), need: first.k });
    }
    distinct.sort_by_key(|s| s.index);

    let xs: Vec<GF256> = distinct.iter().map(|s| GF256(s.index)).collect();
    let lambdas = lagrange_at_zero(&xs).ok_or(MpcError::DuplicateShareIndex(first.index))?;

    // S[p] = sum_j share_j[p] * lambda_j
    let mut secret = Zeroizing::new(Vec::with_capacity(first.value.len()));
    for p in 0..first.value.len() {
        let mut sum = GF256(0);
        for (share, lambda) in distinct.iter().zip(&lambdas) {
            sum += GF256(share.value[p]) * *lambda;
        }
        secret.push(sum.0);
    }

    if !constant_time_eq(&secret_checksum(&secret), &first.checksum) {
        return Err(MpcError::IntegrityFailure);
    }

    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpc::quorum::split_secret;
    use crate::mpc::quorum::tests::CountingRng;
    use rand_core::OsRng;

    #[test]
    fn test_reconstruct_basic() {
        let mut rng = CountingRng(0x10);
        let secret = vec![0x42, 0x99, 0xAB];
        let shares = split_secret(&secret, 3, 5, &mut rng).unwrap();

        assert_eq!(*reconstruct_secret(&shares).unwrap(), secret);
        assert_eq!(*reconstruct_secret(&shares[0..3]).unwrap(), secret);

        let subset = [shares[1].clone(), shares[3].clone(), shares[4].clone()];
        assert_eq!(*reconstruct_secret(&subset).unwrap(), secret);
    }

    #[test]
    fn test_two_of_three_phrase() {
        let secret = b"alpha beta gamma";
        let shares = split_secret(secret, 2, 3, &mut OsRng).unwrap();
        assert_eq!(shares.len(), 3);

        for (a, b) in [(0, 1), (0, 2), (1, 2)] {
            let pair = [shares[a].clone(), shares[b].clone()];
            assert_eq!(&reconstruct_secret(&pair).unwrap()[..], &secret[..]);
        }

        assert_eq!(
            reconstruct_secret(&shares[..1]),
            Err(MpcError::InsufficientShares { have: 1, need: 2 })
        );
    }

    #[test]
    fn test_every_k_subset() {
        let secret = b"zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong";
        let shares = split_secret(secret, 3, 5, &mut OsRng).unwrap();
        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    // reversed submission order on purpose
                    let subset = [shares[c].clone(), shares[a].clone(), shares[b].clone()];
                    assert_eq!(&reconstruct_secret(&subset).unwrap()[..], &secret[..]);
                }
                let pair = [shares[a].clone(), shares[b].clone()];
                assert_eq!(
                    reconstruct_secret(&pair),
                    Err(MpcError::InsufficientShares { have: 2, need: 3 })
                );
            }
        }
    }

    #[test]
    fn test_exact_duplicates_do_not_count_twice() {
        let shares = split_secret(b"secret", 2, 3, &mut OsRng).unwrap();
        let dup = [shares[0].clone(), shares[0].clone()];
        assert_eq!(
            reconstruct_secret(&dup),
            Err(MpcError::InsufficientShares { have: 1, need: 2 })
        );
    }

    #[test]
    fn test_conflicting_duplicate_index() {
        let shares = split_secret(b"secret", 2, 3, &mut OsRng).unwrap();
        let mut forged = shares[1].clone();
        forged.index = 1;
        assert_eq!(
            reconstruct_secret(&[shares[0].clone(), forged]),
            Err(MpcError::DuplicateShareIndex(1))
        );
    }

    #[test]
    fn test_corrupted_share_fails_integrity() {
        let shares = split_secret(b"secret", 2, 3, &mut OsRng).unwrap();
        let mut bad = shares[1].clone();
        bad.value[0] ^= 0x01;
        assert_eq!(
            reconstruct_secret(&[shares[0].clone(), bad]),
            Err(MpcError::IntegrityFailure)
        );
    }

    #[test]
    fn test_mixed_splits_rejected() {
        let a = split_secret(b"secret-a", 2, 3, &mut OsRng).unwrap();
        let b = split_secret(b"secret-b", 2, 3, &mut OsRng).unwrap();
        assert_eq!(
            reconstruct_secret(&[a[0].clone(), b[1].clone()]),
            Err(MpcError::InconsistentShares)
        );
        let short = split_secret(b"s", 2, 3, &mut OsRng).unwrap();
        assert_eq!(
            reconstruct_secret(&[a[0].clone(), short[1].clone()]),
            Err(MpcError::ShareLengthMismatch)
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(
            reconstruct_secret(&[]),
            Err(MpcError::InsufficientShares { have: 0, need: 2 })
        );
    }
}
