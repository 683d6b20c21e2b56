//! Polynomial helpers shared by `quorum` and `reconstruct`.

use crate::core::gf256::GF256;

/// Evaluates `c[0] + c[1]*x + ... + c[k-1]*x^(k-1)` with Horner's method.
#[inline(always)]
pub(crate) fn evaluate_polynomial(coeffs: &[GF256], x: GF256) -> GF256 {
    let mut result = GF256(0);
    for &coeff in coeffs.iter().rev() {
        result = result * x + coeff;
    }
    result
}

/// Lagrange basis values at x = 0 for the given distinct, non-zero points.
///
/// `lambda_j = prod_{m != j} x_m / (x_m - x_j)`; subtraction is XOR in GF(2^8).
/// Returns `None` if two points coincide.
pub(crate) fn lagrange_at_zero(xs: &[GF256]) -> Option<Vec<GF256>> {
    let mut lambdas = Vec::with_capacity(xs.len());
    for (j, &xj) in xs.iter().enumerate() {
        let mut numerator = GF256(1);
        let mut denominator = GF256(1);
        for (m, &xm) in xs.iter().enumerate() {
            if m == j {
                continue;
            }
            numerator *= xm;
            denominator *= xm + xj;
        }
        lambdas.push(numerator.div(denominator)?);
    }
    Some(lambdas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polynomial_eval() {
        // f(x) = 1 + 2x
        let coeffs = [GF256(1), GF256(2)];
        assert_eq!(evaluate_polynomial(&coeffs, GF256(0)), GF256(1));
        assert_eq!(evaluate_polynomial(&coeffs, GF256(1)), GF256(3));
        assert_eq!(evaluate_polynomial(&coeffs, GF256(2)), GF256(5));
        assert_eq!(evaluate_polynomial(&coeffs, GF256(3)), GF256(7));
        assert_eq!(evaluate_polynomial(&[], GF256(9)), GF256(0));
    }

    #[test]
    fn test_lagrange_recovers_constant_term() {
        let coeffs = [GF256(0x42), GF256(0x17), GF256(0xA0)];
        let xs = [GF256(2), GF256(5), GF256(7)];
        let lambdas = lagrange_at_zero(&xs).unwrap();
        let mut acc = GF256(0);
        for (x, l) in xs.iter().zip(&lambdas) {
            acc += evaluate_polynomial(&coeffs, *x) * *l;
        }
        assert_eq!(acc, GF256(0x42));
    }

    #[test]
    fn test_lagrange_rejects_repeated_points() {
        assert!(lagrange_at_zero(&[GF256(3), GF256(3)]).is_none());
    }
}
