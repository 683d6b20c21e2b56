//! GF(2^8) arithmetic.
//!
//! Finite field over the AES polynomial x^8 + x^4 + x^3 + x + 1 (0x11B).
//! Every secret byte is shared independently in this field, so share values
//! have exactly the length of the secret.
//!
//! # Design Choices
//! - **No Tables**: Multiplication is bit-serial with mask-based reduction, so
//!   execution time does not depend on the operands (no cache-timing leaks).
//! - **Branch-Free**: Conditionals use `wrapping_mul(!0u8)` masks.
//!
//! ```
//! use shardledger::core::gf256::GF256;
//! let a = GF256(0x57);
//! let b = GF256(0x83);
//! assert_eq!(a * b, GF256(0xC1));
//! assert_eq!(a + a, GF256(0));
//! ```

use core::ops::{Add, AddAssign, Mul, MulAssign};
use zeroize::Zeroize;

/// Low byte of the irreducible polynomial (full poly: 0x11B).
const POLY: u8 = 0x1B;

/// A field element.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Zeroize)]
#[repr(transparent)]
pub struct GF256(pub u8);

impl From<u8> for GF256 {
    #[inline(always)]
    fn from(value: u8) -> Self {
        GF256(value)
    }
}

impl From<GF256> for u8 {
    #[inline(always)]
    fn from(gf: GF256) -> u8 {
        gf.0
    }
}

/// Addition is XOR (characteristic 2), so it is also subtraction.
impl Add for GF256 {
    type Output = Self;

    #[inline(always)]
    fn add(self, rhs: Self) -> Self {
        GF256(self.0 ^ rhs.0)
    }
}

impl AddAssign for GF256 {
    #[inline(always)]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul for GF256 {
    type Output = Self;

    /// Bit-serial multiply with reduction modulo 0x11B. Fixed 8 rounds.
    #[inline(always)]
    fn mul(self, rhs: Self) -> Self {
        let mut result: u8 = 0;
        let mut a = self.0;
        let mut b = rhs.0;

        for _ in 0..8 {
            result ^= a & (b & 1).wrapping_mul(!0u8);
            let carry_mask = (a >> 7).wrapping_mul(!0u8);
            a = (a << 1) ^ (POLY & carry_mask);
            b >>= 1;
        }

        GF256(result)
    }
}

impl MulAssign for GF256 {
    #[inline(always)]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl GF256 {
    /// Multiplicative inverse via a^254. Returns 0 for 0 by convention;
    /// callers that divide must go through [`GF256::div`].
    #[inline(always)]
    pub fn inv(self) -> Self {
        let mut result = GF256(1);
        let mut base = self;
        let mut exp: u8 = 0xFE;

        for _ in 0..8 {
            let mask = (exp & 1).wrapping_mul(!0u8);
            let cond = GF256((base.0 & mask) | (1 & !mask));
            result *= cond;
            base = base * base;
            exp >>= 1;
        }

        result
    }

    /// `self / rhs`, `None` on division by zero.
    pub fn div(self, rhs: Self) -> Option<Self> {
        if rhs.0 == 0 {
            None
        } else {
            Some(self * rhs.inv())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        assert_eq!(GF256(0x01) + GF256(0x01), GF256(0x00));
        assert_eq!(GF256(0x80) + GF256(0x7F), GF256(0xFF));
    }

    #[test]
    fn test_mul() {
        assert_eq!(GF256(0x02) * GF256(0x03), GF256(0x06));
        // AES test vectors
        assert_eq!(GF256(0x02) * GF256(0x80), GF256(0x1B));
        assert_eq!(GF256(0x57) * GF256(0x83), GF256(0xC1));
        assert_eq!(GF256(0x57) * GF256(0x13), GF256(0xFE));
        assert_eq!(GF256(0x00) * GF256(0xFF), GF256(0x00));
        assert_eq!(GF256(0xFF) * GF256(0x01), GF256(0xFF));
    }

    #[test]
    fn test_inv() {
        assert_eq!(GF256(0x02).inv(), GF256(0x8D));
        assert_eq!(GF256(0x01).inv(), GF256(0x01));
        assert_eq!(GF256(0x00).inv(), GF256(0x00));
        assert_eq!(GF256(0x53).inv(), GF256(0xCA));
    }

    #[test]
    fn test_inv_exhaustive() {
        for a in 1u8..=255 {
            let x = GF256(a);
            assert_eq!(x * x.inv(), GF256(1), "inv({:02x})", a);
        }
    }

    #[test]
    fn test_div() {
        assert_eq!(GF256(0x02).div(GF256(0x02)), Some(GF256(0x01)));
        assert_eq!(GF256(0x02).div(GF256(0x00)), None);
        assert_eq!(GF256(0x00).div(GF256(0x01)), Some(GF256(0x00)));
    }
}
