//! Quadruple precision floats for IDL `long double`.

use std::fmt;

const SIGN: u128 = 1 << 127;
const EXP_SHIFT: u32 = 112;
const EXP_MASK: u128 = 0x7FFF;
const EXP_BIAS: i32 = 16383;
const FRACTION_MASK: u128 = (1 << EXP_SHIFT) - 1;

const F64_EXP_BIAS: i32 = 1023;
const F64_FRACTION_BITS: u32 = 52;
// Fraction bits dropped when narrowing to f64.
const NARROWING: u32 = EXP_SHIFT - F64_FRACTION_BITS;

/// An IDL `long double`: an IEEE 754 binary128 value.
///
/// Rust has no quadruple precision float, so the value is kept as its bit
/// pattern. Every `f64` converts to it exactly.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct LongDouble(u128);

impl LongDouble {
    pub const fn from_bits(bits: u128) -> Self {
        LongDouble(bits)
    }

    pub const fn to_bits(self) -> u128 {
        self.0
    }

    /// Narrows to the nearest `f64`, ties to even.
    pub fn to_f64(self) -> f64 {
        let sign = if self.0 & SIGN != 0 { 1u64 << 63 } else { 0 };
        let exp = ((self.0 >> EXP_SHIFT) & EXP_MASK) as i32;
        let fraction = self.0 & FRACTION_MASK;

        let magnitude = if exp == EXP_MASK as i32 {
            if fraction == 0 {
                0x7FF0_0000_0000_0000
            } else {
                0x7FF8_0000_0000_0000 | (fraction >> NARROWING) as u64
            }
        } else if exp == 0 {
            // Below the smallest f64 subnormal.
            0
        } else {
            let unbiased = exp - EXP_BIAS;
            if unbiased > F64_EXP_BIAS {
                0x7FF0_0000_0000_0000
            } else if unbiased >= 1 - F64_EXP_BIAS {
                let biased = (unbiased + F64_EXP_BIAS) as u64;
                // A carry out of the fraction bumps the exponent, up to infinity.
                (biased << F64_FRACTION_BITS) + round_shift(fraction, NARROWING) as u64
            } else {
                let significand = (1u128 << EXP_SHIFT) | fraction;
                let shift = (NARROWING as i32 + 1 - F64_EXP_BIAS - unbiased) as u32;
                round_shift(significand, shift) as u64
            }
        };
        f64::from_bits(sign | magnitude)
    }
}

fn round_shift(v: u128, shift: u32) -> u128 {
    if shift == 0 {
        return v;
    }
    if shift >= 128 {
        return 0;
    }
    let quotient = v >> shift;
    let remainder = v & ((1 << shift) - 1);
    let half = 1 << (shift - 1);
    if remainder > half || (remainder == half && quotient & 1 == 1) {
        quotient + 1
    } else {
        quotient
    }
}

impl From<f64> for LongDouble {
    fn from(v: f64) -> Self {
        let bits = v.to_bits();
        let sign = if bits >> 63 != 0 { SIGN } else { 0 };
        let exp = ((bits >> F64_FRACTION_BITS) & 0x7FF) as i32;
        let fraction = u128::from(bits & ((1 << F64_FRACTION_BITS) - 1));

        let magnitude = match (exp, fraction) {
            (0, 0) => 0,
            (0, _) => {
                // Subnormal: normalize around the leading one.
                let top = 127 - fraction.leading_zeros();
                let unbiased = top as i32 - F64_EXP_BIAS + 1 - F64_FRACTION_BITS as i32;
                let biased = (unbiased + EXP_BIAS) as u128;
                let rest = fraction & !(1 << top);
                (biased << EXP_SHIFT) | (rest << (EXP_SHIFT - top))
            }
            (0x7FF, _) => (EXP_MASK << EXP_SHIFT) | (fraction << NARROWING),
            _ => {
                let biased = (exp - F64_EXP_BIAS + EXP_BIAS) as u128;
                (biased << EXP_SHIFT) | (fraction << NARROWING)
            }
        };
        LongDouble(sign | magnitude)
    }
}

impl From<f32> for LongDouble {
    fn from(v: f32) -> Self {
        LongDouble::from(f64::from(v))
    }
}

impl From<LongDouble> for f64 {
    fn from(v: LongDouble) -> Self {
        v.to_f64()
    }
}

impl fmt::Debug for LongDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LongDouble({:?})", self.to_f64())
    }
}

impl fmt::Display for LongDouble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_f64(), f)
    }
}
