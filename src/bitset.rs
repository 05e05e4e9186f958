//! IDL bitsets packed into the smallest fitting unsigned integer.

use crate::cdr::Cdr;
use crate::error::Result;
use crate::serializable::CdrSerializable;
use crate::size::CdrSizeCalculator;

/// An IDL bitset of `N` bits, `1 <= N <= 64`.
///
/// On the wire it is the smallest unsigned integer holding `N` bits.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Bitset<const N: usize>(u64);

impl<const N: usize> Bitset<N> {
    const VALID: () = assert!(N >= 1 && N <= 64, "a bitset holds 1 to 64 bits");

    const MASK: u64 = if N >= 64 { u64::MAX } else { (1 << N) - 1 };

    /// Bytes the bitset occupies on the wire.
    pub const WIRE_SIZE: usize = match N {
        0..=8 => 1,
        9..=16 => 2,
        17..=32 => 4,
        _ => 8,
    };

    pub fn new() -> Self {
        let () = Self::VALID;
        Bitset(0)
    }

    /// Bits above `N` are dropped.
    pub fn from_bits(bits: u64) -> Self {
        let () = Self::VALID;
        Bitset(bits & Self::MASK)
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn get(&self, bit: usize) -> bool {
        bit < N && self.0 & (1 << bit) != 0
    }

    /// Sets or clears `bit`; bits past `N` are ignored.
    pub fn set(&mut self, bit: usize, value: bool) {
        if bit >= N {
            return;
        }
        if value {
            self.0 |= 1 << bit;
        } else {
            self.0 &= !(1 << bit);
        }
    }
}

impl<const N: usize> CdrSerializable for Bitset<N> {
    const IS_PRIMITIVE: bool = true;

    fn calculate_serialized_size(
        &self,
        calc: &mut CdrSizeCalculator,
        current_alignment: &mut usize,
    ) -> usize {
        calc.calculate_primitive_size(Self::WIRE_SIZE, current_alignment)
    }

    fn serialize(&self, cdr: &mut Cdr<'_>) -> Result<()> {
        match Self::WIRE_SIZE {
            1 => cdr.serialize_u8(self.0 as u8),
            2 => cdr.serialize_u16(self.0 as u16),
            4 => cdr.serialize_u32(self.0 as u32),
            _ => cdr.serialize_u64(self.0),
        }
    }

    fn deserialize(&mut self, cdr: &mut Cdr<'_>) -> Result<()> {
        let bits = match Self::WIRE_SIZE {
            1 => u64::from(cdr.deserialize_u8()?),
            2 => u64::from(cdr.deserialize_u16()?),
            4 => u64::from(cdr.deserialize_u32()?),
            _ => cdr.deserialize_u64()?,
        };
        *self = Self::from_bits(bits);
        Ok(())
    }
}
