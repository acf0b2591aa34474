use crate::{
    bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr, serde::ConstBitLength,
    serde::Serde,
};

pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, false, BITS>;
pub type SignedInteger<const BITS: u8> = SerdeInteger<true, false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<false, true, BITS>;
pub type SignedVariableInteger<const BITS: u8> = SerdeInteger<true, true, BITS>;

/// An integer encoded with a declared bit width rather than a byte count.
///
/// Fixed-width (`VARIABLE = false`) integers spend exactly `BITS` bits (plus
/// a sign bit when `SIGNED`): the minimum width for the declared value range.
/// Variable-width integers spend `BITS`-sized chunks, each preceded by a
/// continue bit, so small values stay small on the wire; they are used for
/// length prefixes and ids whose typical magnitude is low.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> {
    value: i128,
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8>
    SerdeInteger<SIGNED, VARIABLE, BITS>
{
    /// # Panics
    ///
    /// Panics when the value does not fit the declared range: a negative
    /// value in an unsigned integer, or a magnitude that exceeds `BITS` for
    /// a fixed-width integer. Width declarations are a wire contract fixed
    /// at registration time, so violating one is a programming error.
    pub fn new<T: Into<i128>>(value: T) -> Self {
        let value = value.into();

        assert!(BITS > 0, "cannot create an integer with zero bits");
        assert!(BITS < 64, "cannot create an integer wider than 63 bits");
        assert!(
            SIGNED || value >= 0,
            "cannot encode a negative value in an unsigned integer"
        );
        if !VARIABLE {
            let max_value: i128 = 1 << BITS;
            assert!(
                value < max_value,
                "with {BITS} bits, cannot encode a value of magnitude {value} (max {max_value})"
            );
            assert!(
                value > -max_value,
                "with {BITS} bits, cannot encode a value of magnitude {value} (min {})",
                -max_value
            );
        }

        Self { value }
    }

    fn new_unchecked(value: i128) -> Self {
        Self { value }
    }

    pub fn get(&self) -> i128 {
        self.value
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> Serde
    for SerdeInteger<SIGNED, VARIABLE, BITS>
{
    fn ser(&self, writer: &mut dyn BitWrite) {
        let mut magnitude = self.value.unsigned_abs();

        if SIGNED {
            writer.write_bit(self.value < 0);
        }

        if VARIABLE {
            loop {
                let proceed = (magnitude >> BITS) != 0;
                writer.write_bit(proceed);
                for _ in 0..BITS {
                    writer.write_bit(magnitude & 1 != 0);
                    magnitude >>= 1;
                }
                if !proceed {
                    return;
                }
            }
        } else {
            for _ in 0..BITS {
                writer.write_bit(magnitude & 1 != 0);
                magnitude >>= 1;
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let negative = if SIGNED { reader.read_bit()? } else { false };

        let mut magnitude: u128 = 0;
        if VARIABLE {
            let mut shift: u32 = 0;
            loop {
                let proceed = reader.read_bit()?;
                for chunk_bit in 0..u32::from(BITS) {
                    if reader.read_bit()? {
                        let position = shift + chunk_bit;
                        if position >= 63 {
                            return Err(SerdeErr);
                        }
                        magnitude |= 1 << position;
                    }
                }
                shift += u32::from(BITS);
                if !proceed {
                    break;
                }
                if shift >= 63 {
                    // A malicious stream could extend chunks forever.
                    return Err(SerdeErr);
                }
            }
        } else {
            for index in 0..u32::from(BITS) {
                if reader.read_bit()? {
                    magnitude |= 1 << index;
                }
            }
        }

        let value = magnitude as i128;
        Ok(Self::new_unchecked(if negative { -value } else { value }))
    }

    fn bit_length(&self) -> u32 {
        let mut output: u32 = 0;
        if SIGNED {
            output += 1;
        }
        if VARIABLE {
            let mut magnitude = self.value.unsigned_abs();
            loop {
                output += 1 + u32::from(BITS);
                magnitude >>= BITS;
                if magnitude == 0 {
                    break;
                }
            }
        } else {
            output += u32::from(BITS);
        }
        output
    }
}

impl<const SIGNED: bool, const BITS: u8> ConstBitLength for SerdeInteger<SIGNED, false, BITS> {
    fn const_bit_length() -> u32 {
        let sign_bit = if SIGNED { 1 } else { 0 };
        sign_bit + u32::from(BITS)
    }
}
