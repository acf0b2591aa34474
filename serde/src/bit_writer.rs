use crate::constants::{MTU_SIZE_BITS, MTU_SIZE_BYTES};

/// A sink for bit-granular writes. Implemented by [`BitWriter`] (which
/// stores bits) and [`BitCounter`] (which only measures them, so callers can
/// check whether a value fits before committing it).
pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);
    fn write_byte(&mut self, byte: u8);
    fn is_counter(&self) -> bool;
    fn count_bits(&mut self, bits: u32);
}

/// Writes bits into a fixed, MTU-sized buffer. Bits fill each byte from the
/// least-significant position upward; [`BitReader`](crate::BitReader)
/// consumes them in the same order.
pub struct BitWriter {
    buffer: [u8; MTU_SIZE_BYTES],
    scratch: u8,
    scratch_index: u8,
    buffer_index: usize,
    bits_written: u32,
    bit_capacity: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_capacity(MTU_SIZE_BITS)
    }

    /// A writer whose capacity is capped below the MTU, for callers that
    /// must leave room for trailing data.
    pub fn with_capacity(bit_capacity: u32) -> Self {
        assert!(bit_capacity <= MTU_SIZE_BITS);
        Self {
            buffer: [0; MTU_SIZE_BYTES],
            scratch: 0,
            scratch_index: 0,
            buffer_index: 0,
            bits_written: 0,
            bit_capacity,
        }
    }

    pub fn bits_written(&self) -> u32 {
        self.bits_written
    }

    pub fn bits_free(&self) -> u32 {
        self.bit_capacity - self.bits_written
    }

    /// Set aside `bits` of capacity that later writes may not consume.
    /// Paired with [`release_bits`](Self::release_bits), this implements the
    /// continuation-bit pattern: reserve one bit up front, write payload,
    /// release and write the final continue-flag.
    pub fn reserve_bits(&mut self, bits: u32) {
        assert!(self.bit_capacity >= self.bits_written + bits);
        self.bit_capacity -= bits;
    }

    pub fn release_bits(&mut self, bits: u32) {
        self.bit_capacity += bits;
        assert!(self.bit_capacity <= MTU_SIZE_BITS);
    }

    /// A counter pre-loaded with this writer's current fill level, used to
    /// measure whether a prospective value would overflow the packet.
    pub fn counter(&self) -> BitCounter {
        BitCounter::new(self.bits_written, self.bit_capacity)
    }

    /// Flushes the partial scratch byte (zero-padded) and returns the
    /// written bytes.
    pub fn to_bytes(mut self) -> Box<[u8]> {
        if self.scratch_index > 0 {
            self.buffer[self.buffer_index] = self.scratch;
            self.buffer_index += 1;
        }
        self.buffer[0..self.buffer_index].into()
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        assert!(
            self.bits_written < self.bit_capacity,
            "BitWriter overflowed its capacity; callers must counter-check first"
        );
        if bit {
            self.scratch |= 1 << self.scratch_index;
        }
        self.scratch_index += 1;
        self.bits_written += 1;

        if self.scratch_index == 8 {
            self.buffer[self.buffer_index] = self.scratch;
            self.buffer_index += 1;
            self.scratch = 0;
            self.scratch_index = 0;
        }
    }

    fn write_byte(&mut self, byte: u8) {
        let mut temp = byte;
        for _ in 0..8 {
            self.write_bit(temp & 1 != 0);
            temp >>= 1;
        }
    }

    fn is_counter(&self) -> bool {
        false
    }

    fn count_bits(&mut self, _bits: u32) {
        panic!("BitWriter cannot count bits, use a BitCounter");
    }
}

/// Measures writes without storing them. `overflowed()` reports whether the
/// measured bits exceed the capacity the counter was created with.
pub struct BitCounter {
    bits_counted: u32,
    bit_capacity: u32,
}

impl BitCounter {
    pub fn new(start_bits: u32, bit_capacity: u32) -> Self {
        Self {
            bits_counted: start_bits,
            bit_capacity,
        }
    }

    pub fn overflowed(&self) -> bool {
        self.bits_counted > self.bit_capacity
    }

    pub fn bits_needed(&self) -> u32 {
        self.bits_counted
    }
}

impl BitWrite for BitCounter {
    fn write_bit(&mut self, _bit: bool) {
        self.bits_counted += 1;
    }

    fn write_byte(&mut self, _byte: u8) {
        self.bits_counted += 8;
    }

    fn is_counter(&self) -> bool {
        true
    }

    fn count_bits(&mut self, bits: u32) {
        self.bits_counted += bits;
    }
}
