//! # Replink Serde
//! Bit-level serialization primitives shared by the replink protocol crates.
//!
//! Values are packed with bit granularity: a `bool` costs a single bit, an
//! enumerated value with five states costs three. Field order is the wire
//! contract; there is no self-describing framing beyond length prefixes.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod bit_reader;
mod bit_writer;
mod constants;
mod error;
mod integer;
mod serde;

pub use bit_reader::BitReader;
pub use bit_writer::{BitCounter, BitWrite, BitWriter};
pub use constants::{MTU_SIZE_BITS, MTU_SIZE_BYTES};
pub use error::SerdeErr;
pub use integer::{
    SignedInteger, SignedVariableInteger, UnsignedInteger, UnsignedVariableInteger,
};
pub use serde::{ConstBitLength, Serde};
