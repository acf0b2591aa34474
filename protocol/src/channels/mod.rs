pub mod channel_kind;
pub mod channel_manager;
pub mod error;
pub mod receivers;
pub mod senders;

use replink_serde::{Serde, UnsignedVariableInteger};

/// Exact bit cost of one unit as framed on the wire:
/// continue bit + 16-bit unit index + byte-length varint + payload bytes.
pub(crate) fn unit_bit_length(payload: &[u8]) -> u32 {
    1 + 16
        + UnsignedVariableInteger::<7>::new(payload.len() as u64).bit_length()
        + (payload.len() as u32) * 8
}
