/// Maximum size of a single outgoing datagram's payload.
/// 508 bytes is the conventional safe UDP payload size: packets at or below
/// it survive every sane path MTU without IP fragmentation.
pub const MTU_SIZE_BYTES: usize = 508;
pub const MTU_SIZE_BITS: u32 = (MTU_SIZE_BYTES as u32) * 8;
