use thiserror::Error;

/// Error emitted when a bitstream runs out of bits mid-decode or yields a
/// value outside the expected range. The caller must treat the whole
/// containing packet as malformed and discard it, never applying a partial
/// decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bitstream exhausted or invalid value encountered during decode")]
pub struct SerdeErr;
