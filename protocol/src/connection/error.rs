use thiserror::Error;

use crate::channels::error::ChannelError;

/// Structural failures while decoding an incoming datagram. Either way the
/// buffer is discarded whole: no partially-decoded state is ever applied,
/// and the processing loop continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    /// The header or channel framing was truncated or inconsistent.
    #[error("malformed packet: truncated or inconsistent header or framing")]
    MalformedPacket,

    /// A unit's contents failed to decode against its registered type.
    #[error("malformed payload: unit contents did not decode against the registered type")]
    MalformedPayload,
}

/// Errors surfaced by a connection's processing step. Fatal variants
/// (mismatch, retry exhaustion) become lifecycle transitions observable
/// through the connection-closed event.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("registered-type tables disagree: local checksum {local:#010x}, remote {remote:#010x}")]
    ProtocolMismatch { local: u32, remote: u32 },
}
