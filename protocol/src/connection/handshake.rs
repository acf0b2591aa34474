use std::time::Instant;

use replink_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

use crate::{connection::connection_config::ConnectionConfig, timer::Timer};

/// Sent by the initiating peer until answered. The registry checksum
/// guards against the two processes disagreeing on type-id assignment,
/// which would silently corrupt every subsequent decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Identifies this connect attempt across retransmissions.
    pub nonce: u64,
    pub registry_checksum: u32,
}

impl Serde for HandshakeRequest {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.nonce.ser(writer);
        self.registry_checksum.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            nonce: u64::de(reader)?,
            registry_checksum: u32::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        <u64 as ConstBitLength>::const_bit_length() + <u32 as ConstBitLength>::const_bit_length()
    }
}

/// Answer to a matching [`HandshakeRequest`]; echoes the nonce so the
/// initiator can pair it with its attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeAccept {
    pub nonce: u64,
}

impl Serde for HandshakeAccept {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.nonce.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            nonce: u64::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        <u64 as ConstBitLength>::const_bit_length()
    }
}

/// Answer to a request whose registry checksum did not match. The
/// connection never opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandshakeReject {
    pub nonce: u64,
}

impl Serde for HandshakeReject {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.nonce.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            nonce: u64::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        <u64 as ConstBitLength>::const_bit_length()
    }
}

/// Initiator-side handshake progress: the request is re-sent on a timer
/// until accepted, rejected, or out of attempts.
pub struct Handshake {
    pub nonce: u64,
    resend_timer: Timer,
    attempts_remaining: u16,
}

impl Handshake {
    pub fn new(config: &ConnectionConfig) -> Self {
        // ring immediately so the first request goes out on the next tick
        let mut resend_timer = Timer::new(config.handshake_resend_interval);
        resend_timer.ring_manual();
        Self {
            nonce: fastrand::u64(..),
            resend_timer,
            attempts_remaining: config.handshake_max_attempts,
        }
    }

    /// Whether a (re)send is due. Returns `None` when attempts are
    /// exhausted and the connection should give up.
    pub fn poll_send(&mut self, now: Instant) -> Option<bool> {
        if !self.resend_timer.ringing(now) {
            return Some(false);
        }
        if self.attempts_remaining == 0 {
            return None;
        }
        self.attempts_remaining -= 1;
        self.resend_timer.reset(now);
        Some(true)
    }
}
