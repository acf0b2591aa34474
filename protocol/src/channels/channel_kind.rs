use replink_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedInteger};

/// The delivery guarantee of one logical channel. Every connection owns one
/// independently sequenced channel of each kind, multiplexed over the
/// packet stream; ordering is promised within a channel only, never across
/// channels or connections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Retransmitted until acknowledged, delivered strictly in send order.
    ReliableOrdered,
    /// Retransmitted until acknowledged, delivered in arrival order,
    /// duplicates suppressed.
    ReliableUnordered,
    /// Fire-and-forget; stale or duplicate arrivals are dropped by sequence
    /// comparison.
    Unreliable,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [
        ChannelKind::ReliableOrdered,
        ChannelKind::ReliableUnordered,
        ChannelKind::Unreliable,
    ];

    pub fn reliable(&self) -> bool {
        !matches!(self, ChannelKind::Unreliable)
    }
}

impl Serde for ChannelKind {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let index = match self {
            ChannelKind::ReliableOrdered => 0,
            ChannelKind::ReliableUnordered => 1,
            ChannelKind::Unreliable => 2,
        };
        UnsignedInteger::<2>::new(index).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match UnsignedInteger::<2>::de(reader)?.get() {
            0 => Ok(ChannelKind::ReliableOrdered),
            1 => Ok(ChannelKind::ReliableUnordered),
            2 => Ok(ChannelKind::Unreliable),
            _ => Err(SerdeErr),
        }
    }

    fn bit_length(&self) -> u32 {
        <Self as ConstBitLength>::const_bit_length()
    }
}

impl ConstBitLength for ChannelKind {
    fn const_bit_length() -> u32 {
        <UnsignedInteger<2> as ConstBitLength>::const_bit_length()
    }
}

/// Retransmission tunables shared by the reliable channel kinds. The right
/// schedule depends on the deployment, so these are explicit configuration
/// with conservative defaults rather than hard-coded constants.
#[derive(Clone, Copy, Debug)]
pub struct ReliableSettings {
    /// First resend fires after `rtt_resend_factor * rtt` milliseconds.
    pub rtt_resend_factor: f32,
    /// Each subsequent resend doubles the wait, capped at this multiple of
    /// the base interval.
    pub backoff_cap_factor: u32,
    /// Total transmissions allowed per unit (first send included) before
    /// the channel reports retry exhaustion and the connection tears down.
    pub max_send_attempts: u16,
}

impl Default for ReliableSettings {
    fn default() -> Self {
        Self {
            rtt_resend_factor: 1.5,
            backoff_cap_factor: 8,
            max_send_attempts: 10,
        }
    }
}
