use std::time::Instant;

use replink_serde::BitWriter;

use crate::{channels::error::ChannelError, types::UnitIndex};

/// The sending half of one channel. Payloads are opaque encoded units; the
/// sender owns their queueing, on-wire framing and (for reliable kinds)
/// retransmission bookkeeping.
pub trait ChannelSender {
    /// Queue a unit for transmission, assigning it the channel's next index.
    fn send_unit(&mut self, payload: Vec<u8>) -> UnitIndex;

    /// Re-queue overdue unacknowledged units, applying the backoff
    /// schedule. Fails when a unit has exhausted its send attempts.
    fn collect_resends(&mut self, now: Instant, rtt_millis: f32) -> Result<(), ChannelError>;

    fn has_outgoing(&self) -> bool;

    /// Whether any sent unit is still awaiting acknowledgment. Always
    /// `false` for the unreliable kind.
    fn has_unacked(&self) -> bool;

    /// Write as many queued units into the packet as fit, in queue order,
    /// and return the indices written. Units that do not fit stay queued
    /// for the next packet.
    fn write_units(&mut self, writer: &mut BitWriter, now: Instant) -> Vec<UnitIndex>;

    /// A packet carrying this unit was acknowledged; stop tracking it.
    fn notify_unit_delivered(&mut self, unit: UnitIndex);
}
