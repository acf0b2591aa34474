use crate::types::UnitIndex;

/// The receiving half of one channel: buffers raw units as packets arrive
/// and releases them to the application according to the channel's delivery
/// guarantee.
pub trait ChannelReceiver {
    /// Accept a unit extracted from an incoming packet. Duplicate and (for
    /// the unreliable kind) stale arrivals are dropped here.
    fn buffer_unit(&mut self, index: UnitIndex, payload: Vec<u8>);

    /// Drain every unit currently cleared for delivery, in guarantee order.
    fn receive_units(&mut self) -> Vec<Vec<u8>>;
}
