use crate::types::PacketIndex;

/// Implemented by senders that track the fate of the packets their units
/// rode in. The ack manager drives these callbacks while processing
/// incoming headers.
pub trait PacketNotifiable {
    /// The remote acknowledged this packet.
    fn notify_packet_delivered(&mut self, packet_index: PacketIndex);

    /// This packet fell out of the ack window without being acknowledged;
    /// treat its contents as lost.
    fn notify_packet_dropped(&mut self, packet_index: PacketIndex);
}
