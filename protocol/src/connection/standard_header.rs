use replink_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

use crate::{connection::packet_type::PacketType, types::PacketIndex};

/// The fixed header present on every outgoing packet, keep-alives included.
/// Carries the sender's sequence number, the highest sequence received from
/// the remote, and a bitfield acknowledging the 32 sequences before it, so
/// one header can confirm a burst of recent deliveries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StandardHeader {
    pub packet_type: PacketType,
    pub sender_packet_index: PacketIndex,
    pub last_remote_packet_index: PacketIndex,
    pub ack_field: u32,
}

impl StandardHeader {
    pub fn new(
        packet_type: PacketType,
        sender_packet_index: PacketIndex,
        last_remote_packet_index: PacketIndex,
        ack_field: u32,
    ) -> Self {
        Self {
            packet_type,
            sender_packet_index,
            last_remote_packet_index,
            ack_field,
        }
    }
}

impl Serde for StandardHeader {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.packet_type.ser(writer);
        self.sender_packet_index.ser(writer);
        self.last_remote_packet_index.ser(writer);
        self.ack_field.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            packet_type: PacketType::de(reader)?,
            sender_packet_index: PacketIndex::de(reader)?,
            last_remote_packet_index: PacketIndex::de(reader)?,
            ack_field: u32::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.packet_type.bit_length()
            + <PacketIndex as ConstBitLength>::const_bit_length() * 2
            + <u32 as ConstBitLength>::const_bit_length()
    }
}
