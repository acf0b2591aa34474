// An enum representing the different types of packets that can be
// sent/received

use replink_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedInteger};

#[derive(Copy, Debug, Clone, Eq, PartialEq)]
pub enum PacketType {
    // A packet containing channel payload fragments
    Data,
    // A packet sent to maintain the connection by preventing a timeout
    Heartbeat,
    // Sent by the initiating peer to open a connection
    HandshakeRequest,
    // Sent by the listening peer when the registry checksums match
    HandshakeAccept,
    // Sent by the listening peer when the registry checksums differ
    HandshakeReject,
    // Announces an orderly teardown
    Disconnect,
    // A Ping message, used to calculate RTT. Must be responded to with a
    // Pong message
    Ping,
    // A Pong message, the response to every Ping
    Pong,
}

// Most packets are Data, so that case costs a single bit.
impl Serde for PacketType {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let is_data = *self == PacketType::Data;
        is_data.ser(writer);

        if is_data {
            return;
        }

        let index = match self {
            PacketType::Data => 0,
            PacketType::Heartbeat => 0,
            PacketType::HandshakeRequest => 1,
            PacketType::HandshakeAccept => 2,
            PacketType::HandshakeReject => 3,
            PacketType::Disconnect => 4,
            PacketType::Ping => 5,
            PacketType::Pong => 6,
        };

        UnsignedInteger::<3>::new(index).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let is_data = bool::de(reader)?;
        if is_data {
            return Ok(PacketType::Data);
        }

        match UnsignedInteger::<3>::de(reader)?.get() {
            0 => Ok(PacketType::Heartbeat),
            1 => Ok(PacketType::HandshakeRequest),
            2 => Ok(PacketType::HandshakeAccept),
            3 => Ok(PacketType::HandshakeReject),
            4 => Ok(PacketType::Disconnect),
            5 => Ok(PacketType::Ping),
            6 => Ok(PacketType::Pong),
            // A malformed packet could carry any index; reject rather than
            // panic.
            _ => Err(SerdeErr),
        }
    }

    fn bit_length(&self) -> u32 {
        let mut output = 0;

        let is_data = *self == PacketType::Data;
        output += is_data.bit_length();

        if is_data {
            return output;
        }

        output + <UnsignedInteger<3> as ConstBitLength>::const_bit_length()
    }
}
