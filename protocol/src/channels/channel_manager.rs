use std::{collections::HashMap, time::Instant};

use replink_serde::{
    BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr, UnsignedVariableInteger,
    MTU_SIZE_BITS,
};

use crate::{
    channels::{
        channel_kind::{ChannelKind, ReliableSettings},
        error::ChannelError,
        receivers::{
            channel_receiver::ChannelReceiver, ordered_reliable_receiver::OrderedReliableReceiver,
            unordered_reliable_receiver::UnorderedReliableReceiver,
            unreliable_receiver::UnreliableReceiver,
        },
        senders::{
            channel_sender::ChannelSender, reliable_sender::ReliableSender,
            unreliable_sender::UnreliableSender,
        },
        unit_bit_length,
    },
    types::{PacketIndex, UnitIndex},
};

/// Worst-case bits consumed by the packet header plus channel framing
/// (continue bits, channel tags, terminators). A unit whose framed size
/// exceeds `MTU_SIZE_BITS` minus this margin can never ride in any packet
/// and is rejected at enqueue time.
const PACKET_OVERHEAD_BITS: u32 = 128;

pub const MAX_UNIT_BITS: u32 = MTU_SIZE_BITS - PACKET_OVERHEAD_BITS;

/// Owns the three channels of one connection: multiplexes their queued
/// units into outgoing packets, demultiplexes incoming packet bodies, and
/// maps packet-level acknowledgments back onto the units each packet
/// carried.
pub struct ChannelManager {
    senders: HashMap<ChannelKind, Box<dyn ChannelSender>>,
    receivers: HashMap<ChannelKind, Box<dyn ChannelReceiver>>,
    packet_to_unit_map: HashMap<PacketIndex, Vec<(ChannelKind, Vec<UnitIndex>)>>,
}

impl ChannelManager {
    pub fn new(settings: &ReliableSettings) -> Self {
        let mut senders = HashMap::<ChannelKind, Box<dyn ChannelSender>>::new();
        senders.insert(
            ChannelKind::ReliableOrdered,
            Box::new(ReliableSender::new(ChannelKind::ReliableOrdered, *settings)),
        );
        senders.insert(
            ChannelKind::ReliableUnordered,
            Box::new(ReliableSender::new(
                ChannelKind::ReliableUnordered,
                *settings,
            )),
        );
        senders.insert(ChannelKind::Unreliable, Box::new(UnreliableSender::new()));

        let mut receivers = HashMap::<ChannelKind, Box<dyn ChannelReceiver>>::new();
        receivers.insert(
            ChannelKind::ReliableOrdered,
            Box::new(OrderedReliableReceiver::new()),
        );
        receivers.insert(
            ChannelKind::ReliableUnordered,
            Box::new(UnorderedReliableReceiver::new()),
        );
        receivers.insert(ChannelKind::Unreliable, Box::new(UnreliableReceiver::new()));

        Self {
            senders,
            receivers,
            packet_to_unit_map: HashMap::new(),
        }
    }

    fn sender(&mut self, kind: ChannelKind) -> &mut Box<dyn ChannelSender> {
        self.senders
            .get_mut(&kind)
            .unwrap_or_else(|| unreachable!("every channel kind is initialized in new()"))
    }

    // Outgoing

    /// Queue an encoded unit on a channel. Fails when the unit could never
    /// fit a single packet; this layer does not fragment.
    pub fn send_unit(
        &mut self,
        kind: ChannelKind,
        payload: Vec<u8>,
    ) -> Result<UnitIndex, ChannelError> {
        let bits = unit_bit_length(&payload);
        if bits > MAX_UNIT_BITS {
            return Err(ChannelError::UnitTooLarge {
                bits,
                capacity: MAX_UNIT_BITS,
            });
        }
        Ok(self.sender(kind).send_unit(payload))
    }

    /// Advance retransmission timers on the reliable channels.
    pub fn collect_resends(&mut self, now: Instant, rtt_millis: f32) -> Result<(), ChannelError> {
        for kind in ChannelKind::ALL {
            self.sender(kind).collect_resends(now, rtt_millis)?;
        }
        Ok(())
    }

    pub fn has_outgoing(&self) -> bool {
        self.senders.values().any(|sender| sender.has_outgoing())
    }

    pub fn has_unacked(&self) -> bool {
        self.senders.values().any(|sender| sender.has_unacked())
    }

    /// Write queued units into the body of the packet `packet_index`, as
    /// many as fit. The body is a sequence of channel sections, each a
    /// sequence of units, both terminated by continuation bits.
    pub fn write_packet(&mut self, writer: &mut BitWriter, packet_index: PacketIndex, now: Instant) {
        // hold back the channel-list terminator so it always fits
        writer.reserve_bits(1);

        for kind in ChannelKind::ALL {
            if !self.sender(kind).has_outgoing() {
                continue;
            }

            // check that the channel tag plus both terminators still fit
            let mut counter = writer.counter();
            counter.count_bits(2 + <ChannelKind as ConstBitLength>::const_bit_length());
            if counter.overflowed() {
                break;
            }

            // reserve the unit terminator, write the channel tag
            writer.reserve_bits(1);
            true.ser(writer);
            kind.ser(writer);

            let written = self.sender(kind).write_units(writer, now);
            if !written.is_empty() {
                self.packet_to_unit_map
                    .entry(packet_index)
                    .or_default()
                    .push((kind, written));
            }

            writer.release_bits(1);
            false.ser(writer);
        }

        // channel-list terminator
        writer.release_bits(1);
        false.ser(writer);
    }

    // Incoming

    /// Demultiplex one packet body. The whole body is parsed before any
    /// unit is committed to a receiver, so a malformed packet is discarded
    /// without partial application.
    pub fn read_packet(&mut self, reader: &mut BitReader) -> Result<(), SerdeErr> {
        let mut parsed: Vec<(ChannelKind, UnitIndex, Vec<u8>)> = Vec::new();

        loop {
            let channel_continue = bool::de(reader)?;
            if !channel_continue {
                break;
            }
            let kind = ChannelKind::de(reader)?;

            loop {
                let unit_continue = bool::de(reader)?;
                if !unit_continue {
                    break;
                }
                let index = UnitIndex::de(reader)?;
                let length = UnsignedVariableInteger::<7>::de(reader)?.get() as usize;
                if length * 8 > reader.bits_remaining() as usize {
                    return Err(SerdeErr);
                }
                let mut payload = Vec::with_capacity(length);
                for _ in 0..length {
                    payload.push(reader.read_byte()?);
                }
                parsed.push((kind, index, payload));
            }
        }

        for (kind, index, payload) in parsed {
            if let Some(receiver) = self.receivers.get_mut(&kind) {
                receiver.buffer_unit(index, payload);
            }
        }
        Ok(())
    }

    /// Drain the units a channel has cleared for delivery.
    pub fn receive_units(&mut self, kind: ChannelKind) -> Vec<Vec<u8>> {
        match self.receivers.get_mut(&kind) {
            Some(receiver) => receiver.receive_units(),
            None => Vec::new(),
        }
    }

    // Ack plumbing

    /// The packet was acknowledged: release its reliable units from
    /// retransmission tracking. Returns the packet's unit manifest so
    /// upper layers can settle their own per-unit records.
    pub fn notify_packet_delivered(
        &mut self,
        packet_index: PacketIndex,
    ) -> Vec<(ChannelKind, Vec<UnitIndex>)> {
        let Some(manifest) = self.packet_to_unit_map.remove(&packet_index) else {
            return Vec::new();
        };
        for (kind, units) in &manifest {
            let sender = self.sender(*kind);
            for unit in units {
                sender.notify_unit_delivered(*unit);
            }
        }
        manifest
    }

    /// The packet was lost. Reliable units stay tracked (their resend
    /// timers recover them); the manifest is returned so upper layers can
    /// recover unreliable content they care about.
    pub fn notify_packet_dropped(
        &mut self,
        packet_index: PacketIndex,
    ) -> Vec<(ChannelKind, Vec<UnitIndex>)> {
        self.packet_to_unit_map
            .remove(&packet_index)
            .unwrap_or_default()
    }
}
