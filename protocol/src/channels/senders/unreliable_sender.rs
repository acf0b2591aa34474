use std::{collections::VecDeque, time::Instant};

use replink_serde::{BitWrite, BitWriter, Serde, UnsignedVariableInteger};

use crate::{
    channels::{error::ChannelError, senders::channel_sender::ChannelSender, unit_bit_length},
    types::UnitIndex,
};

/// Fire-and-forget sender: units are written once and forgotten. Loss
/// recovery, where it matters, happens above the channel (the replication
/// layer re-marks dirty masks when the ack manager reports a dropped
/// update packet).
pub struct UnreliableSender {
    next_index: UnitIndex,
    outgoing: VecDeque<(UnitIndex, Vec<u8>)>,
}

impl UnreliableSender {
    pub fn new() -> Self {
        Self {
            next_index: 0,
            outgoing: VecDeque::new(),
        }
    }
}

impl ChannelSender for UnreliableSender {
    fn send_unit(&mut self, payload: Vec<u8>) -> UnitIndex {
        let index = self.next_index;
        self.next_index = self.next_index.wrapping_add(1);
        self.outgoing.push_back((index, payload));
        index
    }

    fn collect_resends(&mut self, _now: Instant, _rtt_millis: f32) -> Result<(), ChannelError> {
        Ok(())
    }

    fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn has_unacked(&self) -> bool {
        false
    }

    fn write_units(&mut self, writer: &mut BitWriter, _now: Instant) -> Vec<UnitIndex> {
        let mut written = Vec::new();

        while let Some((index, payload)) = self.outgoing.front() {
            let bits = unit_bit_length(payload);
            let mut counter = writer.counter();
            counter.count_bits(bits);
            if counter.overflowed() {
                break;
            }

            true.ser(writer);
            index.ser(writer);
            UnsignedVariableInteger::<7>::new(payload.len() as u64).ser(writer);
            for byte in payload {
                byte.ser(writer);
            }

            written.push(*index);
            self.outgoing.pop_front();
        }

        written
    }

    fn notify_unit_delivered(&mut self, _unit: UnitIndex) {}
}
