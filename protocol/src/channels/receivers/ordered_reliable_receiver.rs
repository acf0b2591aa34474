use std::collections::VecDeque;

use crate::{
    channels::receivers::channel_receiver::ChannelReceiver, types::UnitIndex,
    wrapping_number::sequence_less_than,
};

enum UnitSlot {
    NotReceived,
    Received(Vec<u8>),
}

impl UnitSlot {
    fn is_not_received(&self) -> bool {
        matches!(self, UnitSlot::NotReceived)
    }
}

/// Withholds each received unit until every lower-indexed unit has been
/// delivered, so the application observes strict send order even when
/// packets race: arrivals [1,3,2] are released as [1,2,3].
pub struct OrderedReliableReceiver {
    buffer: VecDeque<(UnitIndex, UnitSlot)>,
    next_expected: UnitIndex,
    ready: Vec<Vec<u8>>,
}

impl OrderedReliableReceiver {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            next_expected: 0,
            ready: Vec::new(),
        }
    }

    fn slot_for(&mut self, index: UnitIndex) -> &mut UnitSlot {
        // extend the buffer up to the requested index; gaps are awaited
        let mut position = 0;
        loop {
            if position == self.buffer.len() {
                let next_index = self.next_expected.wrapping_add(position as u16);
                self.buffer.push_back((next_index, UnitSlot::NotReceived));
            }
            let slot_index = self.buffer[position].0;
            if slot_index == index {
                return &mut self.buffer[position].1;
            }
            position += 1;
        }
    }

    fn release_front(&mut self) {
        while let Some((_, UnitSlot::Received(_))) = self.buffer.front() {
            let Some((_, UnitSlot::Received(payload))) = self.buffer.pop_front() else {
                unreachable!("front was checked to be a received slot");
            };
            self.ready.push(payload);
            self.next_expected = self.next_expected.wrapping_add(1);
        }
    }
}

impl ChannelReceiver for OrderedReliableReceiver {
    fn buffer_unit(&mut self, index: UnitIndex, payload: Vec<u8>) {
        if sequence_less_than(index, self.next_expected) {
            // duplicate of a unit already delivered
            return;
        }

        let slot = self.slot_for(index);
        if slot.is_not_received() {
            *slot = UnitSlot::Received(payload);
        }

        self.release_front();
    }

    fn receive_units(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.ready)
    }
}
