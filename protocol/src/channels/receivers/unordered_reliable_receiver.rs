use std::collections::HashSet;

use crate::{
    channels::receivers::channel_receiver::ChannelReceiver, types::UnitIndex,
    wrapping_number::{sequence_greater_than, wrapping_diff},
};

/// How far behind the newest seen index the dedup window reaches. Arrivals
/// older than this are treated as duplicates; the bound keeps the seen-set
/// from growing without limit. It comfortably exceeds the worst-case
/// retransmission lifetime of a unit.
const DEDUPE_WINDOW: u16 = 1024;

/// Delivers reliable units in arrival order, suppressing duplicates with a
/// sliding window of recently seen indices.
pub struct UnorderedReliableReceiver {
    newest_seen: Option<UnitIndex>,
    seen: HashSet<UnitIndex>,
    ready: Vec<Vec<u8>>,
}

impl UnorderedReliableReceiver {
    pub fn new() -> Self {
        Self {
            newest_seen: None,
            seen: HashSet::new(),
            ready: Vec::new(),
        }
    }

    fn prune(&mut self) {
        let Some(newest) = self.newest_seen else {
            return;
        };
        self.seen
            .retain(|index| wrapping_diff(*index, newest) < i16::try_from(DEDUPE_WINDOW).unwrap_or(i16::MAX));
    }
}

impl ChannelReceiver for UnorderedReliableReceiver {
    fn buffer_unit(&mut self, index: UnitIndex, payload: Vec<u8>) {
        if let Some(newest) = self.newest_seen {
            let age = wrapping_diff(index, newest);
            if age >= i16::try_from(DEDUPE_WINDOW).unwrap_or(i16::MAX) {
                // too old to distinguish from a duplicate
                return;
            }
            if self.seen.contains(&index) {
                return;
            }
            if sequence_greater_than(index, newest) {
                self.newest_seen = Some(index);
            }
        } else {
            self.newest_seen = Some(index);
        }

        self.seen.insert(index);
        self.prune();
        self.ready.push(payload);
    }

    fn receive_units(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.ready)
    }
}
