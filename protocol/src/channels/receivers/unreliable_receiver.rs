use log::trace;

use crate::{
    channels::receivers::channel_receiver::ChannelReceiver, types::UnitIndex,
    wrapping_number::sequence_greater_than,
};

/// Receiver for the unreliable channel. No reordering and no
/// retransmission: an arrival older than (or equal to) the newest already
/// seen has been superseded and is dropped.
pub struct UnreliableReceiver {
    newest_seen: Option<UnitIndex>,
    ready: Vec<Vec<u8>>,
}

impl UnreliableReceiver {
    pub fn new() -> Self {
        Self {
            newest_seen: None,
            ready: Vec::new(),
        }
    }
}

impl ChannelReceiver for UnreliableReceiver {
    fn buffer_unit(&mut self, index: UnitIndex, payload: Vec<u8>) {
        if let Some(newest) = self.newest_seen {
            if !sequence_greater_than(index, newest) {
                trace!("dropping stale unreliable unit {index}");
                return;
            }
        }
        self.newest_seen = Some(index);
        self.ready.push(payload);
    }

    fn receive_units(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.ready)
    }
}
