use std::sync::{Arc, RwLock};

use crate::{replication::diff_mask::DiffMask, types::PeerId, types::PropertyIndex};

/// Broadcast channel carrying one replicable instance's property mutations
/// to every connection replicating it. Each connection registers its own
/// receiver mask, so "changed since my last acknowledged update" is tracked
/// independently per connection: two connections at different ack points
/// see different dirty sets.
pub struct MutChannel {
    property_count: PropertyIndex,
    receivers: Arc<RwLock<Vec<(PeerId, Arc<RwLock<DiffMask>>)>>>,
}

impl MutChannel {
    pub fn new(property_count: PropertyIndex) -> Self {
        Self {
            property_count,
            receivers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// The handle properties write through when mutated.
    pub fn mutator(&self) -> PropertyMutator {
        PropertyMutator {
            receivers: Arc::clone(&self.receivers),
        }
    }

    /// Register a connection's dirty mask. Starts clear: the spawn snapshot
    /// covers current state, so only subsequent mutations are deltas.
    pub fn register_receiver(&self, peer: PeerId) -> MutReceiver {
        let mask = Arc::new(RwLock::new(DiffMask::new(self.property_count)));
        self.receivers
            .write()
            .expect("mutation channel lock poisoned")
            .push((peer, Arc::clone(&mask)));
        MutReceiver { mask }
    }

    pub fn deregister_receiver(&self, peer: PeerId) {
        self.receivers
            .write()
            .expect("mutation channel lock poisoned")
            .retain(|(registered, _)| *registered != peer);
    }
}

/// Held (cloned) by each published property; marks the property's bit in
/// every registered receiver when the property is mutated.
#[derive(Clone)]
pub struct PropertyMutator {
    receivers: Arc<RwLock<Vec<(PeerId, Arc<RwLock<DiffMask>>)>>>,
}

impl PropertyMutator {
    pub fn mutate(&self, index: PropertyIndex) {
        let receivers = self
            .receivers
            .read()
            .expect("mutation channel lock poisoned");
        for (_, mask) in receivers.iter() {
            mask.write()
                .expect("mutation channel lock poisoned")
                .set_bit(index);
        }
    }
}

/// One connection's view of an instance's accumulated dirty bits.
pub struct MutReceiver {
    mask: Arc<RwLock<DiffMask>>,
}

impl MutReceiver {
    /// Take the accumulated dirty mask, leaving it clear.
    pub fn take_mask(&self) -> DiffMask {
        let mut mask = self.mask.write().expect("mutation channel lock poisoned");
        let taken = mask.clone();
        mask.clear();
        taken
    }

    /// Re-mark bits whose carrying packet was reported lost, so the next
    /// collection resends them.
    pub fn or_mask(&self, lost: &DiffMask) {
        self.mask
            .write()
            .expect("mutation channel lock poisoned")
            .or(lost);
    }
}
