use std::collections::HashMap;

use crate::{
    protocol::kinds::ReplicableKind,
    replication::{error::ReplicationError, mut_channel::MutChannel, replicable::Replicable},
    types::{NetworkId, PeerId},
};

/// A canonical replicable instance hosted by this peer, with its mutation
/// broadcast channel and optional owning connection.
pub struct HostInstance {
    pub replicable: Box<dyn Replicable>,
    pub kind: ReplicableKind,
    pub mut_channel: MutChannel,
    pub owner: Option<PeerId>,
}

/// The set of replicables this peer is authoritative for. Network ids are
/// allocated here at spawn and broadcast to every connection the instance
/// is relevant to; retiring an instance queues a tombstone that each
/// connection converts into a despawn action.
pub struct HostWorld {
    instances: HashMap<NetworkId, HostInstance>,
    next_id: u16,
    retired: Vec<NetworkId>,
}

impl HostWorld {
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
            next_id: 0,
            retired: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> Result<NetworkId, ReplicationError> {
        // wrapping counter, skipping ids still in use
        for _ in 0..=u16::MAX {
            let candidate = NetworkId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            if !self.instances.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(ReplicationError::IdSpaceExhausted)
    }

    /// Take authority over an instance: assign it a network id and attach
    /// change tracking to its properties.
    pub fn spawn(
        &mut self,
        mut replicable: Box<dyn Replicable>,
        kind: ReplicableKind,
        owner: Option<PeerId>,
    ) -> Result<NetworkId, ReplicationError> {
        let network_id = self.allocate_id()?;
        let mut_channel = MutChannel::new(replicable.property_count());
        replicable.publish(&mut_channel.mutator());
        self.instances.insert(
            network_id,
            HostInstance {
                replicable,
                kind,
                mut_channel,
                owner,
            },
        );
        Ok(network_id)
    }

    /// Retire an instance. The canonical object is dropped here; the
    /// tombstone stays queued until the coordinator has offered it to
    /// every connection this tick.
    pub fn despawn(&mut self, network_id: NetworkId) -> Result<(), ReplicationError> {
        if self.instances.remove(&network_id).is_none() {
            return Err(ReplicationError::UnknownInstance { network_id });
        }
        self.retired.push(network_id);
        Ok(())
    }

    pub fn get(&self, network_id: NetworkId) -> Option<&HostInstance> {
        self.instances.get(&network_id)
    }

    pub fn get_mut(&mut self, network_id: NetworkId) -> Option<&mut HostInstance> {
        self.instances.get_mut(&network_id)
    }

    pub fn contains(&self, network_id: NetworkId) -> bool {
        self.instances.contains_key(&network_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NetworkId, &HostInstance)> {
        self.instances.iter().map(|(id, instance)| (*id, instance))
    }

    pub fn retired(&self) -> &[NetworkId] {
        &self.retired
    }

    /// Forget this tick's tombstones once every connection has seen them.
    pub fn clear_retired(&mut self) {
        self.retired.clear();
    }
}
