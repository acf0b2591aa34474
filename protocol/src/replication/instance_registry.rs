use std::collections::HashMap;

use crate::{
    protocol::kinds::ReplicableKind,
    replication::{error::ReplicationError, replicable::Replicable},
    types::NetworkId,
};

/// Per-connection map between network ids and the local shadow instances
/// built for them. Entries appear when the remote's spawn action arrives
/// and disappear on tombstone or connection teardown; the registry lives
/// exactly as long as its connection.
pub struct InstanceRegistry {
    instances: HashMap<NetworkId, RegisteredInstance>,
}

pub struct RegisteredInstance {
    pub replicable: Box<dyn Replicable>,
    pub kind: ReplicableKind,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self {
            instances: HashMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        network_id: NetworkId,
        kind: ReplicableKind,
        replicable: Box<dyn Replicable>,
    ) -> Result<(), ReplicationError> {
        if self.instances.contains_key(&network_id) {
            return Err(ReplicationError::DuplicateInstance { network_id });
        }
        self.instances
            .insert(network_id, RegisteredInstance { replicable, kind });
        Ok(())
    }

    pub fn remove(&mut self, network_id: NetworkId) -> Option<RegisteredInstance> {
        self.instances.remove(&network_id)
    }

    pub fn contains(&self, network_id: NetworkId) -> bool {
        self.instances.contains_key(&network_id)
    }

    pub fn get(&self, network_id: NetworkId) -> Option<&RegisteredInstance> {
        self.instances.get(&network_id)
    }

    pub fn get_mut(&mut self, network_id: NetworkId) -> Option<&mut RegisteredInstance> {
        self.instances.get_mut(&network_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = NetworkId> + '_ {
        self.instances.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Release every mapping. Called on transition to Closed; the shadow
    /// instances die with the registry.
    pub fn clear(&mut self) {
        self.instances.clear();
    }
}
