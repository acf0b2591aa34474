use log::warn;
use replink_serde::{BitReader, Serde, SerdeErr};

use crate::{
    events::PeerEvent,
    protocol::Protocol,
    replication::{
        diff_mask::DiffMask, error::ReplicationError, instance_registry::InstanceRegistry,
        ReplicationAction,
    },
    types::{NetworkId, PeerId},
};

/// Cap on updates parked for instances whose spawn has not arrived yet.
/// Updates ride the unreliable channel and spawns the reliable-ordered one,
/// so a delta can race ahead of its spawn; parking bridges the gap.
const UPDATE_WAITLIST_CAPACITY: usize = 256;

enum UpdateOutcome {
    Applied,
    UnknownInstance,
}

/// The receiving half of replication for one connection: builds shadow
/// instances from spawn actions, applies masked deltas, releases shadows on
/// tombstones, and surfaces every change as an event.
pub struct RemoteManager {
    registry: InstanceRegistry,
    update_waitlist: Vec<(u16, Vec<u8>)>,
    waitlist_ticks: u16,
}

impl RemoteManager {
    pub fn new(waitlist_ticks: u16) -> Self {
        Self {
            registry: InstanceRegistry::new(),
            update_waitlist: Vec::new(),
            waitlist_ticks,
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut InstanceRegistry {
        &mut self.registry
    }

    /// Apply one spawn/despawn action from the reliable-ordered channel.
    pub fn process_action(
        &mut self,
        protocol: &Protocol,
        reader: &mut BitReader,
        peer: PeerId,
        events: &mut Vec<PeerEvent>,
    ) -> Result<(), SerdeErr> {
        match ReplicationAction::de(reader)? {
            ReplicationAction::Spawn => {
                let network_id = NetworkId::de(reader)?;
                let kind = protocol.replicable_kinds.read_kind(reader)?;
                let property_count = protocol.replicable_kinds.property_count(kind);
                let mask = DiffMask::de(reader, property_count)?;
                let replicable = protocol.replicable_kinds.create(kind, &mask, reader)?;

                if self.registry.contains(network_id) {
                    // the authority never reuses a live id; replace and note it
                    warn!(
                        "{}",
                        ReplicationError::DuplicateInstance { network_id }
                    );
                    self.registry.remove(network_id);
                    events.push(PeerEvent::ReplicableDespawned { peer, network_id });
                }

                self.registry
                    .insert(network_id, kind, replicable)
                    .map_err(|_| SerdeErr)?;
                events.push(PeerEvent::ReplicableSpawned {
                    peer,
                    network_id,
                    kind,
                });
            }
            ReplicationAction::Despawn => {
                let network_id = NetworkId::de(reader)?;
                if self.registry.remove(network_id).is_some() {
                    events.push(PeerEvent::ReplicableDespawned { peer, network_id });
                } else {
                    warn!("{}", ReplicationError::UnknownInstance { network_id });
                }
            }
        }
        Ok(())
    }

    fn try_apply_update(
        &mut self,
        payload: &[u8],
        peer: PeerId,
        events: &mut Vec<PeerEvent>,
    ) -> Result<UpdateOutcome, SerdeErr> {
        let mut reader = BitReader::new(payload);
        let network_id = NetworkId::de(&mut reader)?;

        let Some(instance) = self.registry.get_mut(network_id) else {
            return Ok(UpdateOutcome::UnknownInstance);
        };

        let property_count = instance.replicable.property_count();
        let mask = DiffMask::de(&mut reader, property_count)?;
        instance.replicable.read_update(&mask, &mut reader)?;

        for property in 0..property_count {
            if mask.bit(property) {
                events.push(PeerEvent::PropertyChanged {
                    peer,
                    network_id,
                    property,
                });
            }
        }
        Ok(UpdateOutcome::Applied)
    }

    /// Apply one delta from the unreliable channel, or park it briefly when
    /// its instance has not spawned locally yet.
    pub fn process_update(
        &mut self,
        payload: &[u8],
        peer: PeerId,
        events: &mut Vec<PeerEvent>,
    ) -> Result<(), SerdeErr> {
        match self.try_apply_update(payload, peer, events)? {
            UpdateOutcome::Applied => {}
            UpdateOutcome::UnknownInstance => {
                if self.update_waitlist.len() == UPDATE_WAITLIST_CAPACITY {
                    warn!("update waitlist full, dropping oldest parked update");
                    self.update_waitlist.remove(0);
                }
                self.update_waitlist
                    .push((self.waitlist_ticks, payload.to_vec()));
            }
        }
        Ok(())
    }

    /// Retry parked updates once per tick; expired ones are dropped with a
    /// diagnostic.
    pub fn tick_waitlist(&mut self, peer: PeerId, events: &mut Vec<PeerEvent>) {
        let parked = std::mem::take(&mut self.update_waitlist);
        for (ttl, payload) in parked {
            match self.try_apply_update(&payload, peer, events) {
                Ok(UpdateOutcome::Applied) => {}
                Ok(UpdateOutcome::UnknownInstance) => {
                    if ttl <= 1 {
                        warn!("dropping parked update: instance never appeared");
                    } else {
                        self.update_waitlist.push((ttl - 1, payload));
                    }
                }
                Err(_) => {
                    warn!("dropping malformed parked update");
                }
            }
        }
    }

    /// Release every shadow mapping. Called on transition to Closed.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.update_waitlist.clear();
    }
}
