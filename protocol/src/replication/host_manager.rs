use std::collections::HashMap;

use log::warn;
use replink_serde::{BitWriter, Serde};

use crate::{
    channels::{channel_kind::ChannelKind, channel_manager::ChannelManager},
    protocol::kinds::ReplicableKinds,
    replication::{
        diff_mask::DiffMask,
        mut_channel::MutReceiver,
        property::ReplicationPolicy,
        replicable::Replicable,
        world::{HostInstance, HostWorld},
        ReplicationAction,
    },
    types::{NetworkId, OrderedUnitType, PeerId, UnitIndex},
};

/// Host-supplied interest predicate: whether a replicable is currently
/// relevant to a connection. The default (no predicate) replicates
/// everything to everyone.
pub type ScopeCondition = Box<dyn Fn(PeerId, NetworkId, &dyn Replicable) -> bool>;

struct TrackedReplica {
    receiver: MutReceiver,
    is_owner: bool,
}

/// The sending half of replication for one connection: decides relevance,
/// emits spawn/despawn actions and per-tick property deltas, and re-marks
/// dirty bits when an update packet is reported lost.
pub struct HostManager {
    peer_id: PeerId,
    replicas: HashMap<NetworkId, TrackedReplica>,
    sent_updates: HashMap<UnitIndex, (NetworkId, DiffMask)>,
}

impl HostManager {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            replicas: HashMap::new(),
            sent_updates: HashMap::new(),
        }
    }

    pub fn is_tracking(&self, network_id: NetworkId) -> bool {
        self.replicas.contains_key(&network_id)
    }

    /// The properties a connection receives in a spawn snapshot: everything
    /// it is entitled to see, including initial-only fields.
    fn snapshot_mask(replicable: &dyn Replicable, is_owner: bool) -> DiffMask {
        let mut mask = DiffMask::new_full(replicable.property_count());
        for index in 0..replicable.property_count() {
            if replicable.policy(index) == ReplicationPolicy::OwnerOnly && !is_owner {
                mask.clear_bit(index);
            }
        }
        mask
    }

    fn queue_spawn(
        &mut self,
        network_id: NetworkId,
        instance: &HostInstance,
        kinds: &ReplicableKinds,
        channels: &mut ChannelManager,
    ) {
        let is_owner = instance.owner == Some(self.peer_id);
        let mask = Self::snapshot_mask(instance.replicable.as_ref(), is_owner);

        let mut writer = BitWriter::new();
        OrderedUnitType::Replication.ser(&mut writer);
        ReplicationAction::Spawn.ser(&mut writer);
        network_id.ser(&mut writer);
        kinds.write_kind(instance.kind, &mut writer);
        mask.ser(&mut writer);
        instance.replicable.write_update(&mask, &mut writer);

        match channels.send_unit(ChannelKind::ReliableOrdered, writer.to_bytes().into()) {
            Ok(_) => {
                let receiver = instance.mut_channel.register_receiver(self.peer_id);
                self.replicas
                    .insert(network_id, TrackedReplica { receiver, is_owner });
            }
            Err(error) => {
                // an instance too large for one packet cannot be replicated
                warn!(
                    "cannot spawn {} ({network_id:?}) to {:?}: {error}",
                    instance.replicable.kind_name(),
                    self.peer_id
                );
            }
        }
    }

    fn queue_despawn(&mut self, network_id: NetworkId, channels: &mut ChannelManager) {
        let mut writer = BitWriter::new();
        OrderedUnitType::Replication.ser(&mut writer);
        ReplicationAction::Despawn.ser(&mut writer);
        network_id.ser(&mut writer);

        if let Err(error) = channels.send_unit(ChannelKind::ReliableOrdered, writer.to_bytes().into())
        {
            warn!("cannot queue despawn of {network_id:?}: {error}");
        }
    }

    /// Re-evaluate relevance for every hosted instance: newly-relevant ones
    /// get a full snapshot before any delta, no-longer-relevant and retired
    /// ones get a tombstone.
    pub fn update_scope(
        &mut self,
        world: &HostWorld,
        condition: Option<&ScopeCondition>,
        kinds: &ReplicableKinds,
        channels: &mut ChannelManager,
    ) {
        for network_id in world.retired() {
            if self.replicas.remove(network_id).is_some() {
                self.queue_despawn(*network_id, channels);
            }
        }

        for (network_id, instance) in world.iter() {
            let relevant = condition.map_or(true, |condition| {
                condition(self.peer_id, network_id, instance.replicable.as_ref())
            });
            let tracked = self.replicas.contains_key(&network_id);

            if relevant && !tracked {
                self.queue_spawn(network_id, instance, kinds, channels);
            } else if !relevant && tracked {
                instance.mut_channel.deregister_receiver(self.peer_id);
                self.replicas.remove(&network_id);
                self.queue_despawn(network_id, channels);
            }
        }
    }

    /// Collect this tick's property deltas: dirty on-change fields plus
    /// every always-replicated field, per tracked instance.
    pub fn collect_updates(&mut self, world: &HostWorld, channels: &mut ChannelManager) {
        for (network_id, tracked) in &self.replicas {
            let Some(instance) = world.get(*network_id) else {
                continue;
            };

            let mut mask = tracked.receiver.take_mask();
            for index in 0..instance.replicable.property_count() {
                match instance.replicable.policy(index) {
                    ReplicationPolicy::OnChange => {}
                    ReplicationPolicy::Always => mask.set_bit(index),
                    ReplicationPolicy::InitialOnly => mask.clear_bit(index),
                    ReplicationPolicy::OwnerOnly => {
                        if !tracked.is_owner {
                            mask.clear_bit(index);
                        }
                    }
                }
            }
            if mask.is_clear() {
                continue;
            }

            let mut writer = BitWriter::new();
            network_id.ser(&mut writer);
            mask.ser(&mut writer);
            instance.replicable.write_update(&mask, &mut writer);

            match channels.send_unit(ChannelKind::Unreliable, writer.to_bytes().into()) {
                Ok(unit) => {
                    self.sent_updates.insert(unit, (*network_id, mask));
                }
                Err(error) => {
                    warn!("dropping oversized update for {network_id:?}: {error}");
                }
            }
        }
    }

    /// The packet carrying this update arrived; its bits are settled.
    pub fn notify_update_delivered(&mut self, unit: UnitIndex) {
        self.sent_updates.remove(&unit);
    }

    /// The packet carrying this update was lost: fold its bits back into
    /// the connection's dirty mask so the next collection resends them.
    pub fn notify_update_dropped(&mut self, unit: UnitIndex) {
        let Some((network_id, mask)) = self.sent_updates.remove(&unit) else {
            return;
        };
        if let Some(tracked) = self.replicas.get(&network_id) {
            tracked.receiver.or_mask(&mask);
        }
    }

    /// Detach from every mutation channel. Called when the owning
    /// connection closes; canonical instances themselves stay in the world.
    pub fn release(&mut self, world: &HostWorld) {
        for network_id in self.replicas.keys() {
            if let Some(instance) = world.get(*network_id) {
                instance.mut_channel.deregister_receiver(self.peer_id);
            }
        }
        self.replicas.clear();
        self.sent_updates.clear();
    }
}
