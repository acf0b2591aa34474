use std::any::Any;

use log::warn;
use replink_serde::{BitReader, BitWriter, Serde, SerdeErr};

use crate::{
    events::PeerEvent,
    protocol::{
        kinds::{RpcKind, RpcKinds},
        Protocol,
    },
    replication::{instance_registry::InstanceRegistry, world::HostWorld},
    rpc::{
        error::RpcError,
        rpc::{RpcArgs, TargetSide},
    },
    types::{HostAuthority, OrderedUnitType, OwnedNetworkId, PeerId},
};

/// Cap on calls parked while their target instance is still in flight.
const RPC_WAITLIST_CAPACITY: usize = 256;

/// Serialize one call for the reliable-ordered channel: RPCs share that
/// channel with replication actions so calls stay causally ordered with
/// the spawns and despawns around them.
pub fn write_call<R: RpcArgs>(
    rpc_kinds: &RpcKinds,
    target: OwnedNetworkId,
    args: &R,
) -> Result<Vec<u8>, RpcError> {
    let kind = rpc_kinds.kind_of::<R>().ok_or(RpcError::UnregisteredRpc)?;

    let mut writer = BitWriter::new();
    OrderedUnitType::Rpc.ser(&mut writer);
    target.ser(&mut writer);
    rpc_kinds.write_kind(kind, &mut writer);
    args.ser(&mut writer);
    Ok(writer.to_bytes().into())
}

struct WaitingCall {
    ttl: u16,
    target: OwnedNetworkId,
    kind: RpcKind,
    args: Box<dyn Any>,
}

/// The receiving half of RPC dispatch for one connection: decodes calls,
/// enforces the declared target side against this peer's authority, and
/// parks calls whose target instance has not appeared yet.
pub struct RpcManager {
    waitlist: Vec<WaitingCall>,
    waitlist_ticks: u16,
}

impl RpcManager {
    pub fn new(waitlist_ticks: u16) -> Self {
        Self {
            waitlist: Vec::new(),
            waitlist_ticks,
        }
    }

    fn target_resolves(
        target: OwnedNetworkId,
        host_world: &HostWorld,
        registry: &InstanceRegistry,
    ) -> bool {
        match target {
            OwnedNetworkId::Host(network_id) => host_world.contains(network_id),
            OwnedNetworkId::Remote(network_id) => registry.contains(network_id),
        }
    }

    /// Decode and dispatch one call from the reliable-ordered channel.
    pub fn process_call(
        &mut self,
        protocol: &Protocol,
        authority: HostAuthority,
        reader: &mut BitReader,
        peer: PeerId,
        host_world: &HostWorld,
        registry: &InstanceRegistry,
        events: &mut Vec<PeerEvent>,
    ) -> Result<(), SerdeErr> {
        // ids on the wire are in the sender's perspective
        let target = OwnedNetworkId::de(reader)?.flip();
        let kind = protocol.rpc_kinds.read_kind(reader)?;
        let args = protocol.rpc_kinds.read_args(kind, reader)?;

        let declared = protocol.rpc_kinds.target(kind);
        let permitted = match declared {
            TargetSide::ServerOnly => authority == HostAuthority::Server,
            TargetSide::ClientOnly => authority == HostAuthority::Client,
            TargetSide::Multicast => true,
        };
        if !permitted {
            warn!(
                "{}",
                RpcError::AuthorityViolation {
                    name: protocol.rpc_kinds.name(kind),
                    target: declared,
                    authority,
                }
            );
            return Ok(());
        }

        if Self::target_resolves(target, host_world, registry) {
            events.push(PeerEvent::RpcReceived {
                peer,
                target,
                kind,
                args,
            });
        } else {
            if self.waitlist.len() == RPC_WAITLIST_CAPACITY {
                warn!("rpc waitlist full, dropping oldest parked call");
                self.waitlist.remove(0);
            }
            self.waitlist.push(WaitingCall {
                ttl: self.waitlist_ticks,
                target,
                kind,
                args,
            });
        }
        Ok(())
    }

    /// Retry parked calls once per tick; expired ones are dropped with a
    /// [`RpcError::DispatchTargetMissing`] diagnostic.
    pub fn tick_waitlist(
        &mut self,
        protocol: &Protocol,
        peer: PeerId,
        host_world: &HostWorld,
        registry: &InstanceRegistry,
        events: &mut Vec<PeerEvent>,
    ) {
        let parked = std::mem::take(&mut self.waitlist);
        for call in parked {
            if Self::target_resolves(call.target, host_world, registry) {
                events.push(PeerEvent::RpcReceived {
                    peer,
                    target: call.target,
                    kind: call.kind,
                    args: call.args,
                });
            } else if call.ttl <= 1 {
                warn!(
                    "{}",
                    RpcError::DispatchTargetMissing {
                        name: protocol.rpc_kinds.name(call.kind),
                        network_id: call.target.id(),
                    }
                );
            } else {
                self.waitlist.push(WaitingCall {
                    ttl: call.ttl - 1,
                    ..call
                });
            }
        }
    }

    pub fn clear(&mut self) {
        self.waitlist.clear();
    }
}
