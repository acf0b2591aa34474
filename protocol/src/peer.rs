use std::{collections::HashMap, net::SocketAddr, time::Instant};

use log::{info, trace, warn};
use replink_serde::{BitReader, BitWriter, Serde};

use crate::{
    connection::{
        connection::{Connection, ConnectionState},
        connection_config::ConnectionConfig,
        error::{ConnectionError, PacketError},
        handshake::{HandshakeReject, HandshakeRequest},
        packet_type::PacketType,
        standard_header::StandardHeader,
    },
    events::PeerEvent,
    protocol::Protocol,
    replication::{
        error::ReplicationError,
        host_manager::ScopeCondition,
        replicable::ReplicableSchema,
        world::HostWorld,
    },
    rpc::{
        error::RpcError,
        rpc::{RpcArgs, TargetSide},
        rpc_manager,
    },
    transport::Transport,
    types::{HostAuthority, NetworkId, OwnedNetworkId, PeerId},
};

/// The coordinator owning everything on this side of the wire: the
/// registered protocol, the hosted world, one [`Connection`] per remote
/// peer, and the transport. The host drives it by calling
/// [`tick`](Peer::tick) once per processing step; every connection's
/// timers, retransmissions and replication run inside that call, and all
/// notifications come back as the returned events.
pub struct Peer<T: Transport> {
    protocol: Protocol,
    authority: HostAuthority,
    config: ConnectionConfig,
    transport: T,
    connections: HashMap<SocketAddr, Connection>,
    addresses: HashMap<PeerId, SocketAddr>,
    next_peer_id: u16,
    world: HostWorld,
    scope_condition: Option<ScopeCondition>,
    events: Vec<PeerEvent>,
}

impl<T: Transport> Peer<T> {
    pub fn new(
        protocol: Protocol,
        authority: HostAuthority,
        config: ConnectionConfig,
        transport: T,
    ) -> Self {
        Self {
            protocol,
            authority,
            config,
            transport,
            connections: HashMap::new(),
            addresses: HashMap::new(),
            next_peer_id: 0,
            world: HostWorld::new(),
            scope_condition: None,
            events: Vec::new(),
        }
    }

    pub fn authority(&self) -> HostAuthority {
        self.authority
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Install the interest-management predicate consulted every tick for
    /// every (replicable, connection) pair. Without one, everything is
    /// relevant to everyone.
    pub fn set_scope_condition(&mut self, condition: ScopeCondition) {
        self.scope_condition = Some(condition);
    }

    fn allocate_peer_id(&mut self) -> PeerId {
        let peer_id = PeerId(self.next_peer_id);
        self.next_peer_id = self.next_peer_id.wrapping_add(1);
        peer_id
    }

    // Connections

    /// Open a connection to a listening peer. The handshake runs inside
    /// subsequent ticks; a [`PeerEvent::Connected`] marks success.
    pub fn connect(&mut self, address: SocketAddr, now: Instant) -> PeerId {
        if let Some(connection) = self.connections.get(&address) {
            return connection.peer_id();
        }
        let peer_id = self.allocate_peer_id();
        info!("connecting to {address} as {peer_id:?}");
        self.connections.insert(
            address,
            Connection::new_initiator(address, peer_id, &self.config, now),
        );
        self.addresses.insert(peer_id, address);
        peer_id
    }

    /// Begin an orderly teardown of one connection.
    pub fn disconnect(&mut self, peer: PeerId, now: Instant) {
        if let Some(address) = self.addresses.get(&peer) {
            if let Some(connection) = self.connections.get_mut(address) {
                connection.disconnect(now);
            }
        }
    }

    pub fn connection_state(&self, peer: PeerId) -> Option<ConnectionState> {
        let address = self.addresses.get(&peer)?;
        self.connections.get(address).map(Connection::state)
    }

    pub fn rtt_millis(&self, peer: PeerId) -> Option<f32> {
        let address = self.addresses.get(&peer)?;
        self.connections.get(address).map(Connection::rtt_millis)
    }

    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.connections
            .values()
            .filter(|connection| connection.state() == ConnectionState::Connected)
            .map(Connection::peer_id)
            .collect()
    }

    // Hosted world

    /// Take authority over a replicable: assign it a network id and begin
    /// replicating it to every connection it is relevant to.
    pub fn spawn<R: ReplicableSchema + 'static>(
        &mut self,
        replicable: R,
    ) -> Result<NetworkId, ReplicationError> {
        self.spawn_inner(replicable, None)
    }

    /// Spawn with an owning connection: `OwnerOnly` properties replicate
    /// to that connection alone.
    pub fn spawn_with_owner<R: ReplicableSchema + 'static>(
        &mut self,
        replicable: R,
        owner: PeerId,
    ) -> Result<NetworkId, ReplicationError> {
        self.spawn_inner(replicable, Some(owner))
    }

    fn spawn_inner<R: ReplicableSchema + 'static>(
        &mut self,
        replicable: R,
        owner: Option<PeerId>,
    ) -> Result<NetworkId, ReplicationError> {
        let kind = self
            .protocol
            .replicable_kinds
            .kind_of::<R>()
            .ok_or(ReplicationError::UnregisteredType { name: R::NAME })?;
        self.world.spawn(Box::new(replicable), kind, owner)
    }

    /// Retire a hosted replicable: tombstones go out to every connection
    /// currently replicating it.
    pub fn despawn(&mut self, network_id: NetworkId) -> Result<(), ReplicationError> {
        self.world.despawn(network_id)
    }

    /// Borrow a hosted instance. Mutations through the returned reference
    /// are dirty-tracked and replicate on the next tick.
    pub fn replicable_mut<R: ReplicableSchema + 'static>(
        &mut self,
        network_id: NetworkId,
    ) -> Option<&mut R> {
        self.world
            .get_mut(network_id)?
            .replicable
            .as_any_mut()
            .downcast_mut::<R>()
    }

    pub fn replicable<R: ReplicableSchema + 'static>(&self, network_id: NetworkId) -> Option<&R> {
        self.world
            .get(network_id)?
            .replicable
            .as_any()
            .downcast_ref::<R>()
    }

    /// Borrow the shadow of a replicable hosted by `peer`.
    pub fn remote_replicable<R: ReplicableSchema + 'static>(
        &self,
        peer: PeerId,
        network_id: NetworkId,
    ) -> Option<&R> {
        let address = self.addresses.get(&peer)?;
        self.connections
            .get(address)?
            .shadow(network_id)?
            .replicable
            .as_any()
            .downcast_ref::<R>()
    }

    // RPC

    /// Invoke an RPC on a replicable this peer hosts, toward the remote
    /// side(s) shadowing it. Calls ride the reliable-ordered channel, so
    /// they stay ordered relative to other calls and to spawns/despawns.
    pub fn send_rpc_to_hosted<R: RpcArgs>(
        &mut self,
        network_id: NetworkId,
        args: &R,
    ) -> Result<(), RpcError> {
        // receivers of a hosted-object call sit on the other side
        let permitted = match R::TARGET {
            TargetSide::ServerOnly => self.authority == HostAuthority::Client,
            TargetSide::ClientOnly => self.authority == HostAuthority::Server,
            TargetSide::Multicast => true,
        };
        if !permitted {
            return Err(RpcError::AuthorityViolation {
                name: R::NAME,
                target: R::TARGET,
                authority: self.authority,
            });
        }

        let Some(instance) = self.world.get(network_id) else {
            return Err(RpcError::DispatchTargetMissing {
                name: R::NAME,
                network_id,
            });
        };
        let owner = instance.owner;
        let payload = rpc_manager::write_call(
            &self.protocol.rpc_kinds,
            OwnedNetworkId::Host(network_id),
            args,
        )?;

        for connection in self.connections.values_mut() {
            if connection.state() != ConnectionState::Connected {
                continue;
            }
            if !connection.is_replicating(network_id) {
                continue;
            }
            // directed calls go to the owner alone when one is set
            if R::TARGET != TargetSide::Multicast {
                if let Some(owner) = owner {
                    if connection.peer_id() != owner {
                        continue;
                    }
                }
            }
            if let Err(error) = connection.queue_ordered_unit(payload.clone()) {
                warn!("cannot queue rpc '{}': {error}", R::NAME);
            }
        }
        Ok(())
    }

    /// Invoke an RPC on a shadow instance, toward the peer that hosts it.
    pub fn send_rpc_to_remote<R: RpcArgs>(
        &mut self,
        peer: PeerId,
        network_id: NetworkId,
        args: &R,
    ) -> Result<(), RpcError> {
        // the executing side is the remote host of the instance
        let remote_authority = self.authority.invert();
        let permitted = match R::TARGET {
            TargetSide::ServerOnly => remote_authority == HostAuthority::Server,
            TargetSide::ClientOnly => remote_authority == HostAuthority::Client,
            TargetSide::Multicast => true,
        };
        if !permitted {
            return Err(RpcError::AuthorityViolation {
                name: R::NAME,
                target: R::TARGET,
                authority: self.authority,
            });
        }

        let Some(address) = self.addresses.get(&peer) else {
            return Err(RpcError::DispatchTargetMissing {
                name: R::NAME,
                network_id,
            });
        };
        let Some(connection) = self.connections.get_mut(address) else {
            return Err(RpcError::DispatchTargetMissing {
                name: R::NAME,
                network_id,
            });
        };
        if !connection.has_shadow(network_id) {
            return Err(RpcError::DispatchTargetMissing {
                name: R::NAME,
                network_id,
            });
        }

        let payload = rpc_manager::write_call(
            &self.protocol.rpc_kinds,
            OwnedNetworkId::Remote(network_id),
            args,
        )?;
        if let Err(error) = connection.queue_ordered_unit(payload) {
            warn!("cannot queue rpc '{}': {error}", R::NAME);
        }
        Ok(())
    }

    // Processing step

    /// One processing step: poll the transport, advance every connection,
    /// flush outgoing packets, and return the tick's events.
    pub fn tick(&mut self, now: Instant) -> Vec<PeerEvent> {
        self.receive_datagrams(now);

        // advance connections and flush their outgoing packets
        let condition = self.scope_condition.as_ref();
        for connection in self.connections.values_mut() {
            let packets = connection.tick(
                &self.protocol,
                self.authority,
                &self.world,
                condition,
                now,
                &mut self.events,
            );
            for packet in packets {
                if let Err(error) = self.transport.send(connection.address(), &packet) {
                    warn!("transport send to {} failed: {error}", connection.address());
                }
            }
        }

        // every connection has now seen this tick's tombstones
        self.world.clear_retired();

        // reap closed connections, releasing their registries
        let closed: Vec<SocketAddr> = self
            .connections
            .iter()
            .filter(|(_, connection)| connection.state() == ConnectionState::Closed)
            .map(|(address, _)| *address)
            .collect();
        for address in closed {
            if let Some(mut connection) = self.connections.remove(&address) {
                connection.release(&self.world);
                self.addresses.remove(&connection.peer_id());
            }
        }

        std::mem::take(&mut self.events)
    }

    fn receive_datagrams(&mut self, now: Instant) {
        loop {
            let (address, payload) = match self.transport.receive() {
                Ok(Some(datagram)) => datagram,
                Ok(None) => break,
                Err(error) => {
                    warn!("transport receive failed: {error}");
                    break;
                }
            };

            let mut reader = BitReader::new(&payload);
            let header = match StandardHeader::de(&mut reader) {
                Ok(header) => header,
                Err(_) => {
                    warn!("{} from {address}", PacketError::MalformedPacket);
                    continue;
                }
            };

            if header.packet_type == PacketType::HandshakeRequest {
                self.process_handshake_request(address, &mut reader, now);
                continue;
            }

            match self.connections.get_mut(&address) {
                Some(connection) => {
                    connection.process_packet(&header, &mut reader, now, &mut self.events)
                }
                None => trace!("dropping packet from unknown address {address}"),
            }
        }
    }

    /// Listener-side handshake: verify the initiator's registry checksum
    /// and either open (or re-acknowledge) the connection or reject it.
    fn process_handshake_request(
        &mut self,
        address: SocketAddr,
        reader: &mut BitReader,
        now: Instant,
    ) {
        let request = match HandshakeRequest::de(reader) {
            Ok(request) => request,
            Err(_) => {
                warn!("{} from {address}", PacketError::MalformedPacket);
                return;
            }
        };

        let local = self.protocol.registry_checksum();
        if request.registry_checksum != local {
            warn!(
                "rejecting handshake from {address}: {}",
                ConnectionError::ProtocolMismatch {
                    local,
                    remote: request.registry_checksum,
                }
            );
            let mut writer = BitWriter::new();
            StandardHeader::new(PacketType::HandshakeReject, 0, 0, 0).ser(&mut writer);
            HandshakeReject {
                nonce: request.nonce,
            }
            .ser(&mut writer);
            if let Err(error) = self.transport.send(address, &writer.to_bytes()) {
                warn!("transport send to {address} failed: {error}");
            }
            return;
        }

        if !self.connections.contains_key(&address) {
            let peer_id = self.allocate_peer_id();
            info!("accepted connection from {address} as {peer_id:?}");
            self.connections.insert(
                address,
                Connection::new_accepted(address, peer_id, &self.config, now),
            );
            self.addresses.insert(peer_id, address);
            self.events.push(PeerEvent::Connected(peer_id));
        }

        // answer every (possibly re-sent) matching request
        let Some(connection) = self.connections.get_mut(&address) else {
            return;
        };
        let accept = connection.write_handshake_accept(request.nonce, now);
        if let Err(error) = self.transport.send(address, &accept) {
            warn!("transport send to {address} failed: {error}");
        }
    }
}
