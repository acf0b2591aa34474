use std::{net::SocketAddr, time::Instant};

use log::{trace, warn};
use replink_serde::{BitReader, BitWriter, Serde};

use crate::{
    channels::{
        channel_kind::ChannelKind, channel_manager::ChannelManager, error::ChannelError,
    },
    connection::{
        ack_manager::AckManager,
        connection_config::ConnectionConfig,
        error::PacketError,
        handshake::{Handshake, HandshakeAccept, HandshakeReject, HandshakeRequest},
        packet_notifiable::PacketNotifiable,
        packet_type::PacketType,
        ping_manager::{PingIndex, PingManager},
        standard_header::StandardHeader,
    },
    constants::MAX_PACKETS_PER_TICK,
    events::{CloseReason, PeerEvent},
    protocol::Protocol,
    replication::{
        host_manager::{HostManager, ScopeCondition},
        instance_registry::RegisteredInstance,
        remote_manager::RemoteManager,
        world::HostWorld,
    },
    rpc::rpc_manager::RpcManager,
    timer::Timer,
    types::{HostAuthority, NetworkId, OrderedUnitType, PeerId, UnitIndex},
};

/// Lifecycle of a session with one remote peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Identity and registry checksum are being exchanged.
    Handshaking,
    /// The checksums matched; replication and RPC traffic flows.
    Connected,
    /// Teardown requested; outstanding reliable sends are being flushed
    /// or abandoned after the grace period.
    Disconnecting,
    /// The session is over and the instance registry has been released.
    Closed,
}

/// A session with one remote peer: its reliability channels, instance
/// registry, replication managers, RPC dispatch and lifecycle timers. All
/// of a connection's state is mutated only by the processing step that
/// drives it; nothing here is shared across threads.
pub struct Connection {
    address: SocketAddr,
    peer_id: PeerId,
    state: ConnectionState,
    config: ConnectionConfig,
    ack_manager: AckManager,
    channel_manager: ChannelManager,
    ping_manager: PingManager,
    host_manager: HostManager,
    remote_manager: RemoteManager,
    rpc_manager: RpcManager,
    heartbeat_timer: Timer,
    last_received: Instant,
    handshake: Option<Handshake>,
    pending_pongs: Vec<PingIndex>,
    disconnect_grace: Option<Timer>,
}

impl Connection {
    fn new(
        address: SocketAddr,
        peer_id: PeerId,
        config: &ConnectionConfig,
        now: Instant,
    ) -> Self {
        let mut heartbeat_timer = Timer::new(config.heartbeat_interval);
        heartbeat_timer.reset(now);
        Self {
            address,
            peer_id,
            state: ConnectionState::Connected,
            config: config.clone(),
            ack_manager: AckManager::new(),
            channel_manager: ChannelManager::new(&config.reliable),
            ping_manager: PingManager::new(config),
            host_manager: HostManager::new(peer_id),
            remote_manager: RemoteManager::new(config.waitlist_ticks),
            rpc_manager: RpcManager::new(config.waitlist_ticks),
            heartbeat_timer,
            last_received: now,
            handshake: None,
            pending_pongs: Vec::new(),
            disconnect_grace: None,
        }
    }

    /// A connection we are opening: starts in Handshaking and re-sends the
    /// request until answered.
    pub(crate) fn new_initiator(
        address: SocketAddr,
        peer_id: PeerId,
        config: &ConnectionConfig,
        now: Instant,
    ) -> Self {
        let mut connection = Self::new(address, peer_id, config, now);
        connection.state = ConnectionState::Handshaking;
        connection.handshake = Some(Handshake::new(config));
        connection
    }

    /// A connection accepted from a valid handshake request: the listener
    /// verified the checksum, so it starts Connected.
    pub(crate) fn new_accepted(
        address: SocketAddr,
        peer_id: PeerId,
        config: &ConnectionConfig,
        now: Instant,
    ) -> Self {
        Self::new(address, peer_id, config, now)
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn rtt_millis(&self) -> f32 {
        self.ping_manager.rtt_millis()
    }

    pub(crate) fn is_replicating(&self, network_id: NetworkId) -> bool {
        self.host_manager.is_tracking(network_id)
    }

    pub(crate) fn shadow(&self, network_id: NetworkId) -> Option<&RegisteredInstance> {
        self.remote_manager.registry().get(network_id)
    }

    pub(crate) fn shadow_mut(&mut self, network_id: NetworkId) -> Option<&mut RegisteredInstance> {
        self.remote_manager.registry_mut().get_mut(network_id)
    }

    pub(crate) fn has_shadow(&self, network_id: NetworkId) -> bool {
        self.remote_manager.registry().contains(network_id)
    }

    pub(crate) fn queue_ordered_unit(
        &mut self,
        payload: Vec<u8>,
    ) -> Result<UnitIndex, ChannelError> {
        self.channel_manager
            .send_unit(ChannelKind::ReliableOrdered, payload)
    }

    // Lifecycle

    pub(crate) fn close(&mut self, reason: CloseReason, events: &mut Vec<PeerEvent>) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        // the registry and its shadow instances die with the connection
        self.remote_manager.clear();
        self.rpc_manager.clear();
        events.push(PeerEvent::Disconnected(self.peer_id, reason));
    }

    /// Detach this connection's dirty-tracking receivers from the host
    /// world. The canonical objects themselves persist locally.
    pub(crate) fn release(&mut self, world: &HostWorld) {
        self.host_manager.release(world);
    }

    /// Begin an orderly teardown: flush what we can, then notify and close.
    pub(crate) fn disconnect(&mut self, now: Instant) {
        if matches!(
            self.state,
            ConnectionState::Handshaking | ConnectionState::Connected
        ) {
            self.state = ConnectionState::Disconnecting;
            let mut grace = Timer::new(self.config.disconnect_grace_period);
            grace.reset(now);
            self.disconnect_grace = Some(grace);
        }
    }

    // Incoming

    /// Process one datagram already routed to this connection. Decode
    /// failures discard the datagram and never disturb state applied from
    /// earlier packets.
    pub(crate) fn process_packet(
        &mut self,
        header: &StandardHeader,
        reader: &mut BitReader,
        now: Instant,
        events: &mut Vec<PeerEvent>,
    ) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.last_received = now;

        let mut notifier = PacketFateNotifier {
            channels: &mut self.channel_manager,
            host: &mut self.host_manager,
        };
        let mut notifiables: [&mut dyn PacketNotifiable; 1] = [&mut notifier];
        if !self
            .ack_manager
            .process_incoming_header(header, &mut notifiables)
        {
            trace!("discarding stale or duplicate packet from {}", self.address);
            return;
        }

        match header.packet_type {
            PacketType::Data => {
                if matches!(
                    self.state,
                    ConnectionState::Connected | ConnectionState::Disconnecting
                ) {
                    if self.channel_manager.read_packet(reader).is_err() {
                        warn!("{} from {}", PacketError::MalformedPacket, self.address);
                    }
                }
            }
            PacketType::Heartbeat => {}
            PacketType::Ping => match PingIndex::de(reader) {
                Ok(index) => self.pending_pongs.push(index),
                Err(_) => warn!("{} from {}", PacketError::MalformedPacket, self.address),
            },
            PacketType::Pong => match PingIndex::de(reader) {
                Ok(index) => self.ping_manager.process_pong(index, now),
                Err(_) => warn!("{} from {}", PacketError::MalformedPacket, self.address),
            },
            PacketType::HandshakeAccept => self.process_handshake_accept(reader, now, events),
            PacketType::HandshakeReject => self.process_handshake_reject(reader, events),
            // requests are answered by the coordinator, which owns
            // listener-side handshake state
            PacketType::HandshakeRequest => {}
            PacketType::Disconnect => self.close(CloseReason::DisconnectedByRemote, events),
        }
    }

    fn process_handshake_accept(
        &mut self,
        reader: &mut BitReader,
        now: Instant,
        events: &mut Vec<PeerEvent>,
    ) {
        if self.state != ConnectionState::Handshaking {
            return;
        }
        let accept = match HandshakeAccept::de(reader) {
            Ok(accept) => accept,
            Err(_) => {
                warn!("{} from {}", PacketError::MalformedPacket, self.address);
                return;
            }
        };
        let Some(handshake) = &self.handshake else {
            return;
        };
        if accept.nonce != handshake.nonce {
            trace!("ignoring handshake accept with stale nonce from {}", self.address);
            return;
        }

        self.handshake = None;
        self.state = ConnectionState::Connected;
        self.heartbeat_timer.reset(now);
        events.push(PeerEvent::Connected(self.peer_id));
    }

    fn process_handshake_reject(&mut self, reader: &mut BitReader, events: &mut Vec<PeerEvent>) {
        if self.state != ConnectionState::Handshaking {
            return;
        }
        let reject = match HandshakeReject::de(reader) {
            Ok(reject) => reject,
            Err(_) => {
                warn!("{} from {}", PacketError::MalformedPacket, self.address);
                return;
            }
        };
        let Some(handshake) = &self.handshake else {
            return;
        };
        if reject.nonce != handshake.nonce {
            return;
        }

        warn!(
            "handshake with {} rejected: registered-type tables disagree",
            self.address
        );
        self.close(CloseReason::ProtocolMismatch, events);
    }

    /// Drain the channels' delivered units and apply them: replication
    /// actions and RPCs from the ordered channel (sharing one causal
    /// order), property deltas from the unreliable channel.
    fn process_received_units(
        &mut self,
        protocol: &Protocol,
        authority: HostAuthority,
        world: &HostWorld,
        events: &mut Vec<PeerEvent>,
    ) {
        for payload in self
            .channel_manager
            .receive_units(ChannelKind::ReliableOrdered)
        {
            let mut reader = BitReader::new(&payload);
            let result = match OrderedUnitType::de(&mut reader) {
                Ok(OrderedUnitType::Replication) => self.remote_manager.process_action(
                    protocol,
                    &mut reader,
                    self.peer_id,
                    events,
                ),
                Ok(OrderedUnitType::Rpc) => self.rpc_manager.process_call(
                    protocol,
                    authority,
                    &mut reader,
                    self.peer_id,
                    world,
                    self.remote_manager.registry(),
                    events,
                ),
                Err(error) => Err(error),
            };
            if result.is_err() {
                warn!("{} from {}", PacketError::MalformedPayload, self.address);
            }
        }

        for payload in self.channel_manager.receive_units(ChannelKind::Unreliable) {
            if self
                .remote_manager
                .process_update(&payload, self.peer_id, events)
                .is_err()
            {
                warn!("{} from {}", PacketError::MalformedPayload, self.address);
            }
        }

        // the core sends nothing on the reliable-unordered channel; keep
        // its delivery window moving for application payloads
        let _ = self
            .channel_manager
            .receive_units(ChannelKind::ReliableUnordered);

        self.remote_manager.tick_waitlist(self.peer_id, events);
        self.rpc_manager.tick_waitlist(
            protocol,
            self.peer_id,
            world,
            self.remote_manager.registry(),
            events,
        );
    }

    // Processing step

    /// One processing step: apply received units, refresh relevance and
    /// deltas, advance retransmission and keep-alive timers, and produce
    /// this tick's outgoing datagrams.
    pub(crate) fn tick(
        &mut self,
        protocol: &Protocol,
        authority: HostAuthority,
        world: &HostWorld,
        condition: Option<&ScopeCondition>,
        now: Instant,
        events: &mut Vec<PeerEvent>,
    ) -> Vec<Box<[u8]>> {
        let mut packets = Vec::new();

        match self.state {
            ConnectionState::Closed => {}
            ConnectionState::Handshaking => {
                match self.handshake.as_mut().and_then(|handshake| handshake.poll_send(now)) {
                    None => self.close(CloseReason::HandshakeTimeout, events),
                    Some(true) => {
                        let packet = self.write_handshake_request(protocol, now);
                        packets.push(packet);
                    }
                    Some(false) => {}
                }
            }
            ConnectionState::Connected => {
                if now.saturating_duration_since(self.last_received) >= self.config.timeout {
                    self.close(CloseReason::Timeout, events);
                    return packets;
                }

                self.process_received_units(protocol, authority, world, events);

                self.host_manager.update_scope(
                    world,
                    condition,
                    &protocol.replicable_kinds,
                    &mut self.channel_manager,
                );
                self.host_manager
                    .collect_updates(world, &mut self.channel_manager);

                if let Err(error) = self
                    .channel_manager
                    .collect_resends(now, self.ping_manager.rtt_millis())
                {
                    warn!("connection to {} failed: {error}", self.address);
                    if let ChannelError::RetryExhausted { kind, .. } = error {
                        self.close(CloseReason::RetryExhausted(kind), events);
                    }
                    return packets;
                }

                self.write_data_packets(&mut packets, now);

                for index in std::mem::take(&mut self.pending_pongs) {
                    let packet = self.write_ping_packet(PacketType::Pong, index, now);
                    packets.push(packet);
                }
                if self.ping_manager.should_send_ping(now) {
                    let index = self.ping_manager.next_ping(now);
                    let packet = self.write_ping_packet(PacketType::Ping, index, now);
                    packets.push(packet);
                }

                // keep-alive: maintain acks and RTT when idle
                if packets.is_empty()
                    && (self.heartbeat_timer.ringing(now)
                        || self.ack_manager.should_send_empty_ack())
                {
                    let packet = self.write_control_packet(PacketType::Heartbeat, now);
                    packets.push(packet);
                }
            }
            ConnectionState::Disconnecting => {
                let grace_expired = self
                    .disconnect_grace
                    .as_ref()
                    .map_or(true, |timer| timer.ringing(now));
                let flushed =
                    !self.channel_manager.has_outgoing() && !self.channel_manager.has_unacked();

                if grace_expired || flushed {
                    for _ in 0..self.config.disconnect_notice_count {
                        let packet = self.write_control_packet(PacketType::Disconnect, now);
                        packets.push(packet);
                    }
                    self.close(CloseReason::LocalDisconnect, events);
                } else {
                    // keep flushing; exhaustion during teardown just ends it
                    if self
                        .channel_manager
                        .collect_resends(now, self.ping_manager.rtt_millis())
                        .is_err()
                    {
                        self.close(CloseReason::LocalDisconnect, events);
                        return packets;
                    }
                    self.write_data_packets(&mut packets, now);
                }
            }
        }

        packets
    }

    // Outgoing

    fn write_data_packets(&mut self, packets: &mut Vec<Box<[u8]>>, now: Instant) {
        let mut written = 0;
        while self.channel_manager.has_outgoing() && written < MAX_PACKETS_PER_TICK {
            let mut writer = BitWriter::new();
            let header = self.ack_manager.next_outgoing_packet_header(PacketType::Data);
            header.ser(&mut writer);
            self.channel_manager
                .write_packet(&mut writer, header.sender_packet_index, now);
            self.heartbeat_timer.reset(now);
            packets.push(writer.to_bytes());
            written += 1;
        }
    }

    fn write_control_packet(&mut self, packet_type: PacketType, now: Instant) -> Box<[u8]> {
        let mut writer = BitWriter::new();
        self.ack_manager
            .next_outgoing_packet_header(packet_type)
            .ser(&mut writer);
        self.heartbeat_timer.reset(now);
        writer.to_bytes()
    }

    fn write_ping_packet(
        &mut self,
        packet_type: PacketType,
        index: PingIndex,
        now: Instant,
    ) -> Box<[u8]> {
        let mut writer = BitWriter::new();
        self.ack_manager
            .next_outgoing_packet_header(packet_type)
            .ser(&mut writer);
        index.ser(&mut writer);
        self.heartbeat_timer.reset(now);
        writer.to_bytes()
    }

    fn write_handshake_request(&mut self, protocol: &Protocol, now: Instant) -> Box<[u8]> {
        let nonce = self
            .handshake
            .as_ref()
            .map(|handshake| handshake.nonce)
            .unwrap_or_default();
        let mut writer = BitWriter::new();
        self.ack_manager
            .next_outgoing_packet_header(PacketType::HandshakeRequest)
            .ser(&mut writer);
        HandshakeRequest {
            nonce,
            registry_checksum: protocol.registry_checksum(),
        }
        .ser(&mut writer);
        self.heartbeat_timer.reset(now);
        writer.to_bytes()
    }

    /// Answer a (possibly re-sent) handshake request whose checksum
    /// matched.
    pub(crate) fn write_handshake_accept(&mut self, nonce: u64, now: Instant) -> Box<[u8]> {
        let mut writer = BitWriter::new();
        self.ack_manager
            .next_outgoing_packet_header(PacketType::HandshakeAccept)
            .ser(&mut writer);
        HandshakeAccept { nonce }.ser(&mut writer);
        self.heartbeat_timer.reset(now);
        writer.to_bytes()
    }
}

/// Routes packet-fate notifications from the ack manager to the parties
/// that track per-packet content: the channel manager (reliable unit
/// bookkeeping) and the host replication manager (re-marking dirty bits
/// from lost update packets).
struct PacketFateNotifier<'m> {
    channels: &'m mut ChannelManager,
    host: &'m mut HostManager,
}

impl PacketNotifiable for PacketFateNotifier<'_> {
    fn notify_packet_delivered(&mut self, packet_index: u16) {
        for (kind, units) in self.channels.notify_packet_delivered(packet_index) {
            if kind == ChannelKind::Unreliable {
                for unit in units {
                    self.host.notify_update_delivered(unit);
                }
            }
        }
    }

    fn notify_packet_dropped(&mut self, packet_index: u16) {
        for (kind, units) in self.channels.notify_packet_dropped(packet_index) {
            if kind == ChannelKind::Unreliable {
                for unit in units {
                    self.host.notify_update_dropped(unit);
                }
            }
        }
    }
}
