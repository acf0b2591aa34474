//! # Replink
//! A peer-to-peer object-replication engine: bit-packed binary codec,
//! acknowledged packet framing, per-connection reliability channels, a
//! handshake/teardown connection lifecycle, property-delta replication with
//! interest management, and authority-checked RPC dispatch — over any
//! lossy datagram transport.
//!
//! The engine knows nothing about the simulation it synchronizes: only
//! object identity, property deltas, and calls crossing the wire.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use replink_serde::{
    BitCounter, BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr, SignedInteger,
    SignedVariableInteger, UnsignedInteger, UnsignedVariableInteger, MTU_SIZE_BITS, MTU_SIZE_BYTES,
};

mod channels;
mod connection;
mod constants;
mod events;
mod peer;
mod protocol;
mod replication;
mod rpc;
mod timer;
mod transport;
mod types;
mod wrapping_number;

pub use channels::{
    channel_kind::{ChannelKind, ReliableSettings},
    channel_manager::{ChannelManager, MAX_UNIT_BITS},
    error::ChannelError,
    receivers::{
        channel_receiver::ChannelReceiver, ordered_reliable_receiver::OrderedReliableReceiver,
        unordered_reliable_receiver::UnorderedReliableReceiver,
        unreliable_receiver::UnreliableReceiver,
    },
    senders::{
        channel_sender::ChannelSender, reliable_sender::ReliableSender,
        unreliable_sender::UnreliableSender,
    },
};
pub use connection::{
    ack_manager::AckManager,
    connection::{Connection, ConnectionState},
    connection_config::ConnectionConfig,
    error::{ConnectionError, PacketError},
    handshake::{HandshakeAccept, HandshakeReject, HandshakeRequest},
    packet_notifiable::PacketNotifiable,
    packet_type::PacketType,
    ping_manager::{PingIndex, PingManager},
    standard_header::StandardHeader,
};
pub use events::{CloseReason, PeerEvent};
pub use peer::Peer;
pub use protocol::{
    kinds::{ReplicableKind, ReplicableKinds, RpcKind, RpcKinds},
    Protocol, ProtocolBuilder,
};
pub use replication::{
    diff_mask::DiffMask,
    error::ReplicationError,
    host_manager::ScopeCondition,
    instance_registry::InstanceRegistry,
    mut_channel::{MutChannel, MutReceiver, PropertyMutator},
    property::{Property, ReplicationPolicy},
    replicable::{Replicable, ReplicableSchema},
    world::HostWorld,
    ReplicationAction,
};
pub use rpc::{
    error::RpcError,
    rpc::{RpcArgs, TargetSide},
    rpc_manager::RpcManager,
};
pub use timer::Timer;
pub use transport::{error::TransportError, Transport};
pub use types::{
    HostAuthority, NetworkId, OrderedUnitType, OwnedNetworkId, PacketIndex, PeerId, PropertyIndex,
    UnitIndex,
};
pub use wrapping_number::{sequence_greater_than, sequence_less_than, wrapping_diff};
