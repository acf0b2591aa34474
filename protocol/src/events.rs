use std::any::Any;

use crate::{
    channels::channel_kind::ChannelKind,
    protocol::kinds::{ReplicableKind, RpcKind},
    types::{NetworkId, OwnedNetworkId, PeerId, PropertyIndex},
};

/// Why a connection left the Connected state. Carried on
/// [`PeerEvent::Disconnected`] so the host can distinguish orderly
/// teardowns from protocol failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The remote announced an orderly disconnect.
    DisconnectedByRemote,
    /// This side requested the disconnect.
    LocalDisconnect,
    /// Nothing was received for the configured timeout.
    Timeout,
    /// The handshake checksum exchange showed the peers disagree on the
    /// registered-type table.
    ProtocolMismatch,
    /// The handshake went unanswered for every allowed attempt.
    HandshakeTimeout,
    /// A reliable channel exhausted its retransmission attempts; reliable
    /// delivery is a hard guarantee, so the connection is torn down.
    RetryExhausted(ChannelKind),
}

/// Application-visible notifications produced by the processing step.
/// Drained once per tick from [`Peer::tick`](crate::Peer::tick); there is
/// no implicit broadcast.
pub enum PeerEvent {
    /// A connection reached the Connected state.
    Connected(PeerId),
    /// A connection closed; its instance registry has been released.
    Disconnected(PeerId, CloseReason),
    /// A remote-hosted replicable became relevant and its shadow was
    /// created locally.
    ReplicableSpawned {
        peer: PeerId,
        network_id: NetworkId,
        kind: ReplicableKind,
    },
    /// The remote retired a replicable (or it left relevance); the shadow
    /// has been released.
    ReplicableDespawned {
        peer: PeerId,
        network_id: NetworkId,
    },
    /// One property of a shadow instance was overwritten by a received
    /// update.
    PropertyChanged {
        peer: PeerId,
        network_id: NetworkId,
        property: PropertyIndex,
    },
    /// A remote call passed its authority check and resolved its target
    /// instance. `args` downcasts to the registered argument type.
    RpcReceived {
        peer: PeerId,
        target: OwnedNetworkId,
        kind: RpcKind,
        args: Box<dyn Any>,
    },
}

impl std::fmt::Debug for PeerEvent {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerEvent::Connected(peer) => formatter.debug_tuple("Connected").field(peer).finish(),
            PeerEvent::Disconnected(peer, reason) => formatter
                .debug_tuple("Disconnected")
                .field(peer)
                .field(reason)
                .finish(),
            PeerEvent::ReplicableSpawned {
                peer,
                network_id,
                kind,
            } => formatter
                .debug_struct("ReplicableSpawned")
                .field("peer", peer)
                .field("network_id", network_id)
                .field("kind", kind)
                .finish(),
            PeerEvent::ReplicableDespawned { peer, network_id } => formatter
                .debug_struct("ReplicableDespawned")
                .field("peer", peer)
                .field("network_id", network_id)
                .finish(),
            PeerEvent::PropertyChanged {
                peer,
                network_id,
                property,
            } => formatter
                .debug_struct("PropertyChanged")
                .field("peer", peer)
                .field("network_id", network_id)
                .field("property", property)
                .finish(),
            PeerEvent::RpcReceived {
                peer,
                target,
                kind,
                ..
            } => formatter
                .debug_struct("RpcReceived")
                .field("peer", peer)
                .field("target", target)
                .field("kind", kind)
                .finish_non_exhaustive(),
        }
    }
}
