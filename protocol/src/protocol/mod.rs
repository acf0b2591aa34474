pub mod kinds;

use crc32fast::Hasher;

use crate::{
    protocol::kinds::{ReplicableKinds, RpcKinds},
    replication::replicable::ReplicableSchema,
    rpc::rpc::RpcArgs,
};

/// The immutable registration table shared by every connection of a peer:
/// replicable types and RPC signatures in the order they were registered.
///
/// Registration order is a protocol compatibility contract. Every peer must
/// make the same `add_*` calls in the same order before opening any
/// connection; the CRC32 digest over the table is exchanged at handshake,
/// and a mismatch fails the connection rather than silently corrupting
/// every subsequent decode.
pub struct Protocol {
    pub replicable_kinds: ReplicableKinds,
    pub rpc_kinds: RpcKinds,
    registry_checksum: u32,
}

impl Protocol {
    pub fn builder() -> ProtocolBuilder {
        ProtocolBuilder {
            replicable_kinds: ReplicableKinds::new(),
            rpc_kinds: RpcKinds::new(),
        }
    }

    pub fn registry_checksum(&self) -> u32 {
        self.registry_checksum
    }
}

/// Order-stable registration builder, consumed at process start.
pub struct ProtocolBuilder {
    replicable_kinds: ReplicableKinds,
    rpc_kinds: RpcKinds,
}

impl ProtocolBuilder {
    pub fn add_replicable<T: ReplicableSchema + 'static>(mut self) -> Self {
        self.replicable_kinds.register::<T>();
        self
    }

    pub fn add_rpc<R: RpcArgs>(mut self) -> Self {
        self.rpc_kinds.register::<R>();
        self
    }

    /// Freeze the table and compute the checksum exchanged at handshake.
    pub fn build(self) -> Protocol {
        let mut hasher = Hasher::new();
        for (index, name, property_count) in self.replicable_kinds.table_digest() {
            hasher.update(&index.to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(&[property_count]);
        }
        for (index, name, target_tag) in self.rpc_kinds.table_digest() {
            hasher.update(&index.to_le_bytes());
            hasher.update(name.as_bytes());
            hasher.update(&[target_tag]);
        }

        Protocol {
            replicable_kinds: self.replicable_kinds,
            rpc_kinds: self.rpc_kinds,
            registry_checksum: hasher.finalize(),
        }
    }
}
