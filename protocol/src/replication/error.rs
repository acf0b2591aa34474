use thiserror::Error;

use crate::types::NetworkId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// A spawn referenced a type id outside the registered table.
    #[error("no replicable type registered under wire id {wire_id}")]
    UnknownReplicableKind { wire_id: u16 },

    /// An action referenced an instance this registry has never seen.
    #[error("no instance registered under network id {network_id:?}")]
    UnknownInstance { network_id: NetworkId },

    /// A spawn arrived for a network id that is already registered.
    #[error("network id {network_id:?} is already registered")]
    DuplicateInstance { network_id: NetworkId },

    /// The host world ran out of allocatable network ids.
    #[error("network id space exhausted")]
    IdSpaceExhausted,

    /// Attempted to spawn a type that was never registered.
    #[error("replicable type '{name}' was not registered with the protocol")]
    UnregisteredType { name: &'static str },
}
