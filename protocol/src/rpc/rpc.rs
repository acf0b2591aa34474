use std::any::Any;

use replink_serde::Serde;

/// Which side of a connection an RPC may execute on. Checked on the
/// receiving side against its own authority before dispatch; this is a
/// security boundary, not a routing hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetSide {
    /// Executes only on the server-authority peer.
    ServerOnly,
    /// Executes only on client peers.
    ClientOnly,
    /// Executes on every peer the target replicable is relevant to.
    Multicast,
}

impl TargetSide {
    pub(crate) fn table_tag(&self) -> u8 {
        match self {
            TargetSide::ServerOnly => 0,
            TargetSide::ClientOnly => 1,
            TargetSide::Multicast => 2,
        }
    }
}

/// A remote-invocable call's argument schema. Declared once per RPC and
/// registered on every peer in the same order; the registration index is
/// the call's wire id.
pub trait RpcArgs: Serde + Any {
    const NAME: &'static str;
    const TARGET: TargetSide;
}
