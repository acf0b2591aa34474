use thiserror::Error;

use crate::{
    rpc::rpc::TargetSide,
    types::{HostAuthority, NetworkId},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// A call arrived at a side its declaration forbids. Rejected and
    /// logged, never executed: this is a security boundary.
    #[error("rpc '{name}' is declared {target:?} but arrived at a {authority:?} peer; rejected")]
    AuthorityViolation {
        name: &'static str,
        target: TargetSide,
        authority: HostAuthority,
    },

    /// The call's target instance never resolved before the waitlist
    /// expired; the call is dropped, diagnostic only.
    #[error("rpc '{name}' target {network_id:?} never appeared; call dropped")]
    DispatchTargetMissing {
        name: &'static str,
        network_id: NetworkId,
    },

    /// Attempted to invoke an RPC type that was never registered.
    #[error("rpc type was not registered with the protocol")]
    UnregisteredRpc,
}
