pub mod error;

use std::net::SocketAddr;

use crate::transport::error::TransportError;

/// The datagram boundary the engine is built over. Implementations may
/// lose, duplicate, or reorder datagrams; they must not corrupt them
/// (corruption detection belongs to the transport or an outer checksum).
///
/// These are the only calls that may touch the host's I/O machinery; all
/// protocol processing above them is synchronous and CPU-bound.
pub trait Transport {
    fn send(&mut self, address: SocketAddr, payload: &[u8]) -> Result<(), TransportError>;

    /// Poll one received datagram, or `None` when the queue is empty.
    fn receive(&mut self) -> Result<Option<(SocketAddr, Vec<u8>)>, TransportError>;
}
