use replink_serde::{
    BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedVariableInteger,
};

/// Sequence number carried in every packet header.
pub type PacketIndex = u16;
/// Sequence number assigned to each unit queued on a channel.
pub type UnitIndex = u16;
/// Index of a property within its replicable's declared field order.
pub type PropertyIndex = u8;

/// Which side of a connection this process plays. The server side is the
/// conventional authority; RPC target restrictions are checked against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostAuthority {
    Server,
    Client,
}

impl HostAuthority {
    pub fn invert(self) -> Self {
        match self {
            HostAuthority::Server => HostAuthority::Client,
            HostAuthority::Client => HostAuthority::Server,
        }
    }
}

/// Local handle for one remote peer, assigned when its connection is
/// created and released when the connection closes. Never sent on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u16);

/// Identity of a replicable instance within the hosting peer's id space,
/// assigned by the authoritative side at spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(pub u16);

impl Serde for NetworkId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedVariableInteger::<7>::new(self.0).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let value = UnsignedVariableInteger::<7>::de(reader)?.get();
        u16::try_from(value).map(NetworkId).map_err(|_| SerdeErr)
    }

    fn bit_length(&self) -> u32 {
        UnsignedVariableInteger::<7>::new(self.0).bit_length()
    }
}

/// A network id qualified by whose id space it belongs to. Each peer
/// allocates ids for the objects it hosts, so a bare id is ambiguous in a
/// symmetric protocol; the owned bit disambiguates, and [`flip`] converts
/// between the sender's perspective and the receiver's.
///
/// [`flip`]: OwnedNetworkId::flip
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OwnedNetworkId {
    /// An object hosted by this peer.
    Host(NetworkId),
    /// An object hosted by the remote peer, shadowed locally.
    Remote(NetworkId),
}

impl OwnedNetworkId {
    pub fn flip(self) -> Self {
        match self {
            OwnedNetworkId::Host(id) => OwnedNetworkId::Remote(id),
            OwnedNetworkId::Remote(id) => OwnedNetworkId::Host(id),
        }
    }

    pub fn id(&self) -> NetworkId {
        match self {
            OwnedNetworkId::Host(id) | OwnedNetworkId::Remote(id) => *id,
        }
    }
}

impl Serde for OwnedNetworkId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            OwnedNetworkId::Host(id) => {
                writer.write_bit(true);
                id.ser(writer);
            }
            OwnedNetworkId::Remote(id) => {
                writer.write_bit(false);
                id.ser(writer);
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let is_host = bool::de(reader)?;
        let id = NetworkId::de(reader)?;
        if is_host {
            Ok(OwnedNetworkId::Host(id))
        } else {
            Ok(OwnedNetworkId::Remote(id))
        }
    }

    fn bit_length(&self) -> u32 {
        <bool as ConstBitLength>::const_bit_length() + self.id().bit_length()
    }
}

/// Discriminates the two unit flavors multiplexed on the reliable-ordered
/// channel, so replication actions and RPCs share one causal order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderedUnitType {
    Replication,
    Rpc,
}

impl Serde for OrderedUnitType {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let is_rpc = *self == OrderedUnitType::Rpc;
        is_rpc.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if bool::de(reader)? {
            Ok(OrderedUnitType::Rpc)
        } else {
            Ok(OrderedUnitType::Replication)
        }
    }

    fn bit_length(&self) -> u32 {
        <Self as ConstBitLength>::const_bit_length()
    }
}

impl ConstBitLength for OrderedUnitType {
    fn const_bit_length() -> u32 {
        1
    }
}
