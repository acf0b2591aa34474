pub mod diff_mask;
pub mod error;
pub mod host_manager;
pub mod instance_registry;
pub mod mut_channel;
pub mod property;
pub mod remote_manager;
pub mod replicable;
pub mod world;

use replink_serde::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr, UnsignedInteger};

/// The action half of a replication unit on the reliable-ordered channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicationAction {
    /// Register an instance and carry its full snapshot.
    Spawn,
    /// Tombstone: release the instance's id mapping.
    Despawn,
}

impl Serde for ReplicationAction {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let index = match self {
            ReplicationAction::Spawn => 0,
            ReplicationAction::Despawn => 1,
        };
        UnsignedInteger::<1>::new(index).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match UnsignedInteger::<1>::de(reader)?.get() {
            0 => Ok(ReplicationAction::Spawn),
            _ => Ok(ReplicationAction::Despawn),
        }
    }

    fn bit_length(&self) -> u32 {
        <UnsignedInteger<1> as ConstBitLength>::const_bit_length()
    }
}
