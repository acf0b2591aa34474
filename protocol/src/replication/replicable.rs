use std::any::Any;

use replink_serde::{BitReader, BitWrite, SerdeErr};

use crate::{
    replication::{diff_mask::DiffMask, mut_channel::PropertyMutator, property::ReplicationPolicy},
    types::PropertyIndex,
};

/// An object whose identity and property state are synchronized across
/// connections. Implementations declare a fixed, ordered set of
/// [`Property`](crate::replication::property::Property) fields; field order
/// is the wire contract, so `write_update` and `read_update` must walk the
/// fields in the same declared order on both peers.
///
/// The authoritative peer holds the canonical instance; every other peer
/// holds a shadow whose values are overwritten by received updates.
pub trait Replicable: Any {
    /// The registered type name, for diagnostics.
    fn kind_name(&self) -> &'static str;

    fn property_count(&self) -> PropertyIndex;

    fn policy(&self, index: PropertyIndex) -> ReplicationPolicy;

    /// Attach change tracking to every property. Called when the instance
    /// is spawned into the host world.
    fn publish(&mut self, mutator: &PropertyMutator);

    /// Write the properties selected by `mask`, in declared order.
    fn write_update(&self, mask: &DiffMask, writer: &mut dyn BitWrite);

    /// Overwrite the properties selected by `mask` from the stream, in
    /// declared order. Reapplying the same update is idempotent.
    fn read_update(&mut self, mask: &DiffMask, reader: &mut BitReader) -> Result<(), SerdeErr>;

    /// Exact bits `write_update` would produce for `mask`.
    fn update_bit_length(&self, mask: &DiffMask) -> u32;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The registerable half of a replicable type: a stable name and a way to
/// build a shadow instance from a spawn snapshot. Registered in identical
/// order on every peer by the [`Protocol`](crate::Protocol) builder.
pub trait ReplicableSchema: Replicable + Sized {
    const NAME: &'static str;
    const PROPERTY_COUNT: PropertyIndex;

    /// Build a fresh instance from the masked snapshot in `reader`.
    /// Properties outside the mask keep their declared defaults.
    fn create_from(mask: &DiffMask, reader: &mut BitReader) -> Result<Self, SerdeErr>;
}
