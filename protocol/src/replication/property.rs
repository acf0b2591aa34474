use std::ops::{Deref, DerefMut};

use replink_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::{replication::mut_channel::PropertyMutator, types::PropertyIndex};

/// When a property's value crosses the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicationPolicy {
    /// In the spawn snapshot, then in deltas whenever it changes.
    OnChange,
    /// Every update, changed or not.
    Always,
    /// Only to the connection that owns the replicable.
    OwnerOnly,
    /// Only in the spawn snapshot, never afterward.
    InitialOnly,
}

/// A replicated field of a replicable object. On the authoritative side the
/// property is published with a mutator and mutable access marks it dirty;
/// on the shadow side it is overwritten by each received update, never
/// merged.
#[derive(Clone)]
pub struct Property<T: Serde> {
    inner: T,
    index: PropertyIndex,
    policy: ReplicationPolicy,
    mutator: Option<PropertyMutator>,
}

impl<T: Serde> Property<T> {
    pub fn new(value: T, index: PropertyIndex, policy: ReplicationPolicy) -> Self {
        Self {
            inner: value,
            index,
            policy,
            mutator: None,
        }
    }

    pub fn index(&self) -> PropertyIndex {
        self.index
    }

    pub fn policy(&self) -> ReplicationPolicy {
        self.policy
    }

    /// Attach change tracking. Called once when the owning replicable is
    /// spawned into the host world.
    pub fn publish(&mut self, mutator: &PropertyMutator) {
        self.mutator = Some(mutator.clone());
    }

    /// Write the contained value into an outgoing stream.
    pub fn write(&self, writer: &mut dyn BitWrite) {
        self.inner.ser(writer);
    }

    /// Overwrite the contained value from an incoming update. Applying the
    /// same update twice leaves the same state: last write wins.
    pub fn read(&mut self, reader: &mut BitReader) -> Result<(), SerdeErr> {
        self.inner = T::de(reader)?;
        Ok(())
    }

    pub fn bit_length(&self) -> u32 {
        self.inner.bit_length()
    }
}

impl<T: Serde> Deref for Property<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Serde> DerefMut for Property<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // assume the caller will change the value, queue it for update
        if let Some(mutator) = &self.mutator {
            mutator.mutate(self.index);
        }
        &mut self.inner
    }
}
