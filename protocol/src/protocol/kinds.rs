use std::{any::Any, any::TypeId, collections::HashMap};

use replink_serde::{BitReader, BitWrite, SerdeErr};

use crate::{
    replication::{
        diff_mask::DiffMask,
        replicable::{Replicable, ReplicableSchema},
    },
    rpc::rpc::{RpcArgs, TargetSide},
    types::PropertyIndex,
};

/// Wire id of a registered replicable type: its position in the
/// registration order, identical on every peer by contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReplicableKind(u16);

impl ReplicableKind {
    pub fn to_index(self) -> u16 {
        self.0
    }
}

/// Wire id of a registered RPC signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RpcKind(u16);

impl RpcKind {
    pub fn to_index(self) -> u16 {
        self.0
    }
}

/// Minimum bits needed to address `len` registered entries: the table size
/// is a shared registration-time fact, so ids ride the wire at exactly
/// this width.
fn table_bits(len: usize) -> u32 {
    let mut bits = 1;
    while (1usize << bits) < len {
        bits += 1;
    }
    bits
}

fn write_index(index: u16, bits: u32, writer: &mut dyn BitWrite) {
    for position in 0..bits {
        writer.write_bit((index >> position) & 1 != 0);
    }
}

fn read_index(bits: u32, reader: &mut BitReader) -> Result<u16, SerdeErr> {
    let mut index: u16 = 0;
    for position in 0..bits {
        if reader.read_bit()? {
            index |= 1 << position;
        }
    }
    Ok(index)
}

type CreateFn = fn(&DiffMask, &mut BitReader) -> Result<Box<dyn Replicable>, SerdeErr>;

struct ReplicableRegistration {
    name: &'static str,
    property_count: PropertyIndex,
    create: CreateFn,
}

/// The ordered table of replicable types. Built once at process start and
/// immutable afterward; registration order assigns the wire ids.
pub struct ReplicableKinds {
    entries: Vec<ReplicableRegistration>,
    by_type: HashMap<TypeId, ReplicableKind>,
}

impl ReplicableKinds {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    pub(crate) fn register<T: ReplicableSchema + 'static>(&mut self) {
        let type_id = TypeId::of::<T>();
        assert!(
            !self.by_type.contains_key(&type_id),
            "replicable type {} registered twice",
            T::NAME
        );
        let kind = ReplicableKind(self.entries.len() as u16);
        self.entries.push(ReplicableRegistration {
            name: T::NAME,
            property_count: T::PROPERTY_COUNT,
            create: |mask, reader| {
                T::create_from(mask, reader).map(|value| Box::new(value) as Box<dyn Replicable>)
            },
        });
        self.by_type.insert(type_id, kind);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kind_of<T: ReplicableSchema + 'static>(&self) -> Option<ReplicableKind> {
        self.kind_for(TypeId::of::<T>())
    }

    pub fn kind_for(&self, type_id: TypeId) -> Option<ReplicableKind> {
        self.by_type.get(&type_id).copied()
    }

    pub fn name(&self, kind: ReplicableKind) -> &'static str {
        self.entries[usize::from(kind.0)].name
    }

    pub fn property_count(&self, kind: ReplicableKind) -> PropertyIndex {
        self.entries[usize::from(kind.0)].property_count
    }

    pub fn create(
        &self,
        kind: ReplicableKind,
        mask: &DiffMask,
        reader: &mut BitReader,
    ) -> Result<Box<dyn Replicable>, SerdeErr> {
        (self.entries[usize::from(kind.0)].create)(mask, reader)
    }

    pub fn kind_bit_length(&self) -> u32 {
        table_bits(self.entries.len())
    }

    pub fn write_kind(&self, kind: ReplicableKind, writer: &mut dyn BitWrite) {
        write_index(kind.0, self.kind_bit_length(), writer);
    }

    pub fn read_kind(&self, reader: &mut BitReader) -> Result<ReplicableKind, SerdeErr> {
        let index = read_index(self.kind_bit_length(), reader)?;
        if usize::from(index) >= self.entries.len() {
            return Err(SerdeErr);
        }
        Ok(ReplicableKind(index))
    }

    pub(crate) fn table_digest(&self) -> impl Iterator<Item = (u16, &'static str, u8)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (index as u16, entry.name, entry.property_count))
    }
}

type ReadArgsFn = fn(&mut BitReader) -> Result<Box<dyn Any>, SerdeErr>;

struct RpcRegistration {
    name: &'static str,
    target: TargetSide,
    read_args: ReadArgsFn,
}

/// The ordered table of RPC signatures, mirroring [`ReplicableKinds`].
pub struct RpcKinds {
    entries: Vec<RpcRegistration>,
    by_type: HashMap<TypeId, RpcKind>,
}

impl RpcKinds {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    pub(crate) fn register<R: RpcArgs>(&mut self) {
        let type_id = TypeId::of::<R>();
        assert!(
            !self.by_type.contains_key(&type_id),
            "rpc type {} registered twice",
            R::NAME
        );
        let kind = RpcKind(self.entries.len() as u16);
        self.entries.push(RpcRegistration {
            name: R::NAME,
            target: R::TARGET,
            read_args: |reader| R::de(reader).map(|args| Box::new(args) as Box<dyn Any>),
        });
        self.by_type.insert(type_id, kind);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kind_of<R: RpcArgs>(&self) -> Option<RpcKind> {
        self.by_type.get(&TypeId::of::<R>()).copied()
    }

    pub fn name(&self, kind: RpcKind) -> &'static str {
        self.entries[usize::from(kind.0)].name
    }

    pub fn target(&self, kind: RpcKind) -> TargetSide {
        self.entries[usize::from(kind.0)].target
    }

    pub fn read_args(
        &self,
        kind: RpcKind,
        reader: &mut BitReader,
    ) -> Result<Box<dyn Any>, SerdeErr> {
        (self.entries[usize::from(kind.0)].read_args)(reader)
    }

    pub fn kind_bit_length(&self) -> u32 {
        table_bits(self.entries.len())
    }

    pub fn write_kind(&self, kind: RpcKind, writer: &mut dyn BitWrite) {
        write_index(kind.0, self.kind_bit_length(), writer);
    }

    pub fn read_kind(&self, reader: &mut BitReader) -> Result<RpcKind, SerdeErr> {
        let index = read_index(self.kind_bit_length(), reader)?;
        if usize::from(index) >= self.entries.len() {
            return Err(SerdeErr);
        }
        Ok(RpcKind(index))
    }

    pub(crate) fn table_digest(&self) -> impl Iterator<Item = (u16, &'static str, u8)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (index as u16, entry.name, entry.target.table_tag()))
    }
}
