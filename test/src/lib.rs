//! Shared fixtures for replink's end-to-end tests: an in-memory datagram
//! hub with controllable loss, a hand-implemented replicable type, and a
//! small RPC vocabulary.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet, VecDeque},
    net::SocketAddr,
    rc::Rc,
    time::{Duration, Instant},
};

use replink::{
    BitReader, BitWrite, DiffMask, PeerEvent, Property, PropertyIndex, PropertyMutator, Protocol,
    Replicable, ReplicableSchema, ReplicationPolicy, RpcArgs, Serde, SerdeErr, TargetSide,
    Transport, TransportError,
};

// In-memory transport

struct HubState {
    queues: HashMap<SocketAddr, VecDeque<(SocketAddr, Vec<u8>)>>,
    blocked: HashSet<(SocketAddr, SocketAddr)>,
}

/// A shared in-memory datagram switch. Endpoints see each other by socket
/// address; links can be blocked per direction to simulate loss.
#[derive(Clone)]
pub struct LinkHub {
    state: Rc<RefCell<HubState>>,
}

impl LinkHub {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HubState {
                queues: HashMap::new(),
                blocked: HashSet::new(),
            })),
        }
    }

    pub fn endpoint(&self, address: SocketAddr) -> LinkTransport {
        self.state.borrow_mut().queues.entry(address).or_default();
        LinkTransport {
            state: Rc::clone(&self.state),
            address,
        }
    }

    /// Silently drop everything sent from `from` to `to`.
    pub fn block(&self, from: SocketAddr, to: SocketAddr) {
        self.state.borrow_mut().blocked.insert((from, to));
    }

    pub fn unblock(&self, from: SocketAddr, to: SocketAddr) {
        self.state.borrow_mut().blocked.remove(&(from, to));
    }
}

pub struct LinkTransport {
    state: Rc<RefCell<HubState>>,
    address: SocketAddr,
}

impl Transport for LinkTransport {
    fn send(&mut self, address: SocketAddr, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.blocked.contains(&(self.address, address)) {
            return Ok(());
        }
        if let Some(queue) = state.queues.get_mut(&address) {
            queue.push_back((self.address, payload.to_vec()));
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<(SocketAddr, Vec<u8>)>, TransportError> {
        Ok(self
            .state
            .borrow_mut()
            .queues
            .get_mut(&self.address)
            .and_then(VecDeque::pop_front))
    }
}

pub fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().expect("valid address")
}

// Replicable fixture

/// Test replicable with one property per replication policy. Field order
/// is the wire contract; the indices below are part of the registration.
pub struct Ship {
    pub name: Property<String>,
    pub hull: Property<u16>,
    pub heading: Property<f32>,
    pub cargo_code: Property<u8>,
}

impl Ship {
    pub const NAME_INDEX: PropertyIndex = 0;
    pub const HULL_INDEX: PropertyIndex = 1;
    pub const HEADING_INDEX: PropertyIndex = 2;
    pub const CARGO_CODE_INDEX: PropertyIndex = 3;

    pub fn new(name: &str, hull: u16, heading: f32, cargo_code: u8) -> Self {
        Self {
            name: Property::new(
                name.to_string(),
                Self::NAME_INDEX,
                ReplicationPolicy::InitialOnly,
            ),
            hull: Property::new(hull, Self::HULL_INDEX, ReplicationPolicy::OnChange),
            heading: Property::new(heading, Self::HEADING_INDEX, ReplicationPolicy::Always),
            cargo_code: Property::new(
                cargo_code,
                Self::CARGO_CODE_INDEX,
                ReplicationPolicy::OwnerOnly,
            ),
        }
    }
}

impl Replicable for Ship {
    fn kind_name(&self) -> &'static str {
        "Ship"
    }

    fn property_count(&self) -> PropertyIndex {
        Self::PROPERTY_COUNT
    }

    fn policy(&self, index: PropertyIndex) -> ReplicationPolicy {
        match index {
            Self::NAME_INDEX => self.name.policy(),
            Self::HULL_INDEX => self.hull.policy(),
            Self::HEADING_INDEX => self.heading.policy(),
            _ => self.cargo_code.policy(),
        }
    }

    fn publish(&mut self, mutator: &PropertyMutator) {
        self.name.publish(mutator);
        self.hull.publish(mutator);
        self.heading.publish(mutator);
        self.cargo_code.publish(mutator);
    }

    fn write_update(&self, mask: &DiffMask, writer: &mut dyn BitWrite) {
        if mask.bit(Self::NAME_INDEX) {
            self.name.write(writer);
        }
        if mask.bit(Self::HULL_INDEX) {
            self.hull.write(writer);
        }
        if mask.bit(Self::HEADING_INDEX) {
            self.heading.write(writer);
        }
        if mask.bit(Self::CARGO_CODE_INDEX) {
            self.cargo_code.write(writer);
        }
    }

    fn read_update(&mut self, mask: &DiffMask, reader: &mut BitReader) -> Result<(), SerdeErr> {
        if mask.bit(Self::NAME_INDEX) {
            self.name.read(reader)?;
        }
        if mask.bit(Self::HULL_INDEX) {
            self.hull.read(reader)?;
        }
        if mask.bit(Self::HEADING_INDEX) {
            self.heading.read(reader)?;
        }
        if mask.bit(Self::CARGO_CODE_INDEX) {
            self.cargo_code.read(reader)?;
        }
        Ok(())
    }

    fn update_bit_length(&self, mask: &DiffMask) -> u32 {
        let mut output = 0;
        if mask.bit(Self::NAME_INDEX) {
            output += self.name.bit_length();
        }
        if mask.bit(Self::HULL_INDEX) {
            output += self.hull.bit_length();
        }
        if mask.bit(Self::HEADING_INDEX) {
            output += self.heading.bit_length();
        }
        if mask.bit(Self::CARGO_CODE_INDEX) {
            output += self.cargo_code.bit_length();
        }
        output
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

impl ReplicableSchema for Ship {
    const NAME: &'static str = "Ship";
    const PROPERTY_COUNT: PropertyIndex = 4;

    fn create_from(mask: &DiffMask, reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let mut ship = Ship::new("", 0, 0.0, 0);
        ship.read_update(mask, reader)?;
        Ok(ship)
    }
}

// RPC fixtures

#[derive(Clone, Debug, PartialEq)]
pub struct FireTorpedo {
    pub heading: f32,
}

impl Serde for FireTorpedo {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.heading.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            heading: f32::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.heading.bit_length()
    }
}

impl RpcArgs for FireTorpedo {
    const NAME: &'static str = "FireTorpedo";
    const TARGET: TargetSide = TargetSide::ServerOnly;
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShowBanner {
    pub text: String,
}

impl Serde for ShowBanner {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.text.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            text: String::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.text.bit_length()
    }
}

impl RpcArgs for ShowBanner {
    const NAME: &'static str = "ShowBanner";
    const TARGET: TargetSide = TargetSide::ClientOnly;
}

#[derive(Clone, Debug, PartialEq)]
pub struct HullAlarm {
    pub level: u8,
}

impl Serde for HullAlarm {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.level.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            level: u8::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.level.bit_length()
    }
}

impl RpcArgs for HullAlarm {
    const NAME: &'static str = "HullAlarm";
    const TARGET: TargetSide = TargetSide::Multicast;
}

// Protocol tables

/// The registration every well-behaved test peer makes, in the same order.
pub fn test_protocol() -> Protocol {
    Protocol::builder()
        .add_replicable::<Ship>()
        .add_rpc::<FireTorpedo>()
        .add_rpc::<ShowBanner>()
        .add_rpc::<HullAlarm>()
        .build()
}

/// Same types, different registration order: a peer built from this table
/// must fail the handshake against [`test_protocol`].
pub fn reordered_protocol() -> Protocol {
    Protocol::builder()
        .add_replicable::<Ship>()
        .add_rpc::<ShowBanner>()
        .add_rpc::<FireTorpedo>()
        .add_rpc::<HullAlarm>()
        .build()
}

// Tick driving

/// Advance two peers in lockstep, collecting each side's events.
pub fn run_ticks<A: Transport, B: Transport>(
    first: &mut replink::Peer<A>,
    second: &mut replink::Peer<B>,
    now: &mut Instant,
    ticks: u32,
    step: Duration,
) -> (Vec<PeerEvent>, Vec<PeerEvent>) {
    let mut first_events = Vec::new();
    let mut second_events = Vec::new();
    for _ in 0..ticks {
        first_events.extend(first.tick(*now));
        second_events.extend(second.tick(*now));
        *now += step;
    }
    (first_events, second_events)
}
