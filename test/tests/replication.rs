//! Replication end-to-end: spawn snapshots, property deltas, relevance
//! transitions, tombstones, owner-only visibility, and idempotent apply.

use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

use replink::{
    BitReader, BitWriter, ConnectionConfig, DiffMask, HostAuthority, NetworkId, Peer, PeerEvent,
    Replicable, ReplicableSchema, ScopeCondition,
};
use replink_test::{addr, run_ticks, test_protocol, LinkHub, LinkTransport, Ship};

const STEP: Duration = Duration::from_millis(50);

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn connected_pair(
    server_port: u16,
    client_port: u16,
) -> (
    Peer<LinkTransport>,
    Peer<LinkTransport>,
    replink::PeerId,
    Instant,
    LinkHub,
) {
    let hub = LinkHub::new();
    let mut server = Peer::new(
        test_protocol(),
        HostAuthority::Server,
        ConnectionConfig::default(),
        hub.endpoint(addr(server_port)),
    );
    let mut client = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(client_port)),
    );

    let mut now = Instant::now();
    let server_handle = client.connect(addr(server_port), now);
    run_ticks(&mut client, &mut server, &mut now, 5, STEP);
    assert!(client.connection_state(server_handle).is_some());

    (server, client, server_handle, now, hub)
}

fn spawned_id(events: &[PeerEvent]) -> Option<NetworkId> {
    events.iter().find_map(|event| match event {
        PeerEvent::ReplicableSpawned { network_id, .. } => Some(*network_id),
        _ => None,
    })
}

#[test]
fn newly_relevant_replicable_arrives_as_full_snapshot() {
    init_logs();
    let (mut server, mut client, server_handle, mut now, _hub) = connected_pair(6000, 6001);

    let ship_id = server
        .spawn(Ship::new("dauntless", 90, 1.25, 7))
        .unwrap();
    let (client_events, _) = run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    assert_eq!(spawned_id(&client_events), Some(ship_id));

    let shadow = client
        .remote_replicable::<Ship>(server_handle, ship_id)
        .expect("shadow instance exists");
    assert_eq!(*shadow.name, "dauntless");
    assert_eq!(*shadow.hull, 90);
    assert_eq!(*shadow.heading, 1.25);
}

#[test]
fn changed_property_reaches_the_shadow_with_a_notification() {
    init_logs();
    let (mut server, mut client, server_handle, mut now, _hub) = connected_pair(6010, 6011);

    let ship_id = server.spawn(Ship::new("resolute", 100, 0.0, 0)).unwrap();
    run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    *server.replicable_mut::<Ship>(ship_id).unwrap().hull = 42;
    let (client_events, _) = run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    assert!(client_events.iter().any(|event| matches!(
        event,
        PeerEvent::PropertyChanged { network_id, property, .. }
            if *network_id == ship_id && *property == Ship::HULL_INDEX
    )));
    let shadow = client
        .remote_replicable::<Ship>(server_handle, ship_id)
        .unwrap();
    assert_eq!(*shadow.hull, 42);
}

#[test]
fn always_policy_replicates_without_mutation_tracking() {
    init_logs();
    let (mut server, mut client, server_handle, mut now, _hub) = connected_pair(6020, 6021);

    let ship_id = server.spawn(Ship::new("vigilant", 70, 0.5, 0)).unwrap();
    run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    let (client_events, _) = run_ticks(&mut client, &mut server, &mut now, 3, STEP);
    assert!(client_events.iter().any(|event| matches!(
        event,
        PeerEvent::PropertyChanged { property, .. } if *property == Ship::HEADING_INDEX
    )));
    let shadow = client
        .remote_replicable::<Ship>(server_handle, ship_id)
        .unwrap();
    assert_eq!(*shadow.heading, 0.5);
}

#[test]
fn relevance_transition_resends_the_full_snapshot() {
    init_logs();
    let (mut server, mut client, server_handle, mut now, _hub) = connected_pair(6030, 6031);

    let relevant = Rc::new(Cell::new(true));
    let gate = Rc::clone(&relevant);
    let condition: ScopeCondition = Box::new(move |_, _, _| gate.get());
    server.set_scope_condition(condition);

    let ship_id = server.spawn(Ship::new("ghost", 100, 0.0, 0)).unwrap();
    let (client_events, _) = run_ticks(&mut client, &mut server, &mut now, 5, STEP);
    assert_eq!(spawned_id(&client_events), Some(ship_id));

    // drop out of relevance: the client releases its shadow
    relevant.set(false);
    let (client_events, _) = run_ticks(&mut client, &mut server, &mut now, 5, STEP);
    assert!(client_events.iter().any(|event| matches!(
        event,
        PeerEvent::ReplicableDespawned { network_id, .. } if *network_id == ship_id
    )));
    assert!(client
        .remote_replicable::<Ship>(server_handle, ship_id)
        .is_none());

    // mutate while irrelevant, then come back into scope
    *server.replicable_mut::<Ship>(ship_id).unwrap().hull = 55;
    relevant.set(true);
    let (client_events, _) = run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    // re-entry is a full snapshot, initial-only fields included
    assert_eq!(spawned_id(&client_events), Some(ship_id));
    let shadow = client
        .remote_replicable::<Ship>(server_handle, ship_id)
        .unwrap();
    assert_eq!(*shadow.name, "ghost");
    assert_eq!(*shadow.hull, 55);
}

#[test]
fn despawn_sends_a_tombstone_and_releases_the_shadow() {
    init_logs();
    let (mut server, mut client, server_handle, mut now, _hub) = connected_pair(6040, 6041);

    let ship_id = server.spawn(Ship::new("brief", 10, 0.0, 0)).unwrap();
    run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    server.despawn(ship_id).unwrap();
    let (client_events, _) = run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    assert!(client_events.iter().any(|event| matches!(
        event,
        PeerEvent::ReplicableDespawned { network_id, .. } if *network_id == ship_id
    )));
    assert!(client
        .remote_replicable::<Ship>(server_handle, ship_id)
        .is_none());
}

#[test]
fn owner_only_properties_reach_the_owner_alone() {
    init_logs();
    let hub = LinkHub::new();
    let mut server = Peer::new(
        test_protocol(),
        HostAuthority::Server,
        ConnectionConfig::default(),
        hub.endpoint(addr(6050)),
    );
    let mut client_a = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(6051)),
    );
    let mut client_b = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(6052)),
    );

    let mut now = Instant::now();
    let server_from_a = client_a.connect(addr(6050), now);
    let server_from_b = client_b.connect(addr(6050), now);

    let mut server_events = Vec::new();
    for _ in 0..5 {
        server_events.extend(server.tick(now));
        client_a.tick(now);
        client_b.tick(now);
        now += STEP;
    }
    let connected: Vec<_> = server_events
        .iter()
        .filter_map(|event| match event {
            PeerEvent::Connected(peer) => Some(*peer),
            _ => None,
        })
        .collect();
    assert_eq!(connected.len(), 2);

    // the hub delivered client_a's handshake first, so connected[0] is a
    let owner_handle = connected[0];
    let ship_id = server
        .spawn_with_owner(Ship::new("secret", 80, 0.0, 99), owner_handle)
        .unwrap();

    for _ in 0..5 {
        server.tick(now);
        client_a.tick(now);
        client_b.tick(now);
        now += STEP;
    }

    let shadow_a = client_a
        .remote_replicable::<Ship>(server_from_a, ship_id)
        .unwrap();
    let shadow_b = client_b
        .remote_replicable::<Ship>(server_from_b, ship_id)
        .unwrap();
    assert_eq!(*shadow_a.cargo_code, 99);
    // the non-owner keeps the declared default
    assert_eq!(*shadow_b.cargo_code, 0);
}

#[test]
fn applying_the_same_update_twice_is_idempotent() {
    init_logs();
    // last-write-wins at the property level, independent of transport
    let source = Ship::new("echo", 64, 2.5, 3);
    let mut mask = DiffMask::new(Ship::PROPERTY_COUNT);
    mask.set_bit(Ship::HULL_INDEX);
    mask.set_bit(Ship::HEADING_INDEX);

    let mut writer = BitWriter::new();
    source.write_update(&mask, &mut writer);
    let bytes = writer.to_bytes();

    let mut shadow = Ship::new("", 0, 0.0, 0);
    let mut reader = BitReader::new(&bytes);
    shadow.read_update(&mask, &mut reader).unwrap();
    assert_eq!(*shadow.hull, 64);
    assert_eq!(*shadow.heading, 2.5);

    let mut reader = BitReader::new(&bytes);
    shadow.read_update(&mask, &mut reader).unwrap();
    assert_eq!(*shadow.hull, 64);
    assert_eq!(*shadow.heading, 2.5);
}
