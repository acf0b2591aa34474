//! RPC dispatch end-to-end: direction checks on both the sending and
//! receiving side, multicast fan-out, and causal ordering.

use std::time::{Duration, Instant};

use replink::{
    ConnectionConfig, HostAuthority, Peer, PeerEvent, RpcError, TargetSide,
};
use replink_test::{
    addr, run_ticks, test_protocol, FireTorpedo, HullAlarm, LinkHub, LinkTransport, Ship,
    ShowBanner,
};

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

    (server, client, server_handle, now)
}

#[test]
fn server_only_call_dispatches_on_the_server() {
    init_logs();
    let (mut server, mut client, server_handle, mut now) = connected_pair(7000, 7001);

    let ship_id = server.spawn(Ship::new("gunboat", 50, 0.0, 0)).unwrap();
    run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    client
        .send_rpc_to_remote(server_handle, ship_id, &FireTorpedo { heading: 1.5 })
        .unwrap();
    let (_, server_events) = run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    let expected_kind = server.protocol().rpc_kinds.kind_of::<FireTorpedo>().unwrap();
    let received = server_events.iter().find_map(|event| match event {
        PeerEvent::RpcReceived {
            target, kind, args, ..
        } if *kind == expected_kind => Some((*target, args)),
        _ => None,
    });

    let (target, args) = received.expect("server dispatched the call");
    assert_eq!(target.id(), ship_id);
    let args = args.downcast_ref::<FireTorpedo>().unwrap();
    assert_eq!(args.heading, 1.5);
}

#[test]
fn wrong_direction_is_refused_at_the_call_site() {
    init_logs();
    let (mut server, mut client, server_handle, mut now) = connected_pair(7010, 7011);

    let ship_id = server.spawn(Ship::new("gunboat", 50, 0.0, 0)).unwrap();
    run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    // a server-only call cannot be aimed at a client
    let client_handle = server.connected_peers()[0];
    assert!(matches!(
        server.send_rpc_to_remote(client_handle, ship_id, &FireTorpedo { heading: 0.0 }),
        Err(RpcError::AuthorityViolation {
            target: TargetSide::ServerOnly,
            ..
        })
    ));

    // and a client cannot aim a client-only call at the server
    assert!(matches!(
        client.send_rpc_to_remote(server_handle, ship_id, &ShowBanner { text: "hi".into() }),
        Err(RpcError::AuthorityViolation {
            target: TargetSide::ClientOnly,
            ..
        })
    ));
}

#[test]
fn server_only_call_arriving_at_a_client_is_rejected() {
    init_logs();
    // two misconfigured client-authority peers: the sender believes the
    // remote is a server, the receiver knows it is not and must refuse
    let hub = LinkHub::new();
    let mut host = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(7020)),
    );
    let mut caller = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(7021)),
    );

    let mut now = Instant::now();
    let host_handle = caller.connect(addr(7020), now);
    run_ticks(&mut caller, &mut host, &mut now, 5, STEP);

    let ship_id = host.spawn(Ship::new("decoy", 10, 0.0, 0)).unwrap();
    run_ticks(&mut caller, &mut host, &mut now, 5, STEP);

    caller
        .send_rpc_to_remote(host_handle, ship_id, &FireTorpedo { heading: 2.0 })
        .unwrap();
    let (_, host_events) = run_ticks(&mut caller, &mut host, &mut now, 5, STEP);

    // rejected and logged, never dispatched
    assert!(!host_events
        .iter()
        .any(|event| matches!(event, PeerEvent::RpcReceived { .. })));
}

#[test]
fn multicast_reaches_every_relevant_connection() {
    init_logs();
    let hub = LinkHub::new();
    let mut server = Peer::new(
        test_protocol(),
        HostAuthority::Server,
        ConnectionConfig::default(),
        hub.endpoint(addr(7030)),
    );
    let mut client_a = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(7031)),
    );
    let mut client_b = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(7032)),
    );

    let mut now = Instant::now();
    client_a.connect(addr(7030), now);
    client_b.connect(addr(7030), now);

    let mut events_a = Vec::new();
    let mut events_b = Vec::new();
    let mut drive = |server: &mut Peer<LinkTransport>,
                     a: &mut Peer<LinkTransport>,
                     b: &mut Peer<LinkTransport>,
                     now: &mut Instant,
                     events_a: &mut Vec<PeerEvent>,
                     events_b: &mut Vec<PeerEvent>| {
        for _ in 0..5 {
            server.tick(*now);
            events_a.extend(a.tick(*now));
            events_b.extend(b.tick(*now));
            *now += STEP;
        }
    };

    drive(&mut server, &mut client_a, &mut client_b, &mut now, &mut events_a, &mut events_b);
    let ship_id = server.spawn(Ship::new("flag", 100, 0.0, 0)).unwrap();
    drive(&mut server, &mut client_a, &mut client_b, &mut now, &mut events_a, &mut events_b);

    server
        .send_rpc_to_hosted(ship_id, &HullAlarm { level: 3 })
        .unwrap();
    events_a.clear();
    events_b.clear();
    drive(&mut server, &mut client_a, &mut client_b, &mut now, &mut events_a, &mut events_b);

    for events in [&events_a, &events_b] {
        let alarm = events.iter().find_map(|event| match event {
            PeerEvent::RpcReceived { args, .. } => args.downcast_ref::<HullAlarm>(),
            _ => None,
        });
        assert_eq!(alarm.expect("alarm dispatched").level, 3);
    }
}

#[test]
fn calls_on_one_replicable_arrive_in_invocation_order() {
    init_logs();
    let (mut server, mut client, _server_handle, mut now) = connected_pair(7040, 7041);

    let ship_id = server.spawn(Ship::new("relay", 100, 0.0, 0)).unwrap();
    run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    for level in 1..=4u8 {
        server
            .send_rpc_to_hosted(ship_id, &HullAlarm { level })
            .unwrap();
    }
    let (client_events, _) = run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    let levels: Vec<u8> = client_events
        .iter()
        .filter_map(|event| match event {
            PeerEvent::RpcReceived { args, .. } => {
                args.downcast_ref::<HullAlarm>().map(|alarm| alarm.level)
            }
            _ => None,
        })
        .collect();
    assert_eq!(levels, vec![1, 2, 3, 4]);
}
