//! Connection establishment: matching registry checksums connect, a
//! reordered registration table never does.

use std::time::{Duration, Instant};

use replink::{CloseReason, ConnectionConfig, ConnectionState, HostAuthority, Peer, PeerEvent};
use replink_test::{addr, reordered_protocol, run_ticks, test_protocol, LinkHub};

const STEP: Duration = Duration::from_millis(50);

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn matching_registrations_connect() {
    init_logs();
    let hub = LinkHub::new();
    let mut server = Peer::new(
        test_protocol(),
        HostAuthority::Server,
        ConnectionConfig::default(),
        hub.endpoint(addr(5000)),
    );
    let mut client = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(5001)),
    );

    let mut now = Instant::now();
    let server_handle = client.connect(addr(5000), now);

    let (client_events, server_events) =
        run_ticks(&mut client, &mut server, &mut now, 5, STEP);

    assert!(client_events
        .iter()
        .any(|event| matches!(event, PeerEvent::Connected(peer) if *peer == server_handle)));
    assert!(server_events
        .iter()
        .any(|event| matches!(event, PeerEvent::Connected(_))));
    assert_eq!(
        client.connection_state(server_handle),
        Some(ConnectionState::Connected)
    );
}

#[test]
fn reordered_registrations_are_rejected() {
    init_logs();
    let hub = LinkHub::new();
    let mut server = Peer::new(
        test_protocol(),
        HostAuthority::Server,
        ConnectionConfig::default(),
        hub.endpoint(addr(5010)),
    );
    let mut client = Peer::new(
        reordered_protocol(),
        HostAuthority::Client,
        ConnectionConfig::default(),
        hub.endpoint(addr(5011)),
    );

    let mut now = Instant::now();
    let server_handle = client.connect(addr(5010), now);

    let (client_events, server_events) =
        run_ticks(&mut client, &mut server, &mut now, 10, STEP);

    // the initiator learns of the mismatch; neither side ever connects
    assert!(client_events.iter().any(|event| matches!(
        event,
        PeerEvent::Disconnected(peer, CloseReason::ProtocolMismatch) if *peer == server_handle
    )));
    assert!(!client_events
        .iter()
        .any(|event| matches!(event, PeerEvent::Connected(_))));
    assert!(!server_events
        .iter()
        .any(|event| matches!(event, PeerEvent::Connected(_))));
    assert_eq!(client.connection_state(server_handle), None);
}

#[test]
fn unanswered_handshake_times_out() {
    init_logs();
    let hub = LinkHub::new();
    let mut client = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        ConnectionConfig {
            handshake_resend_interval: Duration::from_millis(100),
            handshake_max_attempts: 3,
            ..ConnectionConfig::default()
        },
        hub.endpoint(addr(5021)),
    );

    let mut now = Instant::now();
    // nobody listens at this address
    let handle = client.connect(addr(5020), now);

    let mut events = Vec::new();
    for _ in 0..20 {
        events.extend(client.tick(now));
        now += STEP;
    }

    assert!(events.iter().any(|event| matches!(
        event,
        PeerEvent::Disconnected(peer, CloseReason::HandshakeTimeout) if *peer == handle
    )));
}
