//! Connection lifecycle: keep-alives under idle, silent-peer timeout,
//! orderly disconnect, and reliable-channel retry exhaustion.

use std::time::{Duration, Instant};

use replink::{
    ChannelKind, CloseReason, ConnectionConfig, HostAuthority, Peer, PeerEvent, ReliableSettings,
};
use replink_test::{addr, run_ticks, test_protocol, LinkHub, LinkTransport, Ship};

const STEP: Duration = Duration::from_millis(50);

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pair_with_config(
    server_port: u16,
    client_port: u16,
    config: ConnectionConfig,
) -> (Peer<LinkTransport>, Peer<LinkTransport>, replink::PeerId, Instant, LinkHub) {
    let hub = LinkHub::new();
    let mut server = Peer::new(
        test_protocol(),
        HostAuthority::Server,
        config.clone(),
        hub.endpoint(addr(server_port)),
    );
    let mut client = Peer::new(
        test_protocol(),
        HostAuthority::Client,
        config,
        hub.endpoint(addr(client_port)),
    );

    let mut now = Instant::now();
    let server_handle = client.connect(addr(server_port), now);
    run_ticks(&mut client, &mut server, &mut now, 5, STEP);
    assert!(client.connection_state(server_handle).is_some());

    (server, client, server_handle, now, hub)
}

#[test]
fn keep_alives_hold_an_idle_connection_open() {
    init_logs();
    let config = ConnectionConfig {
        heartbeat_interval: Duration::from_millis(300),
        timeout: Duration::from_secs(2),
        ..ConnectionConfig::default()
    };
    let (mut server, mut client, _handle, mut now, _hub) =
        pair_with_config(8000, 8001, config);

    // three full timeout periods of application silence
    let (client_events, server_events) =
        run_ticks(&mut client, &mut server, &mut now, 120, STEP);

    assert!(!client_events
        .iter()
        .any(|event| matches!(event, PeerEvent::Disconnected(..))));
    assert!(!server_events
        .iter()
        .any(|event| matches!(event, PeerEvent::Disconnected(..))));
}

#[test]
fn silent_peer_times_out() {
    init_logs();
    let config = ConnectionConfig {
        timeout: Duration::from_secs(1),
        ..ConnectionConfig::default()
    };
    let (mut server, mut client, server_handle, mut now, hub) =
        pair_with_config(8010, 8011, config);

    hub.block(addr(8010), addr(8011));
    hub.block(addr(8011), addr(8010));

    let (client_events, server_events) =
        run_ticks(&mut client, &mut server, &mut now, 40, STEP);

    assert!(client_events.iter().any(|event| matches!(
        event,
        PeerEvent::Disconnected(peer, CloseReason::Timeout) if *peer == server_handle
    )));
    assert!(server_events
        .iter()
        .any(|event| matches!(event, PeerEvent::Disconnected(_, CloseReason::Timeout))));
    assert_eq!(client.connection_state(server_handle), None);
}

#[test]
fn orderly_disconnect_notifies_both_sides() {
    init_logs();
    let (mut server, mut client, server_handle, mut now, _hub) =
        pair_with_config(8020, 8021, ConnectionConfig::default());

    client.disconnect(server_handle, now);
    let (client_events, server_events) =
        run_ticks(&mut client, &mut server, &mut now, 10, STEP);

    assert!(client_events.iter().any(|event| matches!(
        event,
        PeerEvent::Disconnected(peer, CloseReason::LocalDisconnect) if *peer == server_handle
    )));
    assert!(server_events.iter().any(|event| matches!(
        event,
        PeerEvent::Disconnected(_, CloseReason::DisconnectedByRemote)
    )));
}

#[test]
fn unacknowledged_reliable_delivery_tears_the_connection_down() {
    init_logs();
    let config = ConnectionConfig {
        // acks will never come back, so the reliable channel must give up
        // long before the generous traffic timeout
        timeout: Duration::from_secs(60),
        reliable: ReliableSettings {
            rtt_resend_factor: 1.0,
            backoff_cap_factor: 2,
            max_send_attempts: 4,
        },
        ..ConnectionConfig::default()
    };
    let (mut server, mut client, _handle, mut now, hub) =
        pair_with_config(8030, 8031, config);

    // sever the return path, then queue reliable traffic
    hub.block(addr(8031), addr(8030));
    server.spawn(Ship::new("unheard", 1, 0.0, 0)).unwrap();

    let (_, server_events) = run_ticks(&mut client, &mut server, &mut now, 100, STEP);

    assert!(server_events.iter().any(|event| matches!(
        event,
        PeerEvent::Disconnected(_, CloseReason::RetryExhausted(ChannelKind::ReliableOrdered))
    )));
}
