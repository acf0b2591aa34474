use std::time::Duration;

use crate::channels::channel_kind::ReliableSettings;

/// Tunables governing one connection's timers and delivery behavior. The
/// retry/backoff schedule and keep-alive cadence are deployment decisions,
/// so everything here is explicit configuration with conservative defaults
/// rather than hard-coded constants.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Emit a keep-alive packet when nothing has been sent for this long,
    /// so the remote keeps receiving acks and RTT stays measurable.
    /// A fraction of `timeout`.
    pub heartbeat_interval: Duration,
    /// Tear the connection down when nothing at all has been received for
    /// this long.
    pub timeout: Duration,
    /// Cadence of ping probes used to maintain the RTT estimate.
    pub ping_interval: Duration,
    /// RTT assumed before the first pong arrives, in milliseconds.
    pub rtt_initial_estimate_millis: f32,
    /// Weight of each new RTT sample in the running average.
    pub rtt_smoothing_factor: f32,
    /// How often an unanswered handshake packet is re-sent.
    pub handshake_resend_interval: Duration,
    /// Handshake packets sent before the attempt is abandoned.
    pub handshake_max_attempts: u16,
    /// How long a Disconnecting connection keeps flushing outstanding
    /// reliable sends before abandoning them.
    pub disconnect_grace_period: Duration,
    /// Disconnect notices sent (best effort) during orderly teardown.
    pub disconnect_notice_count: u8,
    /// Retransmission schedule for the reliable channels.
    pub reliable: ReliableSettings,
    /// Ticks an RPC call for a not-yet-seen instance stays parked before
    /// it is dropped with a diagnostic.
    pub waitlist_ticks: u16,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(1),
            rtt_initial_estimate_millis: 200.0,
            rtt_smoothing_factor: 0.1,
            handshake_resend_interval: Duration::from_secs(1),
            handshake_max_attempts: 10,
            disconnect_grace_period: Duration::from_secs(2),
            disconnect_notice_count: 3,
            reliable: ReliableSettings::default(),
            waitlist_ticks: 30,
        }
    }
}
