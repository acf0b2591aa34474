use std::time::Instant;

use crate::{connection::connection_config::ConnectionConfig, timer::Timer};

pub type PingIndex = u16;

/// How many in-flight pings are remembered. Anything older has either been
/// answered or is long past its useful RTT sample window.
const SENT_PINGS_CAPACITY: usize = 16;

/// Maintains the round-trip-time estimate for one connection by sending
/// indexed pings on a timer and folding each pong's sample into a smoothed
/// running average. The estimate feeds the reliable channels' resend
/// schedule.
pub struct PingManager {
    ping_timer: Timer,
    next_ping_index: PingIndex,
    sent_pings: Vec<(PingIndex, Instant)>,
    rtt_average_millis: f32,
    smoothing_factor: f32,
}

impl PingManager {
    pub fn new(config: &ConnectionConfig) -> Self {
        Self {
            ping_timer: Timer::new(config.ping_interval),
            next_ping_index: 0,
            sent_pings: Vec::new(),
            rtt_average_millis: config.rtt_initial_estimate_millis,
            smoothing_factor: config.rtt_smoothing_factor,
        }
    }

    pub fn should_send_ping(&self, now: Instant) -> bool {
        self.ping_timer.ringing(now)
    }

    /// Record an outgoing ping and return the index to send.
    pub fn next_ping(&mut self, now: Instant) -> PingIndex {
        self.ping_timer.reset(now);
        let index = self.next_ping_index;
        self.next_ping_index = self.next_ping_index.wrapping_add(1);

        if self.sent_pings.len() == SENT_PINGS_CAPACITY {
            self.sent_pings.remove(0);
        }
        self.sent_pings.push((index, now));
        index
    }

    /// Fold the pong for `index` into the RTT average. Unknown indices
    /// (stale or duplicated pongs) are ignored.
    pub fn process_pong(&mut self, index: PingIndex, now: Instant) {
        let Some(position) = self.sent_pings.iter().position(|(sent, _)| *sent == index) else {
            return;
        };
        let (_, sent_at) = self.sent_pings.remove(position);

        let sample_millis = now.saturating_duration_since(sent_at).as_secs_f32() * 1000.0;
        self.rtt_average_millis = self.rtt_average_millis * (1.0 - self.smoothing_factor)
            + sample_millis * self.smoothing_factor;
    }

    pub fn rtt_millis(&self) -> f32 {
        self.rtt_average_millis
    }
}
