use std::time::{Duration, Instant};

/// A repeating interval timer driven by the caller's clock. The processing
/// loop advances all timers once per tick with the tick's `now`, rather
/// than sampling the clock per packet.
pub struct Timer {
    duration: Duration,
    last: Instant,
    manual_ring: bool,
}

impl Timer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last: Instant::now(),
            manual_ring: false,
        }
    }

    /// Whether the interval has elapsed since the last reset.
    pub fn ringing(&self, now: Instant) -> bool {
        self.manual_ring || now.saturating_duration_since(self.last) >= self.duration
    }

    /// Force the timer into the ringing state ahead of its interval.
    pub fn ring_manual(&mut self) {
        self.manual_ring = true;
    }

    pub fn reset(&mut self, now: Instant) {
        self.manual_ring = false;
        self.last = now;
    }
}
