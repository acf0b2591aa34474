use std::{collections::VecDeque, time::Duration, time::Instant};

use replink_serde::{BitWrite, BitWriter, Serde, UnsignedVariableInteger};

use crate::{
    channels::{
        channel_kind::{ChannelKind, ReliableSettings},
        error::ChannelError,
        senders::channel_sender::ChannelSender,
        unit_bit_length,
    },
    types::UnitIndex,
};

struct OutgoingUnit {
    index: UnitIndex,
    payload: Vec<u8>,
    last_sent: Option<Instant>,
    attempts: u16,
    queued: bool,
}

/// Sender for both reliable channel kinds: every unit is retransmitted on
/// an exponential backoff schedule derived from the RTT estimate until the
/// remote acknowledges the packet that carried it, bounded by
/// `max_send_attempts`.
pub struct ReliableSender {
    kind: ChannelKind,
    settings: ReliableSettings,
    next_index: UnitIndex,
    unacked: VecDeque<OutgoingUnit>,
    outgoing: VecDeque<UnitIndex>,
}

impl ReliableSender {
    pub fn new(kind: ChannelKind, settings: ReliableSettings) -> Self {
        Self {
            kind,
            settings,
            next_index: 0,
            unacked: VecDeque::new(),
            outgoing: VecDeque::new(),
        }
    }

    /// The wait before retransmission number `attempts`: the base interval
    /// (a factor of the current RTT), doubled per attempt, capped.
    fn resend_interval(&self, attempts: u16, rtt_millis: f32) -> Duration {
        let base_millis = (self.settings.rtt_resend_factor * rtt_millis).max(10.0);
        let exponent = u32::from(attempts.saturating_sub(1));
        let factor = (1u32 << exponent.min(31)).min(self.settings.backoff_cap_factor);
        Duration::from_millis((base_millis * factor as f32) as u64)
    }

    fn unit_position(&self, index: UnitIndex) -> Option<usize> {
        self.unacked.iter().position(|unit| unit.index == index)
    }
}

impl ChannelSender for ReliableSender {
    fn send_unit(&mut self, payload: Vec<u8>) -> UnitIndex {
        let index = self.next_index;
        self.next_index = self.next_index.wrapping_add(1);
        self.unacked.push_back(OutgoingUnit {
            index,
            payload,
            last_sent: None,
            attempts: 0,
            queued: true,
        });
        self.outgoing.push_back(index);
        index
    }

    fn collect_resends(&mut self, now: Instant, rtt_millis: f32) -> Result<(), ChannelError> {
        for position in 0..self.unacked.len() {
            let (due, exhausted) = {
                let unit = &self.unacked[position];
                if unit.queued {
                    continue;
                }
                let Some(last_sent) = unit.last_sent else {
                    continue;
                };
                let interval = self.resend_interval(unit.attempts, rtt_millis);
                let due = now.saturating_duration_since(last_sent) >= interval;
                (due, due && unit.attempts >= self.settings.max_send_attempts)
            };

            if exhausted {
                let unit = &self.unacked[position];
                return Err(ChannelError::RetryExhausted {
                    kind: self.kind,
                    unit: unit.index,
                    attempts: unit.attempts,
                });
            }
            if due {
                let unit = &mut self.unacked[position];
                unit.queued = true;
                self.outgoing.push_back(unit.index);
            }
        }
        Ok(())
    }

    fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn has_unacked(&self) -> bool {
        !self.unacked.is_empty()
    }

    fn write_units(&mut self, writer: &mut BitWriter, now: Instant) -> Vec<UnitIndex> {
        let mut written = Vec::new();

        while let Some(index) = self.outgoing.front().copied() {
            let Some(position) = self.unit_position(index) else {
                // acknowledged while waiting in the queue
                self.outgoing.pop_front();
                continue;
            };

            let bits = unit_bit_length(&self.unacked[position].payload);
            let mut counter = writer.counter();
            counter.count_bits(bits);
            if counter.overflowed() {
                break;
            }

            let unit = &mut self.unacked[position];
            true.ser(writer);
            unit.index.ser(writer);
            UnsignedVariableInteger::<7>::new(unit.payload.len() as u64).ser(writer);
            for byte in &unit.payload {
                byte.ser(writer);
            }
            unit.last_sent = Some(now);
            unit.attempts += 1;
            unit.queued = false;

            self.outgoing.pop_front();
            written.push(index);
        }

        written
    }

    fn notify_unit_delivered(&mut self, unit: UnitIndex) {
        if let Some(position) = self.unit_position(unit) {
            self.unacked.remove(position);
        }
    }
}
