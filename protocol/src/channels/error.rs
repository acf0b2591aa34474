use thiserror::Error;

use crate::{channels::channel_kind::ChannelKind, types::UnitIndex};

/// Errors raised by channel senders. Retry exhaustion is fatal for the
/// owning connection: reliable delivery is a hard guarantee for the
/// connection's lifetime, so failing it escalates to teardown rather than
/// silently dropping the unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    #[error("unit {unit} on {kind:?} channel exhausted its {attempts} send attempts without acknowledgment")]
    RetryExhausted {
        kind: ChannelKind,
        unit: UnitIndex,
        attempts: u16,
    },

    #[error("unit of {bits} bits cannot fit a single packet ({capacity} bits available); callers must pre-chunk")]
    UnitTooLarge { bits: u32, capacity: u32 },
}
