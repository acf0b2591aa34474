/// Ceiling on packets written per connection per tick. A connection with
/// more queued data than this carries the remainder into the next tick
/// rather than flooding the transport in one burst.
pub const MAX_PACKETS_PER_TICK: usize = 64;

/// How many sequence numbers behind the newest received packet a late
/// arrival may be before it is discarded as stale. Matches the width of the
/// ack bitfield: anything older can no longer be acknowledged.
pub const RECEIVE_WINDOW: u16 = 32;
