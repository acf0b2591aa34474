pub mod channel_receiver;
pub mod ordered_reliable_receiver;
pub mod unordered_reliable_receiver;
pub mod unreliable_receiver;
