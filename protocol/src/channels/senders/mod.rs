pub mod channel_sender;
pub mod reliable_sender;
pub mod unreliable_sender;
