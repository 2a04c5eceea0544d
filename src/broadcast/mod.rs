pub mod broadcaster;
pub mod channel_broadcaster;

pub use broadcaster::{topic_for, BroadcastError, BroadcastMessage, Broadcaster};
pub use channel_broadcaster::ChannelBroadcaster;
