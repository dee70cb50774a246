pub mod digest;
pub mod message;
pub mod policy;

pub use digest::{Digest, InvalidDigest};
pub use message::Message;
pub use policy::{SignaturePolicy, UnknownPolicy};

/// The single well-known pubsub topic all nodes of this protocol version
/// share. Application channels are multiplexed over it via
/// [`Message::content_topic`].
pub const RELAY_TOPIC: &str = "/murmur/1/default-relay/proto";
