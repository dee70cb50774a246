use borsh::{BorshDeserialize, BorshSerialize};

/// The application-level unit of relay.
///
/// `payload` and `content_topic` are required: a message with an empty
/// content topic is malformed and is never published, delivered or stored.
/// `version` is the envelope schema version; unknown versions still
/// round-trip payload and content topic.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Message {
    pub payload: Vec<u8>,
    pub content_topic: String,
    pub version: u32,
    pub timestamp: Option<i64>,
}

impl Message {
    #[must_use]
    pub fn new(payload: Vec<u8>, content_topic: impl Into<String>) -> Self {
        Self {
            payload,
            content_topic: content_topic.into(),
            version: 0,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn from_utf8(text: &str, content_topic: impl Into<String>) -> Self {
        Self::new(text.as_bytes().to_vec(), content_topic)
    }

    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.content_topic.is_empty()
    }
}
