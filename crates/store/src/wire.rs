//! On-the-wire shapes of the store protocol.
//!
//! One query frame yields exactly one response frame. The envelope bytes
//! inside an entry are the same bytes the relay saw, so a response can be
//! verified against the digest it carries.

use borsh::{BorshDeserialize, BorshSerialize};
use murmur_archive::{ArchiveKey, Direction};
use murmur_primitives::Digest;

/// Response succeeded.
pub const ERROR_NONE: u32 = 0;
/// The cursor does not name a valid archive position.
pub const ERROR_INVALID_CURSOR: u32 = 1;
/// The query itself could not be honored.
pub const ERROR_BAD_REQUEST: u32 = 2;

/// Opaque resume point, echoing the canonical archive key.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Cursor {
    pub receiver_timestamp: i64,
    /// 32-byte envelope digest; validated by the serving side.
    pub digest: Vec<u8>,
}

impl From<ArchiveKey> for Cursor {
    fn from(key: ArchiveKey) -> Self {
        Self {
            receiver_timestamp: key.receiver_timestamp,
            digest: key.digest.as_bytes().to_vec(),
        }
    }
}

impl TryFrom<&Cursor> for ArchiveKey {
    type Error = murmur_primitives::InvalidDigest;

    fn try_from(cursor: &Cursor) -> Result<Self, Self::Error> {
        Ok(Self {
            receiver_timestamp: cursor.receiver_timestamp,
            digest: Digest::try_from(&*cursor.digest)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Query {
    /// Caller-chosen id echoed verbatim in the response.
    pub request_id: u64,
    pub pubsub_topic: Option<String>,
    /// OR-matched; empty matches every content topic.
    pub content_topics: Vec<String>,
    /// Half-open `[start_time, end_time)` over the receiver timestamp.
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    /// Zero asks for the server default.
    pub page_size: u32,
    pub direction: Direction,
    pub cursor: Option<Cursor>,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct WireEntry {
    pub pubsub_topic: String,
    pub receiver_timestamp: i64,
    pub digest: Vec<u8>,
    /// Encoded envelope, byte-identical to what the relay received.
    pub envelope: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Response {
    pub request_id: u64,
    /// Ascending canonical order regardless of paging direction.
    pub entries: Vec<WireEntry>,
    /// Resume point for the next page, absent when the page was empty.
    pub cursor: Option<Cursor>,
    pub has_more: bool,
    pub error_code: u32,
}

impl Response {
    #[must_use]
    pub fn failed(request_id: u64, error_code: u32) -> Self {
        Self {
            request_id,
            error_code,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_echoes_the_archive_key() {
        let key = ArchiveKey {
            receiver_timestamp: 42,
            digest: Digest::of(b"hello"),
        };

        let cursor = Cursor::from(key);
        assert_eq!(ArchiveKey::try_from(&cursor).unwrap(), key);
    }

    #[test]
    fn short_cursor_digest_is_rejected() {
        let cursor = Cursor {
            receiver_timestamp: 42,
            digest: vec![0xab; 16],
        };

        assert!(ArchiveKey::try_from(&cursor).is_err());
    }

    #[test]
    fn query_round_trips_through_borsh() {
        let query = Query {
            request_id: 7,
            pubsub_topic: Some("/topic".to_owned()),
            content_topics: vec!["/app/1".to_owned()],
            start_time: Some(1),
            end_time: None,
            page_size: 10,
            direction: Direction::Backward,
            cursor: Some(Cursor {
                receiver_timestamp: 42,
                digest: Digest::of(b"hello").as_bytes().to_vec(),
            }),
        };

        let bytes = borsh::to_vec(&query).unwrap();
        assert_eq!(borsh::from_slice::<Query>(&bytes).unwrap(), query);
    }
}
