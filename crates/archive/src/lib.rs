//! Append-only, time-ordered log of relayed messages.
//!
//! The archive is a capability consumed by the relay (append) and the store
//! (paged reads). Entries are immutable once appended and ordered by the
//! canonical `(receiver_timestamp, digest)` key, which is also the store's
//! cursor key.

use std::fmt;

use borsh::{BorshDeserialize, BorshSerialize};
use murmur_primitives::{Digest, Message};

mod memory;

pub use memory::MemoryArchive;

/// Canonical sort and cursor key of an archived entry.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct ArchiveKey {
    /// Receiver-assigned arrival time, unix nanoseconds, strictly monotonic
    /// within one archive.
    pub receiver_timestamp: i64,
    pub digest: Digest,
}

/// A stored message plus receiver-observed metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub pubsub_topic: String,
    pub message: Message,
    pub key: ArchiveKey,
}

/// Paging direction over the canonical order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Predicates a paged read matches against; all present predicates must hold.
#[derive(Clone, Debug, Default)]
pub struct ArchiveFilter {
    /// OR-matched content topics; empty matches everything.
    pub content_topics: Vec<String>,
    pub pubsub_topic: Option<String>,
    /// Half-open `[start_time, end_time)` range over `receiver_timestamp`.
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

impl ArchiveFilter {
    #[must_use]
    pub fn matches(&self, entry: &ArchiveEntry) -> bool {
        if !self.content_topics.is_empty()
            && !self.content_topics.contains(&entry.message.content_topic)
        {
            return false;
        }

        if let Some(pubsub_topic) = &self.pubsub_topic {
            if *pubsub_topic != entry.pubsub_topic {
                return false;
            }
        }

        if let Some(start) = self.start_time {
            if entry.key.receiver_timestamp < start {
                return false;
            }
        }

        if let Some(end) = self.end_time {
            if entry.key.receiver_timestamp >= end {
                return false;
            }
        }

        true
    }
}

/// One page of matching entries, always in ascending canonical order.
#[derive(Clone, Debug, Default)]
pub struct ArchivePage {
    pub entries: Vec<ArchiveEntry>,
    pub has_more: bool,
}

/// The archive capability: append-only writes, paged snapshot reads.
pub trait MessageArchive: fmt::Debug + Send + Sync {
    /// Records a message, assigning its receiver timestamp.
    fn append(&self, pubsub_topic: &str, message: Message, digest: Digest) -> ArchiveKey;

    /// Returns up to `limit` matching entries strictly after (`Forward`) or
    /// strictly before (`Backward`) `cursor`, in ascending order either way.
    fn page(
        &self,
        filter: &ArchiveFilter,
        cursor: Option<ArchiveKey>,
        direction: Direction,
        limit: usize,
    ) -> ArchivePage;
}
