use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::{SystemTime, UNIX_EPOCH};

use murmur_primitives::{Digest, Message};
use parking_lot::RwLock;

use crate::{ArchiveEntry, ArchiveFilter, ArchiveKey, ArchivePage, Direction, MessageArchive};

/// Entries examined per lock acquisition during a page scan.
const SCAN_CHUNK: usize = 256;

/// In-memory archive.
///
/// Appends take the write lock. Page scans take the read lock in bounded
/// chunks, resuming from the last examined key between acquisitions, so a
/// selective filter over a large archive never holds the lock for a full
/// scan and appends interleave freely. Entries appended after a scan began
/// are excluded from its results. Retention is left to the owner: entries
/// are only ever appended.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<ArchiveKey, ArchiveEntry>,
    last_timestamp: i64,
}

impl MemoryArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Appends with an explicit receiver timestamp. The monotonic bump still
    /// applies, so out-of-order timestamps collapse into arrival order.
    pub fn append_at(
        &self,
        pubsub_topic: &str,
        message: Message,
        digest: Digest,
        receiver_timestamp: i64,
    ) -> ArchiveKey {
        let mut inner = self.inner.write();

        let receiver_timestamp = receiver_timestamp.max(inner.last_timestamp + 1);
        inner.last_timestamp = receiver_timestamp;

        let key = ArchiveKey {
            receiver_timestamp,
            digest,
        };

        let entry = ArchiveEntry {
            pubsub_topic: pubsub_topic.to_owned(),
            message,
            key,
        };

        let _evicted = inner.entries.insert(key, entry);

        key
    }
}

impl MessageArchive for MemoryArchive {
    fn append(&self, pubsub_topic: &str, message: Message, digest: Digest) -> ArchiveKey {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos() as i64);

        self.append_at(pubsub_topic, message, digest, now)
    }

    fn page(
        &self,
        filter: &ArchiveFilter,
        cursor: Option<ArchiveKey>,
        direction: Direction,
        limit: usize,
    ) -> ArchivePage {
        let mut entries = Vec::new();
        let mut has_more = false;

        let mut resume = cursor;
        // Fixed on the first acquisition; timestamps past it belong to
        // appends that raced the scan.
        let mut scan_end = None;

        loop {
            let inner = self.inner.read();
            let scan_end = *scan_end.get_or_insert(inner.last_timestamp);

            let bound = resume.map_or(Bound::Unbounded, Bound::Excluded);
            let chunk: Box<dyn Iterator<Item = (&ArchiveKey, &ArchiveEntry)>> = match direction {
                Direction::Forward => Box::new(inner.entries.range((bound, Bound::Unbounded))),
                Direction::Backward => {
                    Box::new(inner.entries.range((Bound::Unbounded, bound)).rev())
                }
            };

            let mut examined = 0;
            let mut suspended = false;

            for (key, entry) in chunk {
                if examined == SCAN_CHUNK {
                    // Lock hold stays bounded; the scan resumes from the
                    // last examined key under a fresh acquisition.
                    suspended = true;
                    break;
                }

                if key.receiver_timestamp > scan_end {
                    break;
                }

                examined += 1;
                resume = Some(*key);

                if filter.matches(entry) {
                    if entries.len() == limit {
                        has_more = true;
                        break;
                    }

                    entries.push(entry.clone());
                }
            }

            if !suspended {
                break;
            }
        }

        if direction == Direction::Backward {
            // Collected newest-first; pages are always ascending.
            entries.reverse();
        }

        ArchivePage { entries, has_more }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(archive: &MemoryArchive, count: i64) -> Vec<ArchiveKey> {
        (1..=count)
            .map(|ts| {
                let message = Message::from_utf8(&format!("msg-{ts}"), "/app/1");
                let digest = Digest::of(format!("msg-{ts}").as_bytes());
                archive.append_at("/test/topic", message, digest, ts)
            })
            .collect()
    }

    #[test]
    fn receiver_timestamps_are_strictly_monotonic() {
        let archive = MemoryArchive::new();
        let message = Message::from_utf8("a", "/app/1");

        let first = archive.append_at("/t", message.clone(), Digest::of(b"a"), 100);
        let second = archive.append_at("/t", message.clone(), Digest::of(b"b"), 100);
        let third = archive.append_at("/t", message, Digest::of(b"c"), 50);

        assert_eq!(first.receiver_timestamp, 100);
        assert_eq!(second.receiver_timestamp, 101);
        assert_eq!(third.receiver_timestamp, 102);
    }

    #[test]
    fn forward_paging_from_the_start() {
        let archive = MemoryArchive::new();
        let keys = seed(&archive, 5);

        let page = archive.page(&ArchiveFilter::default(), None, Direction::Forward, 2);

        assert_eq!(
            page.entries.iter().map(|e| e.key).collect::<Vec<_>>(),
            keys[..2]
        );
        assert!(page.has_more);

        let next = archive.page(
            &ArchiveFilter::default(),
            Some(keys[1]),
            Direction::Forward,
            2,
        );
        assert_eq!(
            next.entries.iter().map(|e| e.key).collect::<Vec<_>>(),
            keys[2..4]
        );
        assert!(next.has_more);

        let last = archive.page(
            &ArchiveFilter::default(),
            Some(keys[3]),
            Direction::Forward,
            2,
        );
        assert_eq!(
            last.entries.iter().map(|e| e.key).collect::<Vec<_>>(),
            keys[4..]
        );
        assert!(!last.has_more);
    }

    #[test]
    fn backward_pages_are_ascending() {
        let archive = MemoryArchive::new();
        let keys = seed(&archive, 5);

        let page = archive.page(&ArchiveFilter::default(), None, Direction::Backward, 2);
        assert_eq!(
            page.entries.iter().map(|e| e.key).collect::<Vec<_>>(),
            keys[3..]
        );
        assert!(page.has_more);

        let previous = archive.page(
            &ArchiveFilter::default(),
            Some(keys[3]),
            Direction::Backward,
            2,
        );
        assert_eq!(
            previous.entries.iter().map(|e| e.key).collect::<Vec<_>>(),
            keys[1..3]
        );
        assert!(previous.has_more);
    }

    #[test]
    fn filters_apply_before_paging() {
        let archive = MemoryArchive::new();

        for ts in 1..=6_i64 {
            let topic = if ts % 2 == 0 { "/app/even" } else { "/app/odd" };
            let message = Message::from_utf8(&format!("msg-{ts}"), topic);
            archive.append_at("/test/topic", message, Digest::of(&ts.to_le_bytes()), ts);
        }

        let filter = ArchiveFilter {
            content_topics: vec!["/app/even".to_owned()],
            ..ArchiveFilter::default()
        };

        let page = archive.page(&filter, None, Direction::Forward, 2);
        assert_eq!(
            page.entries
                .iter()
                .map(|e| e.key.receiver_timestamp)
                .collect::<Vec<_>>(),
            vec![2, 4]
        );
        assert!(page.has_more);
    }

    #[test]
    fn time_range_is_half_open() {
        let archive = MemoryArchive::new();
        let _keys = seed(&archive, 5);

        let filter = ArchiveFilter {
            start_time: Some(2),
            end_time: Some(4),
            ..ArchiveFilter::default()
        };

        let page = archive.page(&filter, None, Direction::Forward, 10);
        assert_eq!(
            page.entries
                .iter()
                .map(|e| e.key.receiver_timestamp)
                .collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert!(!page.has_more);
    }

    #[test]
    fn selective_filter_scans_past_chunk_boundaries() {
        let archive = MemoryArchive::new();
        let total = 3 * SCAN_CHUNK as i64 + 17;

        for ts in 1..=total {
            let topic = if ts % 300 == 0 { "/app/rare" } else { "/app/common" };
            let message = Message::from_utf8(&format!("msg-{ts}"), topic);
            let _key = archive.append_at("/test/topic", message, Digest::of(&ts.to_le_bytes()), ts);
        }

        let filter = ArchiveFilter {
            content_topics: vec!["/app/rare".to_owned()],
            ..ArchiveFilter::default()
        };

        let page = archive.page(&filter, None, Direction::Forward, 1);
        assert_eq!(
            page.entries
                .iter()
                .map(|e| e.key.receiver_timestamp)
                .collect::<Vec<_>>(),
            vec![300]
        );
        assert!(page.has_more);

        let next = archive.page(&filter, Some(page.entries[0].key), Direction::Forward, 1);
        assert_eq!(next.entries[0].key.receiver_timestamp, 600);
        assert!(!next.has_more);
    }

    #[test]
    fn filter_without_matches_returns_an_empty_page() {
        let archive = MemoryArchive::new();

        for ts in 1..=2 * SCAN_CHUNK as i64 {
            let message = Message::from_utf8(&format!("msg-{ts}"), "/app/common");
            let _key = archive.append_at("/test/topic", message, Digest::of(&ts.to_le_bytes()), ts);
        }

        let filter = ArchiveFilter {
            content_topics: vec!["/app/absent".to_owned()],
            ..ArchiveFilter::default()
        };

        for direction in [Direction::Forward, Direction::Backward] {
            let page = archive.page(&filter, None, direction, 10);
            assert!(page.entries.is_empty());
            assert!(!page.has_more);
        }
    }

    #[test]
    fn pubsub_topic_filter() {
        let archive = MemoryArchive::new();
        let message = Message::from_utf8("a", "/app/1");

        let _key = archive.append_at("/topic/a", message.clone(), Digest::of(b"a"), 1);
        let _key = archive.append_at("/topic/b", message, Digest::of(b"b"), 2);

        let filter = ArchiveFilter {
            pubsub_topic: Some("/topic/b".to_owned()),
            ..ArchiveFilter::default()
        };

        let page = archive.page(&filter, None, Direction::Forward, 10);
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].pubsub_topic, "/topic/b");
    }
}
