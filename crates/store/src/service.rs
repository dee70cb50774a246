//! Serving side of the store protocol.
//!
//! [`serve`] owns one inbound stream for its lifetime and answers query
//! frames strictly in order, so a pipelining client can match responses by
//! position as well as by request id. Query resolution itself is a pure
//! function over an archive snapshot.

use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use murmur_archive::{ArchiveFilter, ArchiveKey, Direction, MessageArchive};
use murmur_network::{CodecError, Frame};
use tracing::{debug, error};

use crate::wire::{Cursor, Query, Response, WireEntry, ERROR_BAD_REQUEST, ERROR_INVALID_CURSOR};

/// Page size applied when a query asks for zero.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Hard page size cap; larger requests are clamped, not rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Resolves one query against the archive.
///
/// Failures are reported in-band via `error_code`; a failed query never
/// mutates the archive and never tears down the stream.
#[must_use]
pub fn resolve(archive: &dyn MessageArchive, query: &Query) -> Response {
    let cursor = match &query.cursor {
        Some(cursor) => match ArchiveKey::try_from(cursor) {
            Ok(key) => Some(key),
            Err(err) => {
                debug!(request_id = query.request_id, %err, "Rejecting query cursor");
                return Response::failed(query.request_id, ERROR_INVALID_CURSOR);
            }
        },
        None => None,
    };

    let filter = ArchiveFilter {
        content_topics: query.content_topics.clone(),
        pubsub_topic: query.pubsub_topic.clone(),
        start_time: query.start_time,
        end_time: query.end_time,
    };

    let page_size = match query.page_size {
        0 => DEFAULT_PAGE_SIZE,
        requested => requested.min(MAX_PAGE_SIZE),
    };

    let page = archive.page(&filter, cursor, query.direction, page_size as usize);

    let next_cursor = match query.direction {
        Direction::Forward => page.entries.last(),
        Direction::Backward => page.entries.first(),
    }
    .map(|entry| Cursor::from(entry.key));

    let entries = page
        .entries
        .into_iter()
        .filter_map(|entry| {
            // Archived messages passed validation on the way in, so encoding
            // them back cannot fail short of archive corruption.
            let envelope = murmur_codec::encode(&entry.message).ok()?;
            Some(WireEntry {
                pubsub_topic: entry.pubsub_topic,
                receiver_timestamp: entry.key.receiver_timestamp,
                digest: entry.key.digest.as_bytes().to_vec(),
                envelope,
            })
        })
        .collect();

    Response {
        request_id: query.request_id,
        entries,
        cursor: next_cursor,
        has_more: page.has_more,
        error_code: 0,
    }
}

/// Answers queries on one stream until the peer hangs up or the stream fails.
pub async fn serve<S>(mut stream: S, archive: Arc<dyn MessageArchive>)
where
    S: Sink<Frame, Error = CodecError> + Stream<Item = Result<Frame, CodecError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                debug!(%err, "Store stream failed");
                break;
            }
        };

        let response = match borsh::from_slice::<Query>(&frame.data) {
            Ok(query) => resolve(&*archive, &query),
            Err(err) => {
                debug!(%err, "Rejecting undecodable store query");
                Response::failed(0, ERROR_BAD_REQUEST)
            }
        };

        let data = match borsh::to_vec(&response) {
            Ok(data) => data,
            Err(err) => {
                error!(%err, "Failed to encode store response");
                break;
            }
        };

        if let Err(err) = stream.send(Frame::new(data)).await {
            debug!(%err, "Failed to send store response");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use murmur_archive::MemoryArchive;
    use murmur_primitives::{Digest, Message};

    use super::*;

    fn seeded(count: i64) -> MemoryArchive {
        let archive = MemoryArchive::new();
        for ts in 1..=count {
            let message = Message::from_utf8(&format!("msg-{ts}"), "/app/1");
            let digest = Digest::of(&murmur_codec::encode(&message).unwrap());
            let _key = archive.append_at("/test/topic", message, digest, ts);
        }
        archive
    }

    fn query(page_size: u32, direction: Direction, cursor: Option<Cursor>) -> Query {
        Query {
            request_id: 1,
            page_size,
            direction,
            cursor,
            ..Query::default()
        }
    }

    fn timestamps(response: &Response) -> Vec<i64> {
        response
            .entries
            .iter()
            .map(|entry| entry.receiver_timestamp)
            .collect()
    }

    #[test]
    fn forward_pages_walk_the_whole_archive() {
        let archive = seeded(5);

        let first = resolve(&archive, &query(2, Direction::Forward, None));
        assert_eq!(timestamps(&first), vec![1, 2]);
        assert!(first.has_more);

        let second = resolve(&archive, &query(2, Direction::Forward, first.cursor));
        assert_eq!(timestamps(&second), vec![3, 4]);
        assert!(second.has_more);

        let third = resolve(&archive, &query(2, Direction::Forward, second.cursor));
        assert_eq!(timestamps(&third), vec![5]);
        assert!(!third.has_more);
    }

    #[test]
    fn backward_pages_walk_newest_to_oldest() {
        let archive = seeded(5);

        let first = resolve(&archive, &query(2, Direction::Backward, None));
        assert_eq!(timestamps(&first), vec![4, 5]);
        assert!(first.has_more);

        let second = resolve(&archive, &query(2, Direction::Backward, first.cursor));
        assert_eq!(timestamps(&second), vec![2, 3]);
        assert!(second.has_more);

        let third = resolve(&archive, &query(2, Direction::Backward, second.cursor));
        assert_eq!(timestamps(&third), vec![1]);
        assert!(!third.has_more);
    }

    #[test]
    fn cursors_are_shared_between_directions() {
        let archive = seeded(5);

        // A backward page's cursor names its oldest entry; resuming forward
        // from it continues strictly after that entry.
        let back = resolve(&archive, &query(2, Direction::Backward, None));
        assert_eq!(timestamps(&back), vec![4, 5]);

        let forward = resolve(&archive, &query(2, Direction::Forward, back.cursor));
        assert_eq!(timestamps(&forward), vec![5]);
        assert!(!forward.has_more);
    }

    #[test]
    fn zero_page_size_uses_the_default() {
        let archive = seeded(i64::from(DEFAULT_PAGE_SIZE) + 5);

        let response = resolve(&archive, &query(0, Direction::Forward, None));
        assert_eq!(response.entries.len(), DEFAULT_PAGE_SIZE as usize);
        assert!(response.has_more);
    }

    #[test]
    fn oversized_page_size_is_clamped() {
        let archive = seeded(i64::from(MAX_PAGE_SIZE) + 5);

        let response = resolve(&archive, &query(10_000, Direction::Forward, None));
        assert_eq!(response.entries.len(), MAX_PAGE_SIZE as usize);
        assert!(response.has_more);
    }

    #[test]
    fn invalid_cursor_fails_in_band() {
        let archive = seeded(3);
        let cursor = Cursor {
            receiver_timestamp: 1,
            digest: vec![0xab; 7],
        };

        let response = resolve(&archive, &query(2, Direction::Forward, Some(cursor)));
        assert_eq!(response.error_code, ERROR_INVALID_CURSOR);
        assert!(response.entries.is_empty());
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn empty_page_carries_no_cursor() {
        let archive = MemoryArchive::new();

        let response = resolve(&archive, &query(2, Direction::Forward, None));
        assert!(response.entries.is_empty());
        assert!(response.cursor.is_none());
        assert!(!response.has_more);
    }

    #[test]
    fn entries_round_trip_as_envelopes() {
        let archive = seeded(1);

        let response = resolve(&archive, &query(10, Direction::Forward, None));
        let entry = &response.entries[0];

        let message = murmur_codec::decode(&entry.envelope).unwrap();
        assert_eq!(message.payload, b"msg-1");
        assert_eq!(message.content_topic, "/app/1");
        assert_eq!(
            Digest::of(&entry.envelope).as_bytes().to_vec(),
            entry.digest,
            "wire digest is computed over the stored envelope bytes"
        );
    }
}
