//! Querying side of the store protocol.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream as FuturesStream, StreamExt};
use libp2p::PeerId;
use murmur_archive::Direction;
use murmur_network::{CodecError, Frame, NetworkClient, MURMUR_STORE_PROTOCOL};
use murmur_primitives::Message;
use thiserror::Error;
use tokio::time::timeout;

use crate::wire::{Cursor, Query, Response, ERROR_BAD_REQUEST, ERROR_INVALID_CURSOR, ERROR_NONE};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// A history query as the caller phrases it; the request id and wire shape
/// are filled in per round trip.
#[derive(Clone, Debug, Default)]
pub struct HistoryQuery {
    pub pubsub_topic: Option<String>,
    pub content_topics: Vec<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    /// Zero defers to the serving node's default.
    pub page_size: u32,
    pub direction: Direction,
    pub cursor: Option<Cursor>,
}

/// One page of decoded history.
#[derive(Clone, Debug, Default)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub cursor: Option<Cursor>,
    pub has_more: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open a store stream: {0}")]
    Open(eyre::Report),
    #[error("store stream failed: {0}")]
    Stream(#[from] CodecError),
    #[error("malformed store frame: {0}")]
    Wire(#[from] std::io::Error),
    #[error("peer sent an undecodable envelope: {0}")]
    Envelope(#[from] murmur_codec::DecodeError),
    #[error("peer closed the store stream mid-query")]
    ClosedEarly,
    #[error("response does not echo the request id")]
    RequestMismatch,
    #[error("peer rejected the paging cursor")]
    InvalidCursor,
    #[error("peer rejected the query")]
    BadRequest,
    #[error("peer reported error code {0}")]
    Remote(u32),
    #[error("store query timed out")]
    Timeout,
}

/// Issues history queries to peers that serve the store protocol.
#[derive(Clone, Debug)]
pub struct StoreClient {
    network: NetworkClient,
    query_timeout: Duration,
}

impl StoreClient {
    #[must_use]
    pub const fn new(network: NetworkClient) -> Self {
        Self {
            network,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Fetches one page from `peer_id`.
    pub async fn query(
        &self,
        peer_id: PeerId,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, StoreError> {
        let mut stream = self
            .network
            .open_stream(peer_id, MURMUR_STORE_PROTOCOL)
            .await
            .map_err(StoreError::Open)?;

        exchange(&mut stream, query, self.query_timeout).await
    }

    /// Follows cursors until the peer reports no further pages, reusing one
    /// stream for the whole walk.
    pub async fn query_history(
        &self,
        peer_id: PeerId,
        query: &HistoryQuery,
    ) -> Result<Vec<Message>, StoreError> {
        let mut stream = self
            .network
            .open_stream(peer_id, MURMUR_STORE_PROTOCOL)
            .await
            .map_err(StoreError::Open)?;

        let mut query = query.clone();
        let mut messages = Vec::new();

        loop {
            let page = exchange(&mut stream, &query, self.query_timeout).await?;
            messages.extend(page.messages);

            if !page.has_more {
                break;
            }

            let Some(cursor) = page.cursor else { break };
            query.cursor = Some(cursor);
        }

        Ok(messages)
    }
}

/// One query round trip on an already-open stream.
pub async fn exchange<S>(
    stream: &mut S,
    query: &HistoryQuery,
    deadline: Duration,
) -> Result<HistoryPage, StoreError>
where
    S: Sink<Frame, Error = CodecError> + FuturesStream<Item = Result<Frame, CodecError>> + Unpin,
{
    let request_id = rand::random();

    let wire_query = Query {
        request_id,
        pubsub_topic: query.pubsub_topic.clone(),
        content_topics: query.content_topics.clone(),
        start_time: query.start_time,
        end_time: query.end_time,
        page_size: query.page_size,
        direction: query.direction,
        cursor: query.cursor.clone(),
    };

    let data = borsh::to_vec(&wire_query)?;

    let response = timeout(deadline, async {
        stream.send(Frame::new(data)).await?;

        let frame = stream.next().await.ok_or(StoreError::ClosedEarly)??;
        let response = borsh::from_slice::<Response>(&frame.data)?;

        Ok::<_, StoreError>(response)
    })
    .await
    .map_err(|_elapsed| StoreError::Timeout)??;

    // In-band rejections may not echo the id (the peer could not even
    // decode the query), so they keep their meaning over a mismatch.
    match response.error_code {
        ERROR_NONE => {}
        ERROR_INVALID_CURSOR => return Err(StoreError::InvalidCursor),
        ERROR_BAD_REQUEST => return Err(StoreError::BadRequest),
        code => return Err(StoreError::Remote(code)),
    }

    if response.request_id != request_id {
        return Err(StoreError::RequestMismatch);
    }

    // A page with an undecodable envelope is failed whole; callers never
    // see a silently thinned page.
    let messages = response
        .entries
        .iter()
        .map(|entry| murmur_codec::decode(&entry.envelope))
        .collect::<Result<_, _>>()?;

    Ok(HistoryPage {
        messages,
        cursor: response.cursor,
        has_more: response.has_more,
    })
}
