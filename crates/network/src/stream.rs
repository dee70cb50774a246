use core::pin::Pin;
use core::task::{Context, Poll};

use futures_util::{Sink as FuturesSink, SinkExt, Stream as FuturesStream, StreamExt};
use libp2p::{Stream as P2pStream, StreamProtocol};
use tokio::io::BufStream;
use tokio_util::codec::Framed;
use tokio_util::compat::{Compat, FuturesAsyncReadCompatExt};

mod codec;

pub use codec::{CodecError, Frame, FrameCodec};

pub const MAX_FRAME_SIZE: usize = 8 * 1_024 * 1_024;

/// Versioned identifier of the store protocol; peers negotiate capability on
/// this id before any query is exchanged.
pub const MURMUR_STORE_PROTOCOL: StreamProtocol = StreamProtocol::new("/murmur/store/1.0.0");

/// A framed bidirectional byte channel to one peer.
#[derive(Debug)]
pub struct Stream {
    inner: Framed<BufStream<Compat<P2pStream>>, FrameCodec>,
}

impl Stream {
    #[must_use]
    pub fn new(stream: P2pStream) -> Self {
        let stream = BufStream::new(stream.compat());
        let stream = Framed::new(stream, FrameCodec::new(MAX_FRAME_SIZE));
        Self { inner: stream }
    }
}

impl FuturesStream for Stream {
    type Item = Result<Frame, CodecError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl FuturesSink<Frame> for Stream {
    type Error = CodecError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready_unpin(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.inner.start_send_unpin(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_flush_unpin(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_close_unpin(cx)
    }
}
