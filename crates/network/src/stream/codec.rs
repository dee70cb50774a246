use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// One length-delimited unit on a protocol stream. The contents are opaque
/// at this layer; the protocol on top decides how to interpret them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub data: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub const fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[derive(Debug, Error)]
#[error("CodecError")]
pub enum CodecError {
    StdIo(#[from] std::io::Error),
}

#[derive(Debug)]
pub struct FrameCodec {
    length_codec: LengthDelimitedCodec,
}

impl FrameCodec {
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            length_codec: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_length)
                .new_codec(),
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = self.length_codec.decode(src)? else {
            return Ok(None);
        };

        Ok(Some(Frame::new(frame.to_vec())))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.length_codec
            .encode(Bytes::from(item.data), dst)
            .map_err(CodecError::StdIo)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio_test::io::Builder;
    use tokio_util::codec::FramedRead;

    use super::*;

    #[test]
    fn frame_encoding_decoding() {
        let request = Frame::new("Hello".bytes().collect());
        let response = Frame::new("World".bytes().collect());

        let mut buffer = BytesMut::new();
        let mut codec = FrameCodec::new(crate::stream::MAX_FRAME_SIZE);
        codec.encode(request.clone(), &mut buffer).unwrap();
        codec.encode(response.clone(), &mut buffer).unwrap();

        let decoded_request = codec.decode(&mut buffer).unwrap();
        assert_eq!(decoded_request, Some(request));

        let decoded_response = codec.decode(&mut buffer).unwrap();
        assert_eq!(decoded_response, Some(response));
    }

    #[tokio::test]
    async fn multiple_frames_on_one_stream() {
        let request = Frame::new("Hello".bytes().collect());
        let response = Frame::new("World".bytes().collect());

        let mut buffer = BytesMut::new();
        let mut codec = FrameCodec::new(crate::stream::MAX_FRAME_SIZE);
        codec.encode(request.clone(), &mut buffer).unwrap();
        codec.encode(response.clone(), &mut buffer).unwrap();

        let mut stream = Builder::new().read(&buffer.freeze()).build();
        let mut framed =
            FramedRead::new(&mut stream, FrameCodec::new(crate::stream::MAX_FRAME_SIZE));

        let decoded_request = framed.next().await.unwrap().unwrap();
        assert_eq!(decoded_request, request);

        let decoded_response = framed.next().await.unwrap().unwrap();
        assert_eq!(decoded_response, response);

        assert!(framed.next().await.is_none());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut buffer = BytesMut::new();
        let mut big = FrameCodec::new(crate::stream::MAX_FRAME_SIZE);
        big.encode(Frame::new(vec![0; 32]), &mut buffer).unwrap();

        let mut small = FrameCodec::new(16);
        assert!(small.decode(&mut buffer).is_err());
    }
}
