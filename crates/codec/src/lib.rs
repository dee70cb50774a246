//! Wire codec for the message envelope.
//!
//! The envelope is a protobuf-style tag-length-value encoding so that peers
//! running older or newer schema versions can skip fields they do not know:
//!
//! | field           | number | wire type               |
//! |-----------------|--------|-------------------------|
//! | `payload`       | 1      | length-delimited        |
//! | `content_topic` | 2      | length-delimited, UTF-8 |
//! | `version`       | 3      | varint                  |
//! | `timestamp`     | 4      | varint, zigzag          |
//!
//! Unknown fields are skipped on decode and are not preserved through
//! re-encoding; `decode(encode(m)) == m` holds for every well-formed message.

use bytes::{Buf, BufMut};
use murmur_primitives::Message;
use thiserror::Error;

mod varint;

use varint::{get_uvarint, put_uvarint, zigzag_decode, zigzag_encode};

const PAYLOAD_FIELD: u64 = 1;
const CONTENT_TOPIC_FIELD: u64 = 2;
const VERSION_FIELD: u64 = 3;
const TIMESTAMP_FIELD: u64 = 4;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("message has an empty content topic")]
    EmptyContentTopic,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input ends mid-field")]
    Truncated,
    #[error("malformed varint")]
    Varint,
    #[error("content topic is not valid UTF-8")]
    Utf8,
    #[error("unsupported wire type {0}")]
    WireType(u64),
    #[error("mandatory field missing: {0}")]
    MissingField(&'static str),
}

/// Encodes a message into its self-delimiting envelope form.
///
/// `payload`, `content_topic` and `version` are always emitted, `timestamp`
/// only when present.
pub fn encode(message: &Message) -> Result<Vec<u8>, EncodeError> {
    if !message.is_well_formed() {
        return Err(EncodeError::EmptyContentTopic);
    }

    let mut buf = Vec::with_capacity(
        message.payload.len() + message.content_topic.len() + 4 * MAX_KEY_OVERHEAD,
    );

    put_uvarint(&mut buf, key(PAYLOAD_FIELD, WIRE_LEN));
    put_uvarint(&mut buf, message.payload.len() as u64);
    buf.put_slice(&message.payload);

    put_uvarint(&mut buf, key(CONTENT_TOPIC_FIELD, WIRE_LEN));
    put_uvarint(&mut buf, message.content_topic.len() as u64);
    buf.put_slice(message.content_topic.as_bytes());

    put_uvarint(&mut buf, key(VERSION_FIELD, WIRE_VARINT));
    put_uvarint(&mut buf, u64::from(message.version));

    if let Some(timestamp) = message.timestamp {
        put_uvarint(&mut buf, key(TIMESTAMP_FIELD, WIRE_VARINT));
        put_uvarint(&mut buf, zigzag_encode(timestamp));
    }

    Ok(buf)
}

/// Decodes an envelope back into a [`Message`].
///
/// Fails on truncated or ill-formed input and when `payload` or
/// `content_topic` is absent; never yields a partially populated message.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let mut buf = bytes;

    let mut payload = None;
    let mut content_topic = None;
    let mut version = 0;
    let mut timestamp = None;

    while buf.has_remaining() {
        let field_key = get_uvarint(&mut buf)?;
        let (field, wire_type) = (field_key >> 3, field_key & 0x7);

        match (field, wire_type) {
            (PAYLOAD_FIELD, WIRE_LEN) => payload = Some(get_bytes(&mut buf)?),
            (CONTENT_TOPIC_FIELD, WIRE_LEN) => {
                let raw = get_bytes(&mut buf)?;
                content_topic = Some(String::from_utf8(raw).map_err(|_| DecodeError::Utf8)?);
            }
            (VERSION_FIELD, WIRE_VARINT) => {
                version = u32::try_from(get_uvarint(&mut buf)?).map_err(|_| DecodeError::Varint)?;
            }
            (TIMESTAMP_FIELD, WIRE_VARINT) => {
                timestamp = Some(zigzag_decode(get_uvarint(&mut buf)?));
            }
            _ => skip_field(&mut buf, wire_type)?,
        }
    }

    let payload = payload.ok_or(DecodeError::MissingField("payload"))?;
    let content_topic = content_topic
        .filter(|topic| !topic.is_empty())
        .ok_or(DecodeError::MissingField("content_topic"))?;

    Ok(Message {
        payload,
        content_topic,
        version,
        timestamp,
    })
}

const MAX_KEY_OVERHEAD: usize = 11;

const fn key(field: u64, wire_type: u64) -> u64 {
    field << 3 | wire_type
}

fn get_bytes(buf: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    let len = usize::try_from(get_uvarint(buf)?).map_err(|_| DecodeError::Truncated)?;
    if buf.remaining() < len {
        return Err(DecodeError::Truncated);
    }
    let mut bytes = vec![0; len];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

fn skip_field(buf: &mut &[u8], wire_type: u64) -> Result<(), DecodeError> {
    match wire_type {
        WIRE_VARINT => {
            let _skipped = get_uvarint(buf)?;
        }
        WIRE_FIXED64 => advance(buf, 8)?,
        WIRE_LEN => {
            let len = usize::try_from(get_uvarint(buf)?).map_err(|_| DecodeError::Truncated)?;
            advance(buf, len)?;
        }
        WIRE_FIXED32 => advance(buf, 4)?,
        other => return Err(DecodeError::WireType(other)),
    }
    Ok(())
}

fn advance(buf: &mut &[u8], len: usize) -> Result<(), DecodeError> {
    if buf.remaining() < len {
        return Err(DecodeError::Truncated);
    }
    buf.advance(len);
    Ok(())
}
