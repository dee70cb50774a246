use bytes::{Buf, BufMut};

use crate::DecodeError;

const MAX_VARINT_LEN: usize = 10;

pub fn put_uvarint(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

pub fn get_uvarint(buf: &mut impl Buf) -> Result<u64, DecodeError> {
    let mut value = 0_u64;
    for shift in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(DecodeError::Truncated);
        }
        let byte = buf.get_u8();
        if shift == MAX_VARINT_LEN - 1 && byte > 0x01 {
            return Err(DecodeError::Varint);
        }
        value |= u64::from(byte & 0x7f) << (shift * 7);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::Varint)
}

pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
