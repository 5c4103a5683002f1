//! Unsigned LEB128 variable-length integers.
//!
//! Each byte carries 7 payload bits, least-significant group first. The
//! high bit is set on every byte except the last. Zero is a single `0x00`.

use crate::error::DecodeError;

/// Longest valid encoding of a `u64` (ceil(64 / 7)).
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION: u8 = 0b1000_0000;
const PAYLOAD: u8 = 0b0111_1111;

/// Append the varint encoding of `value` to `out`.
pub fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value as u8) & PAYLOAD;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | CONTINUATION);
    }
}

/// Number of bytes `write_varint` would emit for `value`.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Read a varint starting at `*pos`, advancing `*pos` past it.
///
/// Fails with [`DecodeError::TruncatedBuffer`] if the continuation chain
/// runs off the end of `data`, and with [`DecodeError::VarintOverflow`]
/// if the value does not fit in 64 bits.
pub fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64, DecodeError> {
    let start = *pos;
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let Some(&byte) = data.get(*pos) else {
            return Err(DecodeError::TruncatedBuffer {
                offset: *pos,
                needed: 1,
                available: 0,
            });
        };
        *pos += 1;

        let payload = u64::from(byte & PAYLOAD);
        if shift == 63 && payload > 1 {
            return Err(DecodeError::VarintOverflow { offset: start });
        }
        result |= payload << shift;

        if byte & CONTINUATION == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 63 {
            return Err(DecodeError::VarintOverflow { offset: start });
        }
    }
}
