//! Cassandra VInt codec.
//!
//! The first byte's leading 1-bits give the number of trailing bytes; the
//! remaining bits of the first byte plus the trailing bytes, big-endian, form
//! an unsigned magnitude. Signed values layer ZigZag on top of that, so small
//! negative numbers stay short.

use nom::{
    bytes::complete::take,
    error::{Error as NomError, ErrorKind},
    IResult,
};

use crate::error::{Error, ErrorCode, Result};

/// Largest encoded form: all-ones first byte plus a full 8-byte magnitude.
pub const MAX_VINT_SIZE: usize = 9;

pub fn unsigned_vint(input: &[u8]) -> IResult<&[u8], u64> {
    let (rest, first) = take(1usize)(input)?;
    let first = first[0];
    let extra = first.leading_ones() as usize;

    if extra == 8 {
        // Boundary case: zero value bits in the first byte, the magnitude is
        // the following 8 bytes verbatim.
        let (rest, bytes) = take(8usize)(rest)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        return Ok((rest, u64::from_be_bytes(raw)));
    }

    let mask = if extra >= 7 { 0 } else { 0xFFu8 >> (extra + 1) };
    let mut magnitude = (first & mask) as u64;

    let (rest, bytes) = take(extra)(rest)?;
    for &byte in bytes {
        magnitude = (magnitude << 8) | byte as u64;
    }

    Ok((rest, magnitude))
}

pub fn signed_vint(input: &[u8]) -> IResult<&[u8], i64> {
    let (rest, magnitude) = unsigned_vint(input)?;
    Ok((rest, zigzag_decode(magnitude)))
}

/// Decode one signed VInt, returning the value and the number of bytes
/// consumed. Truncated input, where the declared length exceeds the available
/// bytes, fails with [`ErrorCode::MalformedVInt`].
pub fn decode_vint(input: &[u8]) -> Result<(i64, usize)> {
    let (rest, value) = signed_vint(input)
        .map_err(|_| Error::new(ErrorCode::MalformedVInt, "truncated or malformed vint"))?;
    Ok((value, input.len() - rest.len()))
}

pub fn encode_vint(value: i64) -> Vec<u8> {
    encode_unsigned_vint(zigzag_encode(value))
}

pub fn encode_unsigned_vint(magnitude: u64) -> Vec<u8> {
    let bit_len = (64 - magnitude.leading_zeros()) as usize;

    // Smallest size whose capacity (7 bits per byte, 64 for the 9-byte form)
    // covers the magnitude.
    let size = (1..=8).find(|s| 7 * s >= bit_len).unwrap_or(MAX_VINT_SIZE);

    if size == MAX_VINT_SIZE {
        let mut out = Vec::with_capacity(MAX_VINT_SIZE);
        out.push(0xFF);
        out.extend_from_slice(&magnitude.to_be_bytes());
        return out;
    }

    let extra = size - 1;
    let mut out = magnitude.to_be_bytes()[8 - size..].to_vec();
    if extra > 0 {
        out[0] |= 0xFFu8 << (8 - extra);
    }
    out
}

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(magnitude: u64) -> i64 {
    ((magnitude >> 1) as i64) ^ -((magnitude & 1) as i64)
}

/// Length-prefixed byte run without a null case, used for header fields.
pub fn vint_bytes(input: &[u8]) -> IResult<&[u8], &[u8]> {
    let (rest, len) = unsigned_vint(input)?;
    take(len as usize)(rest)
}

pub fn vint_str(input: &[u8]) -> IResult<&[u8], &str> {
    let (rest, bytes) = vint_bytes(input)?;
    let s = std::str::from_utf8(bytes)
        .map_err(|_| nom::Err::Error(NomError::new(input, ErrorKind::Char)))?;
    Ok((rest, s))
}

/// Null-aware cell framing: prefix 0 means null, prefix n means n - 1 content
/// bytes follow, so the empty value stays representable.
pub fn cell_bytes(input: &[u8]) -> IResult<&[u8], Option<&[u8]>> {
    let (rest, len) = unsigned_vint(input)?;
    if len == 0 {
        return Ok((rest, None));
    }
    let (rest, bytes) = take(len as usize - 1)(rest)?;
    Ok((rest, Some(bytes)))
}
