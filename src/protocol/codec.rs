//! Length-encoded integers and strings
//!
//! | value range        | encoding                  |
//! |--------------------|---------------------------|
//! | `< 251`            | 1 byte                    |
//! | `< 2^16`           | `0xFC` + 2 bytes LE       |
//! | `< 2^24`           | `0xFD` + 3 bytes LE       |
//! | otherwise          | `0xFE` + 8 bytes LE       |
//!
//! `0xFB` is never a valid length; in a text row it stands for NULL.
//! Decoders take `&mut &[u8]` and advance the slice past what they consumed.

use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use bytes::BufMut;

/// Marker for NULL in a text result row
pub const NULL_MARKER: u8 = 0xfb;

const MARKER_U16: u8 = 0xfc;
const MARKER_U24: u8 = 0xfd;
const MARKER_U64: u8 = 0xfe;

/// Append a length-encoded integer
pub fn put_lenenc_int(buf: &mut impl BufMut, n: u64) {
    if n < 251 {
        buf.put_u8(n as u8);
    } else if n < 1 << 16 {
        buf.put_u8(MARKER_U16);
        buf.put_u16_le(n as u16);
    } else if n < 1 << 24 {
        buf.put_u8(MARKER_U24);
        buf.put_uint_le(n, 3);
    } else {
        buf.put_u8(MARKER_U64);
        buf.put_u64_le(n);
    }
}

/// Append a length-encoded string
pub fn put_lenenc_str(buf: &mut impl BufMut, s: &[u8]) {
    put_lenenc_int(buf, s.len() as u64);
    buf.put_slice(s);
}

/// Append a NUL-terminated string
pub fn put_null_terminated(buf: &mut impl BufMut, s: &[u8]) {
    buf.put_slice(s);
    buf.put_u8(0);
}

fn truncated(what: &str) -> Error {
    Error::MalformedPacket(format!("truncated {}", what))
}

/// Read a length-encoded integer
pub fn read_lenenc_int(input: &mut &[u8]) -> Result<u64> {
    let marker = input
        .read_u8()
        .map_err(|_| truncated("length-encoded integer"))?;
    let value = match marker {
        MARKER_U16 => input.read_u16::<LittleEndian>().map(u64::from),
        MARKER_U24 => input.read_u24::<LittleEndian>().map(u64::from),
        MARKER_U64 => input.read_u64::<LittleEndian>(),
        NULL_MARKER | 0xff => {
            return Err(Error::MalformedPacket(format!(
                "invalid length-encoded integer marker 0x{:02x}",
                marker
            )))
        }
        n => Ok(u64::from(n)),
    };
    value.map_err(|_| truncated("length-encoded integer"))
}

/// Read `len` raw bytes
pub fn read_bytes<'a>(input: &mut &'a [u8], len: usize) -> Result<&'a [u8]> {
    if input.len() < len {
        return Err(truncated("string"));
    }
    let (head, tail) = (*input).split_at(len);
    *input = tail;
    Ok(head)
}

/// Read a length-encoded string
pub fn read_lenenc_bytes<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = read_lenenc_int(input)?;
    let len = usize::try_from(len).map_err(|_| truncated("string"))?;
    read_bytes(input, len)
}

/// Read a NUL-terminated string, consuming the terminator
pub fn read_null_terminated<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let end = input
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::MalformedPacket("missing NUL terminator".to_string()))?;
    let (head, tail) = (*input).split_at(end);
    *input = &tail[1..];
    Ok(head)
}

/// Read a NUL-terminated UTF-8 string
pub fn read_null_terminated_str(input: &mut &[u8]) -> Result<String> {
    let raw = read_null_terminated(input)?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| Error::MalformedPacket("string is not valid UTF-8".to_string()))
}
