//! Primitive wire codec.
//!
//! Encode/decode for the element types the protocol is built from: fixed
//! width little-endian integers, booleans, CompactSize variable-length
//! integers and length-prefixed strings. Everything operates on
//! [`bytes::Buf`] / [`bytes::BufMut`], so the same functions serve both
//! in-memory frame assembly and payload parsing.
//!
//! Endianness rule: every numeric field is little-endian except the port of
//! a network address, which the protocol mandates big-endian. The port is
//! therefore handled by the address codec in [`crate::wire::payload`], never
//! by the generic integer helpers here.
//!
//! A short read is a fatal [`ProtocolError::Decode`] for that element; the
//! codec never retries or pads.

use bytes::{Buf, BufMut};

use crate::error::{ProtocolError, Result};

fn ensure(buf: &impl Buf, needed: usize, what: &str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Decode(format!(
            "short read: need {needed} bytes for {what}, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn get_u8(buf: &mut impl Buf) -> Result<u8> {
    ensure(buf, 1, "u8")?;
    Ok(buf.get_u8())
}

/// Boolean as a single byte; any non-zero value reads as true.
pub fn get_bool(buf: &mut impl Buf) -> Result<bool> {
    Ok(get_u8(buf)? != 0x00)
}

pub fn get_u16_le(buf: &mut impl Buf) -> Result<u16> {
    ensure(buf, 2, "u16")?;
    Ok(buf.get_u16_le())
}

/// Big-endian u16, used only for the port field of a network address.
pub fn get_u16_be(buf: &mut impl Buf) -> Result<u16> {
    ensure(buf, 2, "u16be")?;
    Ok(buf.get_u16())
}

pub fn get_u32_le(buf: &mut impl Buf) -> Result<u32> {
    ensure(buf, 4, "u32")?;
    Ok(buf.get_u32_le())
}

pub fn get_i32_le(buf: &mut impl Buf) -> Result<i32> {
    ensure(buf, 4, "i32")?;
    Ok(buf.get_i32_le())
}

pub fn get_u64_le(buf: &mut impl Buf) -> Result<u64> {
    ensure(buf, 8, "u64")?;
    Ok(buf.get_u64_le())
}

pub fn get_i64_le(buf: &mut impl Buf) -> Result<i64> {
    ensure(buf, 8, "i64")?;
    Ok(buf.get_i64_le())
}

/// Reads exactly `N` raw bytes into a fixed array.
pub fn get_array<const N: usize>(buf: &mut impl Buf) -> Result<[u8; N]> {
    ensure(buf, N, "byte array")?;
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Encodes a CompactSize variable-length integer.
///
/// The smallest applicable form is always chosen:
/// - `< 0xfd`: the value itself in one byte
/// - `<= 0xffff`: marker `0xfd` + u16 little-endian
/// - `<= 0xffffffff`: marker `0xfe` + u32 little-endian
/// - otherwise: marker `0xff` + u64 little-endian
pub fn put_varint(buf: &mut impl BufMut, value: u64) {
    match value {
        0..=0xFC => buf.put_u8(value as u8),
        0xFD..=0xFFFF => {
            buf.put_u8(0xFD);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xFFFF_FFFF => {
            buf.put_u8(0xFE);
            buf.put_u32_le(value as u32);
        }
        _ => {
            buf.put_u8(0xFF);
            buf.put_u64_le(value);
        }
    }
}

/// Decodes a CompactSize variable-length integer by branching on the marker
/// byte. Oversized (non-canonical) encodings are accepted on read.
pub fn get_varint(buf: &mut impl Buf) -> Result<u64> {
    match get_u8(buf)? {
        0xFD => Ok(u64::from(get_u16_le(buf)?)),
        0xFE => Ok(u64::from(get_u32_le(buf)?)),
        0xFF => get_u64_le(buf),
        n => Ok(u64::from(n)),
    }
}

/// Encodes a variable-length string: varint byte length followed by the raw
/// UTF-8 bytes, no terminator.
pub fn put_varstring(buf: &mut impl BufMut, s: &str) {
    put_varint(buf, s.len() as u64);
    buf.put_slice(s.as_bytes());
}

/// Decodes a variable-length string. The declared length must fit inside the
/// remaining buffer, which bounds the allocation to the payload size.
pub fn get_varstring(buf: &mut impl Buf) -> Result<String> {
    let len = get_varint(buf)? as usize;
    ensure(buf, len, "var string body")?;
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|e| ProtocolError::Decode(format!("invalid utf-8: {e}")))
}
