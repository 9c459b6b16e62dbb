//! Byte-level codecs shared by every protocol layer.
//!
//! Big-endian integer pack/unpack, EBCDIC translation and the Standard
//! Time Format (DTS) decoder. All multibyte integers on the wire are
//! big-endian; the read side is deliberately forgiving so response
//! scanners can walk fixed offsets without pre-checking lengths.

pub mod ebcdic;

use chrono::{DateTime, TimeZone, Utc};

/// Microseconds between the DTS epoch (2000-01-01) and the Unix epoch.
const DTS_EPOCH_OFFSET_MICROS: u64 = 946_684_800_000_000;

/// Pack a u16 most-significant byte first.
pub fn be_u16(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Pack a u32 most-significant byte first.
pub fn be_u32(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

/// Pack a u64 most-significant byte first.
pub fn be_u64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Read a big-endian unsigned integer of `width` bytes at `offset`.
///
/// `width` may be smaller than the natural size of the value being
/// decoded; the result is right-justified with the high bytes
/// zero-extended. Reading past the end of the buffer yields 0.
pub fn read_be(buf: &[u8], offset: usize, width: usize) -> u64 {
    debug_assert!(width <= 8);
    match buf.get(offset..offset + width) {
        Some(bytes) => bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)),
        None => 0,
    }
}

/// Read a big-endian u16 at `offset`; 0 past the end.
pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    read_be(buf, offset, 2) as u16
}

/// Read a big-endian u32 at `offset`; 0 past the end.
pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    read_be(buf, offset, 4) as u32
}

/// Read a big-endian u64 at `offset`; 0 past the end.
pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    read_be(buf, offset, 8)
}

/// Encode a string as UTF-16BE bytes.
///
/// Used for command text at datastream level 10 and above, and for the
/// SHA-1 password proof input.
pub fn to_utf16be(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Decode an 8-byte Standard Time Format timestamp.
///
/// The top bit marks the defined epoch; the low 12 bits carry
/// uniqueness data and are discarded. The remaining value counts
/// microseconds since 2000-01-01 UTC.
pub fn decode_dts(raw: u64) -> Option<DateTime<Utc>> {
    let micros = (raw.wrapping_sub(0x8000_0000_0000_0000) >> 12)
        .checked_add(DTS_EPOCH_OFFSET_MICROS)?;
    let millis = i64::try_from(micros / 1000).ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
