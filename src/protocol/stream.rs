//! Request assembly and response parse buffer.
//!
//! `DataStream` is the sequential big-endian buffer every request is
//! built in and every response is walked with. It is a local scratch
//! structure only; the transport owns the outer length frame.

use bytes::{BufMut, BytesMut};

use crate::codec;
use crate::protocol::constants::*;

/// Sequential big-endian byte buffer with an explicit read cursor.
///
/// Writes always append; reads consume from the cursor and follow the
/// codec contract (reads past the end yield 0).
#[derive(Debug, Default)]
pub struct DataStream {
    buf: BytesMut,
    pos: usize,
}

impl DataStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream with a pre-sized buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Wrap received bytes for parsing, cursor at 0.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(bytes),
            pos: 0,
        }
    }

    // ── Writing ──────────────────────────────────────────

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    // ── Reading ──────────────────────────────────────────

    pub fn read_u8(&mut self) -> u8 {
        let v = codec::read_be(&self.buf, self.pos, 1) as u8;
        self.pos += 1;
        v
    }

    pub fn read_u16(&mut self) -> u16 {
        let v = codec::read_u16(&self.buf, self.pos);
        self.pos += 2;
        v
    }

    pub fn read_u32(&mut self) -> u32 {
        let v = codec::read_u32(&self.buf, self.pos);
        self.pos += 4;
        v
    }

    pub fn read_u64(&mut self) -> u64 {
        let v = codec::read_u64(&self.buf, self.pos);
        self.pos += 8;
        v
    }

    /// Read `len` raw bytes; short reads return what remains.
    pub fn read_bytes(&mut self, len: usize) -> Vec<u8> {
        let end = (self.pos + len).min(self.buf.len());
        let out = self.buf.get(self.pos..end).unwrap_or_default().to_vec();
        self.pos += len;
        out
    }

    // ── Cursor and contents ──────────────────────────────

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Extract the assembled contents.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Append the fixed request header used by both services.
///
/// On the wire the header occupies 20 bytes; the leading 4-byte length
/// is supplied by the transport, so 16 bytes are written here. Header
/// ID, CS instance and correlation ID are always zero for this client.
pub fn write_header(ds: &mut DataStream, server_id: u16, template_len: u16, reqrep: u16) {
    ds.write_u16(0);
    ds.write_u16(server_id);
    ds.write_u32(0);
    ds.write_u32(0);
    ds.write_u16(template_len);
    ds.write_u16(reqrep);
}

/// Append the remote-command variant of the header, where the header-ID
/// word carries the client/server attribute bytes instead.
pub fn write_attribute_header(
    ds: &mut DataStream,
    client_attributes: u8,
    server_attributes: u8,
    template_len: u16,
    reqrep: u16,
) {
    ds.write_u8(client_attributes);
    ds.write_u8(server_attributes);
    ds.write_u16(SERVER_COMMAND);
    ds.write_u32(0);
    ds.write_u32(0);
    ds.write_u16(template_len);
    ds.write_u16(reqrep);
}

/// Append a `{u32 LL, u16 CP, data}` dynamic field.
pub fn write_field(ds: &mut DataStream, code: u16, data: &[u8]) {
    ds.write_u32((6 + data.len()) as u32);
    ds.write_u16(code);
    ds.write_bytes(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_round_trip() {
        let mut ds = DataStream::new();
        ds.write_u8(0xAB);
        ds.write_u16(0xE008);
        ds.write_u32(0xDEAD_BEEF);
        ds.write_u64(0x0102_0304_0506_0708);
        ds.write_bytes(b"XYZ");

        assert_eq!(ds.read_u8(), 0xAB);
        assert_eq!(ds.read_u16(), 0xE008);
        assert_eq!(ds.read_u32(), 0xDEAD_BEEF);
        assert_eq!(ds.read_u64(), 0x0102_0304_0506_0708);
        assert_eq!(ds.read_bytes(3), b"XYZ");
        // Past the end: zeros and empty slices.
        assert_eq!(ds.read_u32(), 0);
        assert!(ds.read_bytes(4).is_empty());
    }

    #[test]
    fn cursor_repositioning() {
        let mut ds = DataStream::from_bytes(&[0, 1, 0, 2, 0, 3]);
        ds.set_position(2);
        assert_eq!(ds.read_u16(), 2);
        assert_eq!(ds.position(), 4);
        ds.set_position(0);
        assert_eq!(ds.read_u16(), 1);
    }

    #[test]
    fn header_is_sixteen_bytes() {
        let mut ds = DataStream::new();
        write_header(&mut ds, SERVER_SIGNON, 1, REQREP_SIGNON_AUTHENTICATE);
        assert_eq!(ds.len(), 16);
        let frame = ds.into_vec();
        assert_eq!(codec::read_u16(&frame, 0), 0);
        assert_eq!(codec::read_u16(&frame, 2), SERVER_SIGNON);
        assert_eq!(codec::read_u16(&frame, 12), 1);
        assert_eq!(codec::read_u16(&frame, 14), REQREP_SIGNON_AUTHENTICATE);
    }

    #[test]
    fn attribute_header_carries_client_bytes() {
        let mut ds = DataStream::new();
        write_attribute_header(&mut ds, 1, 0, 8, REQREP_RC_EXCHANGE_SEEDS);
        let frame = ds.into_vec();
        assert_eq!(frame[0], 1);
        assert_eq!(frame[1], 0);
        assert_eq!(codec::read_u16(&frame, 2), SERVER_COMMAND);
        assert_eq!(codec::read_u16(&frame, 14), REQREP_RC_EXCHANGE_SEEDS);
    }

    #[test]
    fn field_length_includes_prefix() {
        let mut ds = DataStream::new();
        write_field(&mut ds, CP_SEED, &[0u8; 8]);
        let frame = ds.into_vec();
        assert_eq!(codec::read_u32(&frame, 0), 14);
        assert_eq!(codec::read_u16(&frame, 4), CP_SEED);
    }
}
