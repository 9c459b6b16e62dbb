//! Dynamic-field scanning for handshake replies.
//!
//! Replies carry zero or more `{u32 LL, u16 CP, data[LL-6]}` fields
//! after their fixed portion. Fields are keyed by code point; order is
//! not guaranteed.

use crate::codec;
use crate::error::{Error, Result};

/// One decoded dynamic field.
#[derive(Debug, Clone)]
pub struct DynamicField {
    /// 2-byte code point identifying the field.
    pub code: u16,
    /// Field payload, LL-6 bytes.
    pub data: Vec<u8>,
}

/// Parse every dynamic field from `buf` starting at `offset`.
///
/// A declared length shorter than the 6-byte prefix or running past the
/// end of the buffer is a framing error.
pub fn parse_fields(buf: &[u8], offset: usize) -> Result<Vec<DynamicField>> {
    let mut fields = Vec::new();
    let mut pos = offset;

    while pos < buf.len() {
        let ll = codec::read_u32(buf, pos) as usize;
        if ll < 6 {
            return Err(Error::framing(format!(
                "dynamic field length {ll} below minimum at offset {pos}"
            )));
        }
        if pos + ll > buf.len() {
            return Err(Error::framing(format!(
                "dynamic field of {ll} bytes overruns {}-byte frame at offset {pos}",
                buf.len()
            )));
        }
        let code = codec::read_u16(buf, pos + 4);
        fields.push(DynamicField {
            code,
            data: buf[pos + 6..pos + ll].to_vec(),
        });
        pos += ll;
    }

    Ok(fields)
}

/// Find a field by code point.
pub fn find<'a>(fields: &'a [DynamicField], code: u16) -> Option<&'a DynamicField> {
    fields.iter().find(|f| f.code == code)
}
