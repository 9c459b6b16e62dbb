//! Server message interpretation.
//!
//! Call replies end with a message stream: `messageCount` records, each
//! a dynamic field whose code point selects one of two layouts. The
//! legacy 0x1102 record is fixed-offset; the extended 0x1106 record is
//! a chain of length-prefixed sub-fields with per-text CCSIDs.

use crate::codec;
use crate::codec::ebcdic::CodePage;
use crate::error::{Error, Result};
use crate::protocol::constants::{CP_MESSAGE_EXTENDED, CP_MESSAGE_LEGACY, OFFSET_FIELDS};

/// One message returned by the server.
#[derive(Debug, Clone, Default)]
pub struct CallMessage {
    /// Seven-character message identifier, e.g. "CPF2105".
    pub id: String,
    /// Message type code.
    pub msg_type: u16,
    /// Severity, 0-99.
    pub severity: u16,
    /// Message file the text came from.
    pub file: String,
    /// Library holding the message file.
    pub library: String,
    /// Substitution data inserted into the text.
    pub substitution_text: String,
    /// First-level message text.
    pub text: String,
    /// Second-level help text (extended format only).
    pub help: String,
}

/// Ordered list of returned messages.
#[derive(Debug, Clone, Default)]
pub struct CallMessages {
    messages: Vec<CallMessage>,
}

impl CallMessages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CallMessage> {
        self.messages.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CallMessage> {
        self.messages.iter()
    }

    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }

    pub(crate) fn push(&mut self, message: CallMessage) {
        self.messages.push(message);
    }
}

impl<'a> IntoIterator for &'a CallMessages {
    type Item = &'a CallMessage;
    type IntoIter = std::slice::Iter<'a, CallMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// Parse the message stream of a call reply into `out`.
///
/// `frame` is the full response buffer; records start at offset 24.
/// Exactly `count` records are consumed; anything after them is
/// discarded. Records with an unknown code point are skipped.
pub fn parse_message_stream(
    frame: &[u8],
    count: u16,
    cp: &CodePage,
    out: &mut CallMessages,
) -> Result<()> {
    out.clear();
    let mut pos = OFFSET_FIELDS;

    for _ in 0..count {
        if pos >= frame.len() {
            break;
        }
        let ll = codec::read_u32(frame, pos) as usize;
        if ll < 6 {
            return Err(Error::framing(format!(
                "message record length {ll} below minimum at offset {pos}"
            )));
        }
        if pos + ll > frame.len() {
            return Err(Error::framing(format!(
                "message record of {ll} bytes overruns {}-byte frame",
                frame.len()
            )));
        }
        let code = codec::read_u16(frame, pos + 4);
        let data = &frame[pos + 6..pos + ll];

        match code {
            CP_MESSAGE_LEGACY => out.push(parse_legacy(data, cp)),
            CP_MESSAGE_EXTENDED => out.push(parse_extended(data)?),
            _ => {} // unknown message format
        }
        pos += ll;
    }

    Ok(())
}

/// Fixed-offset legacy record. Truncated records decode as far as the
/// data reaches; the codec reads zeros past the end.
fn parse_legacy(data: &[u8], cp: &CodePage) -> CallMessage {
    let subst_len = codec::read_u16(data, 31) as usize;
    let text_len = codec::read_u16(data, 33) as usize;

    let subst_end = (35 + subst_len).min(data.len());
    let text_end = (subst_end + text_len).min(data.len());

    CallMessage {
        id: cp.decode(data.get(0..7).unwrap_or_default()),
        msg_type: codec::read_u16(data, 7),
        severity: codec::read_u16(data, 9),
        file: cp.decode(data.get(11..21).unwrap_or_default()).trim_end().to_string(),
        library: cp.decode(data.get(21..31).unwrap_or_default()).trim_end().to_string(),
        substitution_text: cp.decode(data.get(35..subst_end).unwrap_or_default()),
        text: cp.decode(data.get(subst_end..text_end).unwrap_or_default()),
        help: String::new(),
    }
}

/// Extended record: fixed CCSID/severity/type prefix, then six
/// length-prefixed sub-fields in declared order.
fn parse_extended(data: &[u8]) -> Result<CallMessage> {
    let text_ccsid = codec::read_u32(data, 0);
    let subst_ccsid = codec::read_u32(data, 4);
    let severity = codec::read_u16(data, 8);
    let type_len = codec::read_u32(data, 10) as usize;
    let msg_type = codec::read_u16(data, 14);
    if type_len < 2 {
        return Err(Error::framing("extended message type field too short"));
    }

    let text_cp = CodePage::from_ccsid(text_ccsid)?;
    let subst_cp = CodePage::from_ccsid(subst_ccsid)?;

    let mut pos = 14 + type_len;
    let mut take = |what: &str| -> Result<Vec<u8>> {
        if pos + 4 > data.len() {
            return Err(Error::framing(format!("extended message truncated before {what}")));
        }
        let len = codec::read_u32(data, pos) as usize;
        pos += 4;
        if pos + len > data.len() {
            return Err(Error::framing(format!("extended message {what} overruns record")));
        }
        let bytes = data[pos..pos + len].to_vec();
        pos += len;
        Ok(bytes)
    };

    let id = take("id")?;
    let file = take("file")?;
    let library = take("library")?;
    let text = take("text")?;
    let substitution = take("substitution")?;
    let help = take("help")?;

    Ok(CallMessage {
        id: text_cp.decode(&id),
        msg_type,
        severity,
        file: text_cp.decode(&file).trim_end().to_string(),
        library: text_cp.decode(&library).trim_end().to_string(),
        substitution_text: subst_cp.decode(&substitution),
        text: text_cp.decode(&text),
        help: text_cp.decode(&help),
    })
}
