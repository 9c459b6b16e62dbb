//! EBCDIC translation for host-server text fields.
//!
//! The wire carries all textual fields in EBCDIC under the negotiated
//! CCSID. This module ships the CP037 (U.S./Canadian EBCDIC) tables the
//! servers default to; other code pages resolve through
//! [`CodePage::from_ccsid`] and fail explicitly when not carried.
//!
//! Translations are length-preserving byte-for-byte: each EBCDIC byte
//! maps to one Latin-1 character and back.

use crate::error::{Error, Result};

/// EBCDIC CP037 to Latin-1 translation table.
///
/// CP037 is a permutation of the 256 byte values, so the inverse table
/// is derived rather than maintained by hand.
const CP037_TO_LATIN1: [u8; 256] = [
    0x00, 0x01, 0x02, 0x03, 0x9C, 0x09, 0x86, 0x7F, 0x97, 0x8D, 0x8E, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
    0x10, 0x11, 0x12, 0x13, 0x9D, 0x85, 0x08, 0x87, 0x18, 0x19, 0x92, 0x8F, 0x1C, 0x1D, 0x1E, 0x1F,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x0A, 0x17, 0x1B, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x05, 0x06, 0x07,
    0x90, 0x91, 0x16, 0x93, 0x94, 0x95, 0x96, 0x04, 0x98, 0x99, 0x9A, 0x9B, 0x14, 0x15, 0x9E, 0x1A,
    0x20, 0xA0, 0xE2, 0xE4, 0xE0, 0xE1, 0xE3, 0xE5, 0xE7, 0xF1, 0xA2, 0x2E, 0x3C, 0x28, 0x2B, 0x7C,
    0x26, 0xE9, 0xEA, 0xEB, 0xE8, 0xED, 0xEE, 0xEF, 0xEC, 0xDF, 0x21, 0x24, 0x2A, 0x29, 0x3B, 0xAC,
    0x2D, 0x2F, 0xC2, 0xC4, 0xC0, 0xC1, 0xC3, 0xC5, 0xC7, 0xD1, 0xA6, 0x2C, 0x25, 0x5F, 0x3E, 0x3F,
    0xF8, 0xC9, 0xCA, 0xCB, 0xC8, 0xCD, 0xCE, 0xCF, 0xCC, 0x60, 0x3A, 0x23, 0x40, 0x27, 0x3D, 0x22,
    0xD8, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0xAB, 0xBB, 0xF0, 0xFD, 0xFE, 0xB1,
    0xB0, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F, 0x70, 0x71, 0x72, 0xAA, 0xBA, 0xE6, 0xB8, 0xC6, 0xA4,
    0xB5, 0x7E, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7A, 0xA1, 0xBF, 0xD0, 0xDD, 0xDE, 0xAE,
    0x5E, 0xA3, 0xA5, 0xB7, 0xA9, 0xA7, 0xB6, 0xBC, 0xBD, 0xBE, 0x5B, 0x5D, 0xAF, 0xA8, 0xB4, 0xD7,
    0x7B, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0xAD, 0xF4, 0xF6, 0xF2, 0xF3, 0xF5,
    0x7D, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F, 0x50, 0x51, 0x52, 0xB9, 0xFB, 0xFC, 0xF9, 0xFA, 0xFF,
    0x5C, 0xF7, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5A, 0xB2, 0xD4, 0xD6, 0xD2, 0xD3, 0xD5,
    0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0xB3, 0xDB, 0xDC, 0xD9, 0xDA, 0x9F,
];

const fn invert(table: &[u8; 256]) -> [u8; 256] {
    let mut inv = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        inv[table[i] as usize] = i as u8;
        i += 1;
    }
    inv
}

const LATIN1_TO_CP037: [u8; 256] = invert(&CP037_TO_LATIN1);

/// EBCDIC space.
pub const EBCDIC_SPACE: u8 = 0x40;

/// EBCDIC substitute character, used for untranslatable input.
const EBCDIC_SUB: u8 = 0x3F;

/// A single EBCDIC code page: paired byte-for-byte translation tables.
#[derive(Debug, Clone, Copy)]
pub struct CodePage {
    /// CCSID this code page implements.
    pub ccsid: u32,
    /// Display name, e.g. "CP037".
    pub name: &'static str,
    to_latin1: &'static [u8; 256],
    from_latin1: &'static [u8; 256],
}

/// U.S./Canadian EBCDIC, the host-server default (CCSID 37).
pub static CP037: CodePage = CodePage {
    ccsid: 37,
    name: "CP037",
    to_latin1: &CP037_TO_LATIN1,
    from_latin1: &LATIN1_TO_CP037,
};

impl CodePage {
    /// Look up a code page by CCSID.
    ///
    /// CCSID 0 means "server default" on the wire and resolves to 37.
    /// Unsupported CCSIDs fail explicitly rather than mistranslating.
    pub fn from_ccsid(ccsid: u32) -> Result<&'static CodePage> {
        match ccsid {
            0 | 37 => Ok(&CP037),
            other => Err(Error::UnsupportedCcsid(other)),
        }
    }

    /// Translate one EBCDIC byte to its character.
    pub fn decode_byte(&self, byte: u8) -> char {
        char::from(self.to_latin1[byte as usize])
    }

    /// Translate one character to its EBCDIC byte.
    ///
    /// Characters outside Latin-1 become the EBCDIC substitute byte.
    pub fn encode_char(&self, ch: char) -> u8 {
        match u8::try_from(u32::from(ch)) {
            Ok(b) => self.from_latin1[b as usize],
            Err(_) => EBCDIC_SUB,
        }
    }

    /// Translate EBCDIC bytes to a string, one character per byte.
    pub fn decode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.decode_byte(b)).collect()
    }

    /// Translate a string to EBCDIC, one byte per character.
    pub fn encode(&self, s: &str) -> Vec<u8> {
        s.chars().map(|ch| self.encode_char(ch)).collect()
    }
}

/// EBCDIC-encode an object name: uppercase, right-padded with EBCDIC
/// spaces to `width` bytes.
///
/// Uppercasing happens before translation, matching how the servers
/// store profile, library and program names.
pub fn encode_name(name: &str, width: usize, cp: &CodePage) -> Vec<u8> {
    let mut out = cp.encode(&name.to_uppercase());
    out.resize(width.max(out.len()), EBCDIC_SPACE);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qsecofr_vector() {
        assert_eq!(
            CP037.encode("QSECOFR"),
            vec![0xD8, 0xE2, 0xC5, 0xC3, 0xD6, 0xC6, 0xD9]
        );
    }

    #[test]
    fn spaces_are_0x40() {
        assert_eq!(CP037.encode("  "), vec![0x40, 0x40]);
    }

    #[test]
    fn ascii_round_trip() {
        let s = "The quick brown fox, 0123456789 *$#@!?<>()[]{}";
        assert_eq!(CP037.decode(&CP037.encode(s)), s);
    }

    #[test]
    fn full_byte_round_trip() {
        // CP037 is a permutation, so decode∘encode is identity on bytes.
        for b in 0u8..=255 {
            let ch = CP037.decode_byte(b);
            assert_eq!(CP037.encode_char(ch), b);
        }
    }

    #[test]
    fn unsupported_ccsid_fails() {
        assert!(CodePage::from_ccsid(500).is_err());
        assert!(CodePage::from_ccsid(37).is_ok());
        assert_eq!(CodePage::from_ccsid(0).unwrap().ccsid, 37);
    }

    #[test]
    fn name_encoding_uppercases_and_pads() {
        let bytes = encode_name("qgpl", 10, &CP037);
        assert_eq!(bytes.len(), 10);
        assert_eq!(&bytes[..4], &CP037.encode("QGPL")[..]);
        assert!(bytes[4..].iter().all(|&b| b == EBCDIC_SPACE));
    }

    #[test]
    fn long_name_is_not_truncated() {
        let bytes = encode_name("ABCDEFGHIJKL", 10, &CP037);
        assert_eq!(bytes.len(), 12);
    }
}
