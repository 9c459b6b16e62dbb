//! DES password proof, RFC 2877 §5.
//!
//! The proof never transmits the password. The password is folded into
//! an 8-byte token, then the token keys a chain of single-block DES
//! encryptions over the user name and both session seeds. Servers at
//! password level 0 and 1 verify this form.

use des::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use des::Des;

use crate::codec::ebcdic::{encode_name, CP037, EBCDIC_SPACE};

/// Encrypt one 8-byte block with single DES in ECB mode.
///
/// Both operands are treated as big-endian u64, which is how every XOR
/// and "+1" in the chain is defined.
fn encrypt_block(plaintext: u64, key: u64) -> u64 {
    let cipher = Des::new(GenericArray::from_slice(&key.to_be_bytes()));
    let mut block = GenericArray::clone_from_slice(&plaintext.to_be_bytes());
    cipher.encrypt_block(&mut block);
    u64::from_be_bytes(block.into())
}

/// Turn up to 8 password characters into a DES key: space-pad,
/// uppercase, EBCDIC-encode, XOR with alternating bits, shift left one.
fn password_key(chunk: &str) -> u64 {
    let mut bytes = CP037.encode(&chunk.to_uppercase());
    bytes.resize(8, EBCDIC_SPACE);
    let raw = u64::from_be_bytes(bytes[..8].try_into().unwrap());
    (raw ^ 0x5555_5555_5555_5555) << 1
}

/// Prepare the user name as a DES plaintext block.
///
/// Names of at most 8 characters are space-padded EBCDIC. The 9th and
/// 10th EBCDIC bytes of longer names are folded in as 2-bit fields
/// spread over the first and second half of the block.
fn name_block(user: &str) -> u64 {
    let eb = encode_name(user, 10, &CP037);
    let mut block: [u8; 8] = eb[..8].try_into().unwrap();
    if user.chars().count() > 8 {
        let (b9, b10) = (eb[8], eb[9]);
        block[0] ^= b9 & 0xC0;
        block[1] ^= (b9 & 0x30) << 2;
        block[2] ^= (b9 & 0x0C) << 4;
        block[3] ^= (b9 & 0x03) << 6;
        block[4] ^= b10 & 0xC0;
        block[5] ^= (b10 & 0x30) << 2;
        block[6] ^= (b10 & 0x0C) << 4;
        block[7] ^= (b10 & 0x03) << 6;
    }
    u64::from_be_bytes(block)
}

/// Form the 8-byte password token.
///
/// Passwords longer than 8 characters produce two independent tokens
/// (second chunk space-padded) XORed together.
fn password_token(user: &str, password: &str) -> u64 {
    let name = name_block(user);
    let chars: Vec<char> = password.chars().collect();
    if chars.len() <= 8 {
        encrypt_block(name, password_key(password))
    } else {
        let first: String = chars[..8].iter().collect();
        let second: String = chars[8..].iter().collect();
        encrypt_block(name, password_key(&first)) ^ encrypt_block(name, password_key(&second))
    }
}

/// Compute the 8-byte DES password proof.
///
/// The token keys four chained single-block encryptions over the two
/// seeds and the EBCDIC user-name halves, then one final round over a
/// sequence number of 1.
pub fn password_proof(user: &str, password: &str, server_seed: u64, client_seed: u64) -> [u8; 8] {
    let token = password_token(user, password);

    let name16 = encode_name(user, 16, &CP037);
    let ua = u64::from_be_bytes(name16[..8].try_into().unwrap());
    let ub = u64::from_be_bytes(name16[8..16].try_into().unwrap());

    let seed1 = server_seed.wrapping_add(1);
    let r1 = encrypt_block(seed1, token);
    let r2 = encrypt_block(r1 ^ client_seed, token);
    let r3 = encrypt_block(ua ^ seed1 ^ r2, token);
    let r4 = encrypt_block(ub ^ seed1 ^ r3, token);
    encrypt_block(r4 ^ 1, token).to_be_bytes()
}
