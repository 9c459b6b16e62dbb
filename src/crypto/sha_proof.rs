//! SHA-1 password proof for password level 2 and above.
//!
//! Long (QPWDLVL 2/3) passwords are case-sensitive and exceed the DES
//! scheme's folding limits, so the servers switch to a SHA-1 token:
//! everything is hashed as UTF-16BE with the user name uppercased and
//! padded to 10 characters.

use sha1::{Digest, Sha1};

use crate::codec::to_utf16be;

/// SHA-1 digest length in bytes.
pub const SHA1_DIGEST_LEN: usize = 20;

fn padded_user(user: &str) -> String {
    format!("{:<10}", user.to_uppercase())
}

/// Compute the password token: SHA1 of the padded user name and the
/// password, both UTF-16BE.
fn password_token(user: &str, password: &str) -> [u8; SHA1_DIGEST_LEN] {
    let mut input = padded_user(user);
    input.push_str(password);
    Sha1::digest(to_utf16be(&input)).into()
}

/// Compute the 20-byte SHA-1 password proof.
///
/// The token is mixed with both seeds, the padded user name and a
/// sequence number of 1.
pub fn password_proof(
    user: &str,
    password: &str,
    server_seed: u64,
    client_seed: u64,
) -> [u8; SHA1_DIGEST_LEN] {
    let token = password_token(user, password);
    let mut hasher = Sha1::new();
    hasher.update(token);
    hasher.update(server_seed.to_be_bytes());
    hasher.update(client_seed.to_be_bytes());
    hasher.update(to_utf16be(&padded_user(user)));
    hasher.update(1u64.to_be_bytes());
    hasher.finalize().into()
}
