//! Seeded password proofs for host-server authentication.
//!
//! This module provides:
//! - The DES proof of RFC 2877 §5 (password levels 0-2 on the wire)
//! - The SHA-1 proof used above password level 2
//! - Proof selection and client seed generation

pub mod des_proof;
pub mod sha_proof;

pub use sha_proof::SHA1_DIGEST_LEN;

use rand::RngCore;

use crate::error::{Error, Result};
use crate::protocol::constants::{MAX_NAME_LEN, PWD_ENC_DES, PWD_ENC_SHA1};

/// Longest password either proof accepts.
pub const MAX_PASSWORD_LEN: usize = 128;

/// Which proof construction a session uses, decided by the negotiated
/// password level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordCipher {
    /// RFC 2877 §5 DES variant, 8-byte proof.
    Des,
    /// SHA-1 variant, 20-byte proof.
    Sha1,
}

impl PasswordCipher {
    /// Select the proof for a server-reported password level.
    pub fn for_level(password_level: u8) -> Self {
        if password_level <= 2 {
            Self::Des
        } else {
            Self::Sha1
        }
    }

    /// Encryption-type byte carried in the authentication template.
    pub fn encryption_type(self) -> u8 {
        match self {
            Self::Des => PWD_ENC_DES,
            Self::Sha1 => PWD_ENC_SHA1,
        }
    }
}

/// Compute the password proof for the given user, password and seeds.
///
/// Name and password limits are protocol limits; violating them is a
/// caller error raised before any I/O.
pub fn encrypt_password(
    user: &str,
    password: &str,
    server_seed: u64,
    client_seed: u64,
    cipher: PasswordCipher,
) -> Result<Vec<u8>> {
    if user.is_empty() || user.chars().count() > MAX_NAME_LEN {
        return Err(Error::config(format!(
            "user name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    if password.is_empty() || password.len() > MAX_PASSWORD_LEN {
        return Err(Error::config(format!(
            "password must be 1-{MAX_PASSWORD_LEN} bytes"
        )));
    }

    Ok(match cipher {
        PasswordCipher::Des => des_proof::password_proof(user, password, server_seed, client_seed)
            .to_vec(),
        PasswordCipher::Sha1 => sha_proof::password_proof(user, password, server_seed, client_seed)
            .to_vec(),
    })
}

/// Generate a fresh 64-bit client seed for a seed exchange.
pub fn generate_client_seed() -> u64 {
    rand::thread_rng().next_u64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_selection_by_level() {
        assert_eq!(PasswordCipher::for_level(0), PasswordCipher::Des);
        assert_eq!(PasswordCipher::for_level(2), PasswordCipher::Des);
        assert_eq!(PasswordCipher::for_level(3), PasswordCipher::Sha1);
        assert_eq!(PasswordCipher::for_level(255), PasswordCipher::Sha1);
    }

    #[test]
    fn encryption_type_bytes() {
        assert_eq!(PasswordCipher::Des.encryption_type(), 1);
        assert_eq!(PasswordCipher::Sha1.encryption_type(), 3);
    }

    #[test]
    fn proof_lengths() {
        let des = encrypt_password("QUSER", "PWD", 1, 2, PasswordCipher::Des).unwrap();
        assert_eq!(des.len(), 8);
        let sha = encrypt_password("QUSER", "PWD", 1, 2, PasswordCipher::Sha1).unwrap();
        assert_eq!(sha.len(), 20);
    }

    #[test]
    fn limits_are_enforced() {
        assert!(encrypt_password("TOOLONGUSERID", "PWD", 0, 0, PasswordCipher::Des).is_err());
        assert!(encrypt_password("QUSER", "", 0, 0, PasswordCipher::Des).is_err());
        let long = "X".repeat(129);
        assert!(encrypt_password("QUSER", &long, 0, 0, PasswordCipher::Sha1).is_err());
    }

    #[test]
    fn seeds_vary() {
        // Two draws colliding is a broken RNG, not bad luck.
        assert_ne!(generate_client_seed(), generate_client_seed());
    }
}
