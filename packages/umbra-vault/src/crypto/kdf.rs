//! # Key Derivation
//!
//! Turns a human passphrase into key material so operators do not have to
//! manage raw key bytes.
//!
//! ## Parameters
//!
//! | Aspect | Choice |
//! |--------|--------|
//! | Algorithm | Argon2id, version 0x13 |
//! | Memory | 19 MiB |
//! | Iterations | 2 |
//! | Lanes | 1 |
//! | Salt | caller supplied, [`DEFAULT_SALT`] otherwise (at least 8 bytes) |
//!
//! The derivation is deterministic: the same passphrase, salt and length
//! always produce the same key, which is what lets a second process open
//! documents written by the first.

use argon2::{Config, Variant, Version};

use super::encryption::{Algorithm, EncryptionKey};
use crate::error::{Error, Result};

/// Salt used when the caller does not supply one
pub const DEFAULT_SALT: &[u8] = b"umbra-vault-v1";

/// Default derived key length (AES-256)
pub const DEFAULT_KEY_LENGTH: usize = 32;

const MEMORY_COST_KIB: u32 = 19_456;
const TIME_COST: u32 = 2;

/// Derive a key of `length` bytes from `passphrase`
///
/// `length` must match one of the supported algorithms (16, 24 or 32).
pub fn derive_key(passphrase: &str, salt: &[u8], length: usize) -> Result<EncryptionKey> {
    if Algorithm::for_key_len(length).is_none() {
        return Err(Error::InvalidKey(format!(
            "Unsupported key length: {} (expected 16, 24 or 32)",
            length
        )));
    }

    let config = Config {
        variant: Variant::Argon2id,
        version: Version::Version13,
        mem_cost: MEMORY_COST_KIB,
        time_cost: TIME_COST,
        lanes: 1,
        hash_length: length as u32,
        ..Default::default()
    };

    let bytes = argon2::hash_raw(passphrase.as_bytes(), salt, &config)
        .map_err(|e| Error::KeyDerivationFailed(e.to_string()))?;

    Ok(EncryptionKey::from_bytes(bytes))
}

/// Derive a 32-byte key with [`DEFAULT_SALT`]
pub fn derive_default_key(passphrase: &str) -> Result<EncryptionKey> {
    derive_key(passphrase, DEFAULT_SALT, DEFAULT_KEY_LENGTH)
}
