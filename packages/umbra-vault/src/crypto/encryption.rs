//! # Encryption Module
//!
//! AES-GCM encryption of one document's JSON serialization into a
//! transport-safe [`Envelope`], and the inverse.
//!
//! ## Encryption Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           SEALING A DOCUMENT                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  JSON text ──► AES-GCM(key, random 12-byte IV) ──► ciphertext + tag     │
//! │                                                                         │
//! │  Envelope {                                                             │
//! │      ciphertext: base64(ciphertext),                                    │
//! │      iv:         base64(iv),                                            │
//! │      authTag:    base64(tag)          (16 bytes)                        │
//! │  }                                                                      │
//! │                                                                         │
//! │  The envelope's JSON form is the message content sent to the channel.   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fail-Closed Decryption
//!
//! [`decrypt`] returns `None` for anything it cannot read: bad base64, wrong
//! IV or tag length, tag mismatch, wrong key, or non-UTF-8 plaintext. Callers
//! treat such messages as absent data.

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

/// Size of the AES-GCM IV in bytes (96 bits)
pub const IV_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

type Aes192Gcm = AesGcm<Aes192, U12>;

/// Supported AEAD constructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    /// AES-128 in Galois/Counter mode (16-byte key)
    #[serde(rename = "aes-128-gcm")]
    Aes128Gcm,
    /// AES-192 in Galois/Counter mode (24-byte key)
    #[serde(rename = "aes-192-gcm")]
    Aes192Gcm,
    /// AES-256 in Galois/Counter mode (32-byte key)
    #[default]
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
}

impl Algorithm {
    /// Key length in bytes required by this algorithm
    pub fn key_len(&self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes192Gcm => 24,
            Self::Aes256Gcm => 32,
        }
    }

    /// Wire name, as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes128Gcm => "aes-128-gcm",
            Self::Aes192Gcm => "aes-192-gcm",
            Self::Aes256Gcm => "aes-256-gcm",
        }
    }

    /// The algorithm whose key length is `len`, if any
    pub fn for_key_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Self::Aes128Gcm),
            24 => Some(Self::Aes192Gcm),
            32 => Some(Self::Aes256Gcm),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aes-128-gcm" => Ok(Self::Aes128Gcm),
            "aes-192-gcm" => Ok(Self::Aes192Gcm),
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            other => Err(Error::InvalidConfig(format!(
                "Unsupported algorithm: {}",
                other
            ))),
        }
    }
}

/// Symmetric key material
///
/// Zeroized when dropped. `Debug` prints only the fingerprint.
#[derive(Clone, PartialEq, Eq, ZeroizeOnDrop)]
pub struct EncryptionKey(Vec<u8>);

impl EncryptionKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a base64 key, as found in configuration
    pub fn from_base64(encoded: &str) -> Result<Self> {
        BASE64
            .decode(encoded.trim())
            .map(Self)
            .map_err(|e| Error::InvalidKey(format!("Invalid base64: {}", e)))
    }

    /// Generate a random key for `algorithm`
    pub fn generate(algorithm: Algorithm) -> Self {
        let mut bytes = vec![0u8; algorithm.key_len()];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Short SHA-256 fingerprint (first 8 bytes, hex), safe to log
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        hex::encode(&digest[..8])
    }

    /// Fail unless this key fits `algorithm`
    pub fn check(&self, algorithm: Algorithm) -> Result<()> {
        if self.0.len() != algorithm.key_len() {
            return Err(Error::InvalidKey(format!(
                "{} requires a {}-byte key, got {} bytes",
                algorithm,
                algorithm.key_len(),
                self.0.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncryptionKey")
            .field(&self.fingerprint())
            .finish()
    }
}

/// The encrypted-at-rest wire form of one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Base64 ciphertext (tag not included)
    pub ciphertext: String,
    /// Base64 12-byte IV
    pub iv: String,
    /// Base64 16-byte authentication tag
    pub auth_tag: String,
}

impl Envelope {
    /// Serialize to the JSON text stored as message content
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Parse message content; `None` unless it is an object with all three
    /// string fields
    pub fn parse(content: &str) -> Option<Self> {
        serde_json::from_str(content).ok()
    }

    /// Decrypt this envelope, failing closed
    pub fn open(&self, key: &EncryptionKey, algorithm: Algorithm) -> Option<String> {
        decrypt(&self.ciphertext, key, &self.iv, &self.auth_tag, algorithm)
    }
}

/// Encrypt `plaintext` with a fresh random IV
///
/// ## Critical Security Requirement
///
/// The IV is drawn from the OS RNG on every call and never reused with the
/// same key. Random 96-bit IVs are safe for up to 2^32 messages per key.
pub fn encrypt(plaintext: &str, key: &EncryptionKey, algorithm: Algorithm) -> Result<Envelope> {
    key.check(algorithm)?;

    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = match algorithm {
        Algorithm::Aes128Gcm => seal::<Aes128Gcm>(key.as_bytes(), &iv, &mut buffer)?,
        Algorithm::Aes192Gcm => seal::<Aes192Gcm>(key.as_bytes(), &iv, &mut buffer)?,
        Algorithm::Aes256Gcm => seal::<Aes256Gcm>(key.as_bytes(), &iv, &mut buffer)?,
    };

    Ok(Envelope {
        ciphertext: BASE64.encode(&buffer),
        iv: BASE64.encode(iv),
        auth_tag: BASE64.encode(tag),
    })
}

/// Decrypt base64 `ciphertext` with the stored IV and tag
///
/// Returns `None` if the tag does not verify or any field is unreadable.
pub fn decrypt(
    ciphertext: &str,
    key: &EncryptionKey,
    iv: &str,
    auth_tag: &str,
    algorithm: Algorithm,
) -> Option<String> {
    if key.check(algorithm).is_err() {
        return None;
    }

    let iv = BASE64.decode(iv).ok()?;
    let tag = BASE64.decode(auth_tag).ok()?;
    let mut buffer = BASE64.decode(ciphertext).ok()?;

    if iv.len() != IV_SIZE || tag.len() != TAG_SIZE {
        return None;
    }

    let opened = match algorithm {
        Algorithm::Aes128Gcm => open::<Aes128Gcm>(key.as_bytes(), &iv, &tag, &mut buffer),
        Algorithm::Aes192Gcm => open::<Aes192Gcm>(key.as_bytes(), &iv, &tag, &mut buffer),
        Algorithm::Aes256Gcm => open::<Aes256Gcm>(key.as_bytes(), &iv, &tag, &mut buffer),
    };

    if !opened {
        return None;
    }

    String::from_utf8(buffer).ok()
}

fn seal<C>(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<Vec<u8>>
where
    C: KeyInit + AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    let cipher =
        C::new_from_slice(key).map_err(|e| Error::InvalidKey(format!("Invalid key: {}", e)))?;

    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(iv), b"", buffer)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))?;

    Ok(tag.to_vec())
}

fn open<C>(key: &[u8], iv: &[u8], tag: &[u8], buffer: &mut [u8]) -> bool
where
    C: KeyInit + AeadInPlace + AeadCore<NonceSize = U12, TagSize = U16>,
{
    let Ok(cipher) = C::new_from_slice(key) else {
        return false;
    };

    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(iv),
            b"",
            buffer,
            GenericArray::from_slice(tag),
        )
        .is_ok()
}

// ============================================================================
// TESTS
// ============================================================================
