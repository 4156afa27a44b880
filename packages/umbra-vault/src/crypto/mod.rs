//! # Cryptography Module
//!
//! Symmetric authenticated encryption for stored documents.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CRYPTOGRAPHIC LAYOUT                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   Passphrase ──► Argon2id (kdf.rs) ──┐                                  │
//! │                                      ├──► EncryptionKey                 │
//! │   Raw key bytes (config) ────────────┘         │                        │
//! │                                                ▼                        │
//! │   Document JSON ──► AES-GCM (encryption.rs) ──► Envelope               │
//! │                                                 {ciphertext, iv,        │
//! │                                                  authTag}               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One key and one algorithm are shared by every collection of a store.

mod encryption;
mod kdf;

pub use encryption::{decrypt, encrypt, Algorithm, EncryptionKey, Envelope, IV_SIZE, TAG_SIZE};
pub use kdf::{derive_default_key, derive_key, DEFAULT_KEY_LENGTH, DEFAULT_SALT};
