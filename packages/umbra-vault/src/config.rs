//! # Configuration
//!
//! Everything a [`Store`](crate::Store) needs: the key, the cipher, and
//! which collection lives in which channel.
//!
//! ## Environment
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `VAULT_KEY` | base64 key bytes | one of key / passphrase required |
//! | `VAULT_PASSPHRASE` | passphrase, derived with Argon2id | |
//! | `VAULT_SALT` | salt for the passphrase | `umbra-vault-v1` |
//! | `VAULT_ALGORITHM` | `aes-128-gcm`, `aes-192-gcm`, `aes-256-gcm` | `aes-256-gcm` |
//! | `VAULT_COLLECTIONS` | `name=channel,name=channel` | required |
//! | `VAULT_PAGE_SIZE` | messages per history page, 1 to 100 | `100` |
//! | `VAULT_LIVE_SYNC` | `true` / `false` | `false` |
//! | `VAULT_MAX_CONTENT_LENGTH` | maximum message content length | unlimited |

use std::collections::HashSet;

use crate::crypto::{derive_key, Algorithm, EncryptionKey, DEFAULT_SALT};
use crate::error::{Error, Result};

/// Largest page the remote channel serves
pub const MAX_PAGE_SIZE: usize = 100;

/// Binding of a collection name to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionConfig {
    /// Name used to look the collection up
    pub name: String,
    /// Channel holding its messages
    pub channel_id: String,
}

impl CollectionConfig {
    /// Bind `name` to `channel_id`
    pub fn new(name: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel_id: channel_id.into(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Key shared by every collection
    pub key: EncryptionKey,
    /// Cipher; must match the key length
    pub algorithm: Algorithm,
    /// Collections and their channels
    pub collections: Vec<CollectionConfig>,
    /// Messages requested per history page
    pub page_size: usize,
    /// Keep a local cache warmed at start and fed by push events
    pub live_sync: bool,
    /// Reject writes whose message content would exceed this length
    pub max_content_length: Option<usize>,
}

impl StoreConfig {
    /// Configuration with defaults and no collections
    pub fn new(key: EncryptionKey) -> Self {
        Self {
            key,
            algorithm: Algorithm::default(),
            collections: Vec::new(),
            page_size: MAX_PAGE_SIZE,
            live_sync: false,
            max_content_length: None,
        }
    }

    /// Add a collection
    pub fn with_collection(mut self, name: impl Into<String>, channel_id: impl Into<String>) -> Self {
        self.collections.push(CollectionConfig::new(name, channel_id));
        self
    }

    /// Set the cipher
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the history page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enable or disable live sync
    pub fn with_live_sync(mut self, live_sync: bool) -> Self {
        self.live_sync = live_sync;
        self
    }

    /// Cap the encoded message length
    pub fn with_max_content_length(mut self, max: usize) -> Self {
        self.max_content_length = Some(max);
        self
    }

    /// Check the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        self.key.check(self.algorithm)?;

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        let mut names = HashSet::new();
        let mut channels = HashSet::new();
        for collection in &self.collections {
            if collection.name.is_empty() || collection.channel_id.is_empty() {
                return Err(Error::InvalidConfig(
                    "collection name and channel id must not be empty".into(),
                ));
            }
            if !names.insert(collection.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate collection name: {}",
                    collection.name
                )));
            }
            if !channels.insert(collection.channel_id.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "channel {} is bound to more than one collection",
                    collection.channel_id
                )));
            }
        }

        Ok(())
    }

    /// Read the configuration from `VAULT_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Read the configuration through a variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let algorithm = match lookup("VAULT_ALGORITHM") {
            Some(name) => name.parse()?,
            None => Algorithm::default(),
        };

        let key = match (lookup("VAULT_KEY"), lookup("VAULT_PASSPHRASE")) {
            (Some(encoded), _) => EncryptionKey::from_base64(encoded.trim())?,
            (None, Some(passphrase)) => {
                let salt = lookup("VAULT_SALT")
                    .map(String::into_bytes)
                    .unwrap_or_else(|| DEFAULT_SALT.to_vec());
                derive_key(&passphrase, &salt, algorithm.key_len())?
            }
            (None, None) => {
                return Err(Error::InvalidConfig(
                    "set VAULT_KEY or VAULT_PASSPHRASE".into(),
                ))
            }
        };

        let collections = lookup("VAULT_COLLECTIONS")
            .ok_or_else(|| Error::InvalidConfig("VAULT_COLLECTIONS is not set".into()))
            .and_then(|raw| parse_collections(&raw))?;

        let mut config = Self::new(key).with_algorithm(algorithm);
        config.collections = collections;

        if let Some(raw) = lookup("VAULT_PAGE_SIZE") {
            config.page_size = parse_number("VAULT_PAGE_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("VAULT_LIVE_SYNC") {
            config.live_sync = parse_flag("VAULT_LIVE_SYNC", &raw)?;
        }
        if let Some(raw) = lookup("VAULT_MAX_CONTENT_LENGTH") {
            config.max_content_length = Some(parse_number("VAULT_MAX_CONTENT_LENGTH", &raw)?);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_collections(raw: &str) -> Result<Vec<CollectionConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, channel) = entry.split_once('=').ok_or_else(|| {
                Error::InvalidConfig(format!("expected name=channel, got {}", entry))
            })?;
            Ok(CollectionConfig::new(name.trim(), channel.trim()))
        })
        .collect()
}

fn parse_number(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{} must be a number, got {}", name, raw)))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidConfig(format!("{} must be true or false, got {}", name, raw))),
    }
}
