//! # Umbra Vault
//!
//! An encrypted document store layered on paginated, append-only message
//! channels. Every document is one message whose content is an AES-GCM
//! envelope; the channel never sees plaintext.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         UMBRA VAULT MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐                                                       │
//! │  │    Store    │  config, lifecycle, feed-event routing                │
//! │  └──────┬──────┘                                                       │
//! │         │ one per channel                                               │
//! │  ┌──────▼──────┐  ┌─────────────┐  ┌─────────────┐                     │
//! │  │ Collection  │──│  Document   │  │   Crypto    │                     │
//! │  │             │  │             │  │             │                     │
//! │  │ - CRUD      │  │ - Paths     │  │ - AES-GCM   │                     │
//! │  │ - Scan      │  │ - Updates   │  │ - Argon2id  │                     │
//! │  │ - Cache     │  │ - Filters   │  │ - Envelope  │                     │
//! │  └──────┬──────┘  └─────────────┘  └─────────────┘                     │
//! │         │                                                               │
//! │  ┌──────▼──────────────────────────────────────────┐                   │
//! │  │                    Channel                       │                   │
//! │  │  ChannelTransport trait, MemoryChannel, events   │                   │
//! │  └──────────────────────────────────────────────────┘                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Store configuration and environment loading
//! - [`crypto`] - Envelope encryption and key derivation
//! - [`document`] - Documents, dot paths, update operators, filters
//! - [`channel`] - Remote channel transport and push-feed events
//! - [`collection`] - Per-channel CRUD, history scans, live-sync cache
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use umbra_vault::{EncryptionKey, Filter, MemoryChannel, Store, StoreConfig, UpdateOperators};
//!
//! # async fn run() -> umbra_vault::Result<()> {
//! let key = EncryptionKey::generate(Default::default());
//! let config = StoreConfig::new(key).with_collection("users", "channel-1");
//! let store = Store::new(config, Arc::new(MemoryChannel::new()))?;
//! store.start().await?;
//!
//! let users = store.collection("users")?;
//! let user = users.create(&json!({"username": "someone", "coins": 100})).await?;
//! users
//!     .update_by_id(user.id(), &UpdateOperators::new().inc("coins", 50))
//!     .await?;
//! let rich = users.find_by(&Filter::field("coins", 150)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Message does not decrypt or parse | skipped / `None` |
//! | Update touches `id`, `$inc` on a non-number | error |
//! | Transport failure on create or update | error |
//! | Transport failure on delete | `false` |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod channel;
pub mod collection;
pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
mod store;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use channel::{ChannelTransport, FeedEvent, ListQuery, MemoryChannel, RawMessage};
pub use collection::{CacheStatus, Collection, Page, ScanControl};
pub use config::{CollectionConfig, StoreConfig};
pub use crypto::{derive_key, Algorithm, EncryptionKey, Envelope};
pub use document::{apply_update, Document, Filter, UpdateOperators};
pub use error::{Error, Result};
pub use store::Store;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================
