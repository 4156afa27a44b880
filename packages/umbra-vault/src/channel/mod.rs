//! # Channels
//!
//! The remote side of the vault: append-only message channels, paginated
//! newest first.
//!
//! ## Transport Contract
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         CHANNEL TRANSPORT                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  get_message(channel, id)         ──► Some(message) | None              │
//! │  list_messages(channel, query)    ──► up to `limit` messages, newest    │
//! │                                       first, older than `before`        │
//! │  post_message(channel, content)   ──► message with a fresh id           │
//! │  patch_message(channel, id, body) ──► message with replaced content     │
//! │  delete_message(channel, id)      ──► ()                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Message content is opaque to the channel. The vault only ever writes
//! envelope JSON into it, but channels may also carry foreign messages.

mod events;
mod memory;

pub use events::FeedEvent;
pub use memory::MemoryChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One message as stored by the remote channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Channel-assigned message id
    pub id: String,
    /// Channel the message lives in
    pub channel_id: String,
    /// Opaque payload
    pub content: String,
}

/// Page request for [`ChannelTransport::list_messages`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Maximum number of messages to return
    pub limit: usize,
    /// Only return messages older than this id
    pub before: Option<String>,
}

impl ListQuery {
    /// The newest `limit` messages
    pub fn latest(limit: usize) -> Self {
        Self { limit, before: None }
    }

    /// Up to `limit` messages older than `before`
    pub fn before(limit: usize, before: Option<String>) -> Self {
        Self { limit, before }
    }
}

/// Access to a remote message channel
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Fetch one message, `None` if the channel has no message with this id
    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<Option<RawMessage>>;

    /// Fetch one page of history, newest first
    async fn list_messages(&self, channel_id: &str, query: ListQuery) -> Result<Vec<RawMessage>>;

    /// Append a message
    async fn post_message(&self, channel_id: &str, content: &str) -> Result<RawMessage>;

    /// Replace the content of an existing message
    async fn patch_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<RawMessage>;

    /// Delete a message
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()>;
}
