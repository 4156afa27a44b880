//! # In-Memory Channel
//!
//! A [`ChannelTransport`] that keeps every channel in process memory.
//!
//! Message ids are a prefix followed by a sequence number shared by all
//! channels (`m1`, `m2`, ...), so ordering by id matches posting order.
//! Besides backing tests and demos, it can inject foreign messages, go
//! offline on demand, and count read calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ChannelTransport, ListQuery, RawMessage};
use crate::error::{Error, Result};

const DEFAULT_PREFIX: &str = "m";

#[derive(Default)]
struct ChannelState {
    next_seq: u64,
    /// Per channel, oldest first
    channels: HashMap<String, Vec<(u64, RawMessage)>>,
    /// Every id ever issued, kept after deletion so stale cursors still resolve
    sequence_of: HashMap<String, u64>,
}

/// In-process channel transport
pub struct MemoryChannel {
    prefix: String,
    state: Mutex<ChannelState>,
    offline: AtomicBool,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MemoryChannel {
    /// Channel issuing ids `m1`, `m2`, ...
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    /// Channel issuing ids `{prefix}1`, `{prefix}2`, ...
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            state: Mutex::new(ChannelState::default()),
            offline: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
        }
    }

    /// Make every transport call fail with [`Error::TransportError`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Append a message with arbitrary content, bypassing the offline switch
    pub fn push_raw(&self, channel_id: &str, content: impl Into<String>) -> RawMessage {
        self.append(channel_id, content.into())
    }

    /// Number of `list_messages` calls served so far
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_message` calls served so far
    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of live messages in a channel
    pub fn message_count(&self, channel_id: &str) -> usize {
        self.state
            .lock()
            .channels
            .get(channel_id)
            .map_or(0, Vec::len)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::TransportError("channel is offline".into()));
        }
        Ok(())
    }

    fn append(&self, channel_id: &str, content: String) -> RawMessage {
        let mut state = self.state.lock();
        state.next_seq += 1;
        let seq = state.next_seq;

        let message = RawMessage {
            id: format!("{}{}", self.prefix, seq),
            channel_id: channel_id.to_string(),
            content,
        };

        state.sequence_of.insert(message.id.clone(), seq);
        state
            .channels
            .entry(channel_id.to_string())
            .or_default()
            .push((seq, message.clone()));

        message
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelTransport for MemoryChannel {
    async fn get_message(&self, channel_id: &str, message_id: &str) -> Result<Option<RawMessage>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let state = self.state.lock();
        Ok(state
            .channels
            .get(channel_id)
            .and_then(|messages| messages.iter().find(|(_, m)| m.id == message_id))
            .map(|(_, m)| m.clone()))
    }

    async fn list_messages(&self, channel_id: &str, query: ListQuery) -> Result<Vec<RawMessage>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let state = self.state.lock();
        let upper = match &query.before {
            Some(id) => *state
                .sequence_of
                .get(id)
                .ok_or_else(|| Error::MessageNotFound(id.clone()))?,
            None => u64::MAX,
        };

        let Some(messages) = state.channels.get(channel_id) else {
            return Ok(Vec::new());
        };

        Ok(messages
            .iter()
            .rev()
            .filter(|(seq, _)| *seq < upper)
            .take(query.limit)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn post_message(&self, channel_id: &str, content: &str) -> Result<RawMessage> {
        self.check_online()?;
        Ok(self.append(channel_id, content.to_string()))
    }

    async fn patch_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<RawMessage> {
        self.check_online()?;

        let mut state = self.state.lock();
        let message = state
            .channels
            .get_mut(channel_id)
            .and_then(|messages| messages.iter_mut().find(|(_, m)| m.id == message_id))
            .map(|(_, m)| m)
            .ok_or_else(|| Error::MessageNotFound(message_id.to_string()))?;

        message.content = content.to_string();
        Ok(message.clone())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.check_online()?;

        let mut state = self.state.lock();
        let messages = state
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| Error::MessageNotFound(message_id.to_string()))?;

        let position = messages
            .iter()
            .position(|(_, m)| m.id == message_id)
            .ok_or_else(|| Error::MessageNotFound(message_id.to_string()))?;

        messages.remove(position);
        Ok(())
    }
}
