//! Per-collection cache used in live-sync mode.
//!
//! Raw messages and their decoded documents are kept side by side. A
//! decoded document is only trusted while the raw message it came from is
//! still the cached one, so merging new content for an id drops the old
//! document.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::channel::RawMessage;
use crate::document::Document;

/// Snapshot of a collection cache
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheStatus {
    /// Raw messages held
    pub messages: usize,
    /// Messages already decoded into documents
    pub documents: usize,
    /// Oldest message id walked so far
    pub cursor: Option<String>,
    /// Whether the full history has been walked
    pub exhausted: bool,
}

#[derive(Debug, Default)]
pub(crate) struct CacheState {
    messages: IndexMap<String, RawMessage>,
    documents: HashMap<String, Document>,
    cursor: Option<String>,
    exhausted: bool,
}

impl CacheState {
    pub fn cursor(&self) -> Option<String> {
        self.cursor.clone()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn messages(&self) -> Vec<RawMessage> {
        self.messages.values().cloned().collect()
    }

    /// Decoded document by id
    pub fn document(&self, id: &str) -> Option<Document> {
        self.documents.get(id).cloned()
    }

    /// Decoded document for exactly this message content
    pub fn document_for(&self, message: &RawMessage) -> Option<Document> {
        let cached = self.messages.get(&message.id)?;
        if cached.content != message.content {
            return None;
        }
        self.document(&message.id)
    }

    /// Insert or refresh a raw message
    pub fn merge(&mut self, message: RawMessage) {
        let changed = self
            .messages
            .get(&message.id)
            .map_or(true, |cached| cached.content != message.content);

        if changed {
            self.documents.remove(&message.id);
        }
        self.messages.insert(message.id.clone(), message);
    }

    /// Insert a message together with its decoded document
    pub fn store(&mut self, message: RawMessage, document: Document) {
        self.documents.insert(message.id.clone(), document);
        self.messages.insert(message.id.clone(), message);
    }

    /// Remember a decoded document if its message is still the cached one
    pub fn store_document(&mut self, message: &RawMessage, document: Document) {
        let current = self
            .messages
            .get(&message.id)
            .is_some_and(|cached| cached.content == message.content);

        if current {
            self.documents.insert(message.id.clone(), document);
        }
    }

    /// Drop everything known about a message
    pub fn evict(&mut self, id: &str) -> bool {
        self.documents.remove(id);
        self.messages.shift_remove(id).is_some()
    }

    /// Move the cursor from `from` to `to`
    ///
    /// Ignored when another scan already moved the cursor away from `from`.
    /// Exhaustion is sticky.
    pub fn advance(&mut self, from: Option<&str>, to: Option<String>, exhausted: bool) {
        if self.cursor.as_deref() != from {
            return;
        }
        if to.is_some() {
            self.cursor = to;
        }
        self.exhausted |= exhausted;
    }

    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            messages: self.messages.len(),
            documents: self.documents.len(),
            cursor: self.cursor.clone(),
            exhausted: self.exhausted,
        }
    }
}
