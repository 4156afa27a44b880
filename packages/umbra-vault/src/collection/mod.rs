//! # Collections
//!
//! A collection is a named set of documents stored as encrypted messages in
//! one remote channel.
//!
//! ## Reading
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              SCAN                                       │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. Cache pass (live sync only)                                         │
//! │     ┌──────────────┐                                                   │
//! │     │ cached msgs  │──► visitor ──► Stop? ──► done, no network          │
//! │     └──────────────┘                                                   │
//! │                                                                         │
//! │  2. Page loop, newest to oldest, starting after the cursor              │
//! │     ┌──────────────┐                                                   │
//! │     │ list(before) │──► merge into cache, move cursor                   │
//! │     └──────┬───────┘──► visitor ──► Stop? ──► done                      │
//! │            │                                                            │
//! │            └── empty or short page ──► history exhausted                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages are decoded lazily, only when a visitor asks for documents.
//! Anything that fails to decode (foreign content, wrong key, tampering) is
//! skipped.
//!
//! ## Writing
//!
//! Creates and updates strip `id`, encrypt the body and post or patch the
//! envelope. Batch updates and deletes run one document at a time and are
//! not atomic: an error stops the batch and earlier writes stay.

mod cache;

pub use cache::CacheStatus;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::channel::{ListQuery, RawMessage};
use crate::config::MAX_PAGE_SIZE;
use crate::document::{Document, Filter, UpdateOperators, ID_FIELD};
use crate::error::{Error, Result};
use crate::store::StoreContext;
use cache::CacheState;

/// Returned by scan visitors to continue or end a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    /// Fetch the next page
    Continue,
    /// End the scan
    Stop,
}

/// One batch of messages handed to a scan visitor
pub struct Page<'a> {
    collection: &'a Collection,
    messages: Vec<RawMessage>,
}

impl Page<'_> {
    /// Raw messages in this batch
    pub fn messages(&self) -> &[RawMessage] {
        &self.messages
    }

    /// Decoded documents in this batch; undecodable messages are skipped
    pub fn documents(&self) -> impl Iterator<Item = Document> + '_ {
        self.messages
            .iter()
            .filter_map(|message| self.collection.decode(message))
    }
}

/// A named set of encrypted documents bound to one channel
pub struct Collection {
    name: String,
    channel_id: String,
    context: Arc<StoreContext>,
    cache: Mutex<CacheState>,
    /// Serializes read-modify-write cycles issued through this handle
    writes: tokio::sync::Mutex<()>,
}

impl Collection {
    pub(crate) fn new(
        name: impl Into<String>,
        channel_id: impl Into<String>,
        context: Arc<StoreContext>,
    ) -> Self {
        Self {
            name: name.into(),
            channel_id: channel_id.into(),
            context,
            cache: Mutex::new(CacheState::default()),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channel holding this collection's messages
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Current cache counters
    pub fn cache_status(&self) -> CacheStatus {
        self.cache.lock().status()
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Encrypt and store a new document
    ///
    /// `data` must serialize to a JSON object. Any `id` it carries is
    /// replaced by the id the channel assigns.
    pub async fn create<T: Serialize + ?Sized>(&self, data: &T) -> Result<Document> {
        self.ensure_ready()?;

        let Value::Object(mut fields) = serde_json::to_value(data)? else {
            return Err(Error::InvalidDocument(
                "documents must serialize to a JSON object".into(),
            ));
        };
        fields.retain(|key, _| key != ID_FIELD);

        let content = self.context.seal(&fields)?;
        let message = self
            .context
            .transport()
            .post_message(&self.channel_id, &content)
            .await?;

        let document = Document::from_parts(message.id.clone(), fields);
        debug!(collection = %self.name, id = %message.id, "Created document");

        if self.context.is_caching() {
            self.cache.lock().store(message, document.clone());
        }

        Ok(document)
    }

    // ========================================================================
    // READ
    // ========================================================================

    /// Fetch one document by id
    ///
    /// Missing, undecryptable and malformed messages all read as `None`.
    /// So do transport failures, which are logged.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        self.ensure_ready()?;

        match self.fetch_by_id(id).await {
            Ok(document) => Ok(document),
            Err(e) => {
                warn!(collection = %self.name, id, error = %e, "Failed to fetch document");
                Ok(None)
            }
        }
    }

    /// Every decodable document
    pub async fn find_all(&self) -> Result<Vec<Document>> {
        self.ensure_ready()?;
        self.collect(&Filter::all(), None).await
    }

    /// Every document matching `filter`
    pub async fn find_by(&self, filter: &Filter) -> Result<Vec<Document>> {
        self.ensure_ready()?;
        self.collect(filter, None).await
    }

    /// The first document matching `filter`, stopping the scan there
    pub async fn find_first(&self, filter: &Filter) -> Result<Option<Document>> {
        self.ensure_ready()?;
        Ok(self.collect(filter, Some(1)).await?.into_iter().next())
    }

    /// Walk the collection with a custom visitor
    ///
    /// Pages of `page_size` messages are fetched until the visitor returns
    /// [`ScanControl::Stop`] or the history runs out. `page_size` is clamped
    /// to `1..=MAX_PAGE_SIZE`.
    pub async fn scan<F>(&self, page_size: usize, visitor: F) -> Result<()>
    where
        F: FnMut(&Page<'_>) -> ScanControl + Send,
    {
        self.ensure_ready()?;
        self.scan_inner(page_size, visitor).await
    }

    // ========================================================================
    // UPDATE
    // ========================================================================

    /// Apply `operators` to one document
    ///
    /// Returns `None` when the document does not exist. An empty operator
    /// set returns the current document without writing.
    pub async fn update_by_id(
        &self,
        id: &str,
        operators: &UpdateOperators,
    ) -> Result<Option<Document>> {
        self.ensure_ready()?;
        operators.validate()?;

        let _write = self.writes.lock().await;

        let Some(current) = self.fetch_by_id(id).await? else {
            return Ok(None);
        };
        if operators.is_empty() {
            return Ok(Some(current));
        }

        self.write_update(&current, operators).await.map(Some)
    }

    /// Apply `operators` to every document matching `filter`
    pub async fn update_by(
        &self,
        filter: &Filter,
        operators: &UpdateOperators,
    ) -> Result<Vec<Document>> {
        self.ensure_ready()?;
        operators.validate()?;

        let targets = self.collect(filter, None).await?;
        if operators.is_empty() {
            return Ok(targets);
        }

        let mut updated = Vec::with_capacity(targets.len());
        for target in &targets {
            let _write = self.writes.lock().await;

            // Re-read under the lock; skip documents gone or no longer matching
            let Some(current) = self.fetch_by_id(target.id()).await? else {
                continue;
            };
            if !filter.matches(&current) {
                continue;
            }
            updated.push(self.write_update(&current, operators).await?);
        }

        debug!(collection = %self.name, count = updated.len(), "Updated documents");
        Ok(updated)
    }

    /// Apply `operators` to every document
    pub async fn update_all(&self, operators: &UpdateOperators) -> Result<Vec<Document>> {
        self.update_by(&Filter::all(), operators).await
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Delete one document
    ///
    /// Transport failures are logged and reported as `false`.
    pub async fn delete_by_id(&self, id: &str) -> Result<bool> {
        self.ensure_ready()?;
        Ok(self.remove(id).await)
    }

    /// Delete every document matching `filter`, returning how many went away
    pub async fn delete_by(&self, filter: &Filter) -> Result<usize> {
        self.ensure_ready()?;

        let targets = self.collect(filter, None).await?;
        let mut deleted = 0;
        for document in &targets {
            if self.remove(document.id()).await {
                deleted += 1;
            }
        }

        debug!(collection = %self.name, deleted, "Deleted documents");
        Ok(deleted)
    }

    /// Delete every document
    pub async fn delete_all(&self) -> Result<usize> {
        self.delete_by(&Filter::all()).await
    }

    // ========================================================================
    // PUSH FEED HOOKS
    // ========================================================================

    /// Replace a cached message with pushed content
    ///
    /// Content that does not decode evicts the entry instead.
    pub(crate) fn apply_remote_upsert(&self, message: RawMessage) -> Result<()> {
        self.ensure_caching()?;

        let document = self.context.open(&message);
        let mut cache = self.cache.lock();
        match document {
            Some(document) => cache.store(message, document),
            None => {
                cache.evict(&message.id);
            }
        }
        Ok(())
    }

    /// Forget a message deleted remotely
    pub(crate) fn apply_remote_delete(&self, id: &str) -> Result<()> {
        self.ensure_caching()?;
        self.cache.lock().evict(id);
        Ok(())
    }

    /// Walk the full history into the cache
    pub(crate) async fn warm(&self) -> Result<()> {
        self.scan_inner(self.context.page_size(), |_| ScanControl::Continue)
            .await?;

        let status = self.cache_status();
        info!(
            collection = %self.name,
            messages = status.messages,
            "Collection cache warmed"
        );
        Ok(())
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn ensure_ready(&self) -> Result<()> {
        if !self.context.is_ready() {
            return Err(Error::NotReady);
        }
        Ok(())
    }

    fn ensure_caching(&self) -> Result<()> {
        if !self.context.is_caching() {
            return Err(Error::CacheDisabled(self.name.clone()));
        }
        Ok(())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Document>> {
        let caching = self.context.is_caching();

        if caching {
            let cached = self.cache.lock().document(id);
            if cached.is_some() {
                return Ok(cached);
            }
        }

        let message = match self.context.transport().get_message(&self.channel_id, id).await {
            Ok(Some(message)) => message,
            Ok(None) | Err(Error::MessageNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        if caching {
            self.cache.lock().merge(message.clone());
        }

        Ok(self.decode(&message))
    }

    fn decode(&self, message: &RawMessage) -> Option<Document> {
        let caching = self.context.is_caching();

        if caching {
            let cached = self.cache.lock().document_for(message);
            if cached.is_some() {
                return cached;
            }
        }

        let document = self.context.open(message)?;
        if caching {
            self.cache.lock().store_document(message, document.clone());
        }
        Some(document)
    }

    async fn collect(&self, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>> {
        let mut found = Vec::new();

        self.scan_inner(self.context.page_size(), |page| {
            for document in page.documents() {
                if !filter.matches(&document) {
                    continue;
                }
                found.push(document);
                if limit.is_some_and(|limit| found.len() >= limit) {
                    return ScanControl::Stop;
                }
            }
            ScanControl::Continue
        })
        .await?;

        Ok(found)
    }

    async fn scan_inner<F>(&self, page_size: usize, mut visitor: F) -> Result<()>
    where
        F: FnMut(&Page<'_>) -> ScanControl + Send,
    {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let caching = self.context.is_caching();

        let mut cursor = None;
        let mut exhausted = false;
        let mut delivered = HashSet::new();

        if caching {
            let (cached, saved_cursor, saved_exhausted) = {
                let cache = self.cache.lock();
                (cache.messages(), cache.cursor(), cache.is_exhausted())
            };
            cursor = saved_cursor;
            exhausted = saved_exhausted;

            if !cached.is_empty() {
                let page = Page {
                    collection: self,
                    messages: cached,
                };
                if visitor(&page) == ScanControl::Stop {
                    return Ok(());
                }
                delivered.extend(page.messages.into_iter().map(|m| m.id));
            }
        }

        while !exhausted {
            let query = ListQuery::before(page_size, cursor.clone());
            let messages = self
                .context
                .transport()
                .list_messages(&self.channel_id, query)
                .await?;

            let Some(oldest) = messages.last().map(|m| m.id.clone()) else {
                if caching {
                    self.cache.lock().advance(cursor.as_deref(), None, true);
                }
                return Ok(());
            };
            exhausted = messages.len() < page_size;

            if caching {
                let mut cache = self.cache.lock();
                for message in &messages {
                    cache.merge(message.clone());
                }
                cache.advance(cursor.as_deref(), Some(oldest.clone()), exhausted);
            }
            cursor = Some(oldest);

            let fresh: Vec<_> = messages
                .into_iter()
                .filter(|m| !delivered.contains(&m.id))
                .collect();
            if fresh.is_empty() {
                continue;
            }

            let page = Page {
                collection: self,
                messages: fresh,
            };
            if visitor(&page) == ScanControl::Stop {
                return Ok(());
            }
        }

        Ok(())
    }

    async fn write_update(
        &self,
        current: &Document,
        operators: &UpdateOperators,
    ) -> Result<Document> {
        let updated = operators.apply(current)?;
        let content = self.context.seal(&updated.body())?;

        let message = self
            .context
            .transport()
            .patch_message(&self.channel_id, updated.id(), &content)
            .await?;

        debug!(collection = %self.name, id = %message.id, "Updated document");

        if self.context.is_caching() {
            self.cache.lock().store(message, updated.clone());
        }

        Ok(updated)
    }

    async fn remove(&self, id: &str) -> bool {
        match self
            .context
            .transport()
            .delete_message(&self.channel_id, id)
            .await
        {
            Ok(()) => {
                if self.context.is_caching() {
                    self.cache.lock().evict(id);
                }
                debug!(collection = %self.name, id, "Deleted document");
                true
            }
            Err(e) => {
                warn!(collection = %self.name, id, error = %e, "Failed to delete document");
                false
            }
        }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("channel_id", &self.channel_id)
            .field("cache", &self.cache_status())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelTransport, MemoryChannel};
    use crate::crypto::{Algorithm, EncryptionKey, Envelope};
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const CHANNEL: &str = "users";

    struct Fixture {
        channel: Arc<MemoryChannel>,
        context: Arc<StoreContext>,
        users: Collection,
    }

    fn fixture(caching: bool, page_size: usize) -> Fixture {
        let channel = Arc::new(MemoryChannel::new());
        let context = Arc::new(StoreContext::new(
            channel.clone(),
            EncryptionKey::from_bytes(vec![7u8; 32]),
            Algorithm::Aes256Gcm,
            page_size,
            None,
        ));
        context.set_caching(caching);
        context.set_ready(true);

        let users = Collection::new("users", CHANNEL, context.clone());
        Fixture {
            channel,
            context,
            users,
        }
    }

    async fn seed(users: &Collection, names: &[&str]) -> Vec<Document> {
        let mut created = Vec::new();
        for (i, name) in names.iter().enumerate() {
            created.push(
                users
                    .create(&json!({"username": name, "coins": (i as u64 + 1) * 100}))
                    .await
                    .unwrap(),
            );
        }
        created
    }

    #[tokio::test]
    async fn test_end_to_end_lifecycle() {
        let f = fixture(false, 100);

        let created = f.users.create(&json!({"username": "a", "coins": 100})).await.unwrap();
        assert_eq!(created.id(), "m1");
        assert_eq!(created.into_value(), json!({"id": "m1", "username": "a", "coins": 100}));

        let found = f.users.find_by_id("m1").await.unwrap().unwrap();
        assert_eq!(found.get("username"), Some(&json!("a")));

        let updated = f
            .users
            .update_by_id("m1", &UpdateOperators::new().inc("coins", 50))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("coins"), Some(&json!(150)));

        let reread = f.users.find_by_id("m1").await.unwrap().unwrap();
        assert_eq!(reread, updated);

        assert!(f.users.delete_by_id("m1").await.unwrap());
        assert_eq!(f.users.find_by_id("m1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_not_ready() {
        let f = fixture(false, 100);
        f.context.set_ready(false);

        assert!(matches!(f.users.find_all().await, Err(Error::NotReady)));
        assert!(matches!(f.users.create(&json!({})).await, Err(Error::NotReady)));
        assert!(matches!(f.users.delete_by_id("m1").await, Err(Error::NotReady)));
    }

    #[tokio::test]
    async fn test_create_rejects_non_objects() {
        let f = fixture(false, 100);

        let err = f.users.create(&json!([1, 2])).await.unwrap_err();
        assert_eq!(err.code(), 402);
        assert_eq!(f.channel.message_count(CHANNEL), 0);
    }

    #[tokio::test]
    async fn test_create_ignores_supplied_id() {
        let f = fixture(false, 100);

        let doc = f.users.create(&json!({"id": "mine", "x": 1})).await.unwrap();
        assert_eq!(doc.id(), "m1");

        let stored = f.channel.get_message(CHANNEL, "m1").await.unwrap().unwrap();
        let plaintext = Envelope::parse(&stored.content)
            .and_then(|e| e.open(&EncryptionKey::from_bytes(vec![7u8; 32]), Algorithm::Aes256Gcm))
            .unwrap();
        assert_eq!(plaintext, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn test_stored_content_is_an_envelope() {
        let f = fixture(false, 100);
        f.users.create(&json!({"secret": "hunter2"})).await.unwrap();

        let stored = f.channel.get_message(CHANNEL, "m1").await.unwrap().unwrap();
        let envelope: Value = serde_json::from_str(&stored.content).unwrap();

        assert!(envelope.get("ciphertext").is_some());
        assert!(envelope.get("iv").is_some());
        assert!(envelope.get("authTag").is_some());
        assert!(!stored.content.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_find_skips_undecodable_messages() {
        let f = fixture(false, 100);
        seed(&f.users, &["a", "b"]).await;
        let foreign = f.channel.push_raw(CHANNEL, "hello from a human");
        f.channel
            .push_raw(CHANNEL, r#"{"ciphertext":"AAAA","iv":"AAAAAAAAAAAAAAAA","authTag":"AAAA"}"#);

        let all = assert_ok!(f.users.find_all().await);
        assert_eq!(all.len(), 2);

        assert_eq!(f.users.find_by_id(&foreign.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_by_id_reads_transport_failure_as_absent() {
        let f = fixture(false, 100);
        seed(&f.users, &["a"]).await;
        f.channel.set_offline(true);

        assert_eq!(assert_ok!(f.users.find_by_id("m1").await), None);

        // Updates still surface the failure
        let err = assert_err!(
            f.users
                .update_by_id("m1", &UpdateOperators::new().set("x", 1))
                .await
        );
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_find_by_pattern_and_predicate() {
        let f = fixture(false, 2);
        seed(&f.users, &["a", "b", "c", "A"]).await;

        let exact = f.users.find_by(&Filter::field("username", "a")).await.unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].id(), "m1");

        let rich = f
            .users
            .find_by(&Filter::predicate(|d| {
                d.get("coins").and_then(Value::as_u64).unwrap_or(0) >= 300
            }))
            .await
            .unwrap();
        let ids: Vec<_> = rich.iter().map(Document::id).collect();
        assert_eq!(ids, ["m4", "m3"]);
    }

    #[tokio::test]
    async fn test_find_first_stops_paging() {
        let f = fixture(false, 2);
        seed(&f.users, &["a", "b", "c", "d", "e"]).await;

        let newest = f.users.find_first(&Filter::all()).await.unwrap().unwrap();
        assert_eq!(newest.id(), "m5");
        assert_eq!(f.channel.list_calls(), 1);

        let missing = f.users.find_first(&Filter::field("username", "zz")).await.unwrap();
        assert_eq!(missing, None);
        // 2 + 2 + 1 messages, the short page ends the walk
        assert_eq!(f.channel.list_calls(), 4);
    }

    #[tokio::test]
    async fn test_cache_pass_short_circuits() {
        let f = fixture(true, 100);
        seed(&f.users, &["a", "b", "c"]).await;

        let second = f.users.find_first(&Filter::field("username", "b")).await.unwrap();
        assert_eq!(second.map(|d| d.id().to_string()), Some("m2".to_string()));
        assert_eq!(f.channel.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_pass_is_not_repeated_by_paging() {
        let f = fixture(true, 100);
        seed(&f.users, &["a", "b", "c"]).await;

        let all = f.users.find_all().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(f.channel.list_calls(), 1);

        let status = f.users.cache_status();
        assert!(status.exhausted);
        assert_eq!(status.cursor.as_deref(), Some("m1"));

        // Warm and exhausted: served from the cache alone
        assert_eq!(f.users.find_all().await.unwrap().len(), 3);
        assert_eq!(f.channel.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_after_full_then_empty_page() {
        let f = fixture(true, 2);
        f.context.set_caching(false);
        seed(&f.users, &["a", "b"]).await;
        f.context.set_caching(true);

        f.users.find_all().await.unwrap();

        let status = f.users.cache_status();
        assert!(status.exhausted);
        assert_eq!(status.messages, 2);
        assert_eq!(f.channel.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_after_short_page() {
        let f = fixture(true, 2);
        f.context.set_caching(false);
        seed(&f.users, &["a", "b", "c"]).await;
        f.context.set_caching(true);

        f.users.find_all().await.unwrap();

        let status = f.users.cache_status();
        assert!(status.exhausted);
        assert_eq!(status.messages, 3);
        assert_eq!(status.cursor.as_deref(), Some("m1"));
        assert_eq!(f.channel.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_early_stop_resumes_from_cursor() {
        let f = fixture(true, 2);
        f.context.set_caching(false);
        seed(&f.users, &["a", "b", "c", "d", "e"]).await;
        f.context.set_caching(true);

        let first = f.users.find_first(&Filter::all()).await.unwrap().unwrap();
        assert_eq!(first.id(), "m5");
        assert_eq!(f.users.cache_status().cursor.as_deref(), Some("m4"));

        let all = f.users.find_all().await.unwrap();
        let ids: Vec<_> = all.iter().map(Document::id).collect();
        assert_eq!(ids, ["m5", "m4", "m3", "m2", "m1"]);
    }

    #[tokio::test]
    async fn test_scan_visitor() {
        let f = fixture(false, 2);
        seed(&f.users, &["a", "b", "c"]).await;

        let mut pages = Vec::new();
        f.users
            .scan(2, |page| {
                pages.push(page.messages().len());
                ScanControl::Continue
            })
            .await
            .unwrap();

        assert_eq!(pages, [2, 1]);
    }

    #[tokio::test]
    async fn test_update_empty_operators_skips_write() {
        let f = fixture(false, 100);
        seed(&f.users, &["a"]).await;
        let before = f.channel.get_message(CHANNEL, "m1").await.unwrap().unwrap();

        let doc = f
            .users
            .update_by_id("m1", &UpdateOperators::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.get("username"), Some(&json!("a")));

        let after = f.channel.get_message(CHANNEL, "m1").await.unwrap().unwrap();
        assert_eq!(before.content, after.content);
    }

    #[tokio::test]
    async fn test_update_missing_and_reserved() {
        let f = fixture(false, 100);
        seed(&f.users, &["a"]).await;

        let missing = f
            .users
            .update_by_id("m42", &UpdateOperators::new().set("x", 1))
            .await
            .unwrap();
        assert_eq!(missing, None);

        let err = f
            .users
            .update_by_id("m1", &UpdateOperators::new().set("id", "m9"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ReservedField(_)));

        let err = f
            .users
            .update_by_id("m1", &UpdateOperators::new().inc("username", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotNumeric(_)));
    }

    #[tokio::test]
    async fn test_update_by_and_all() {
        let f = fixture(false, 100);
        seed(&f.users, &["someone", "other", "someone"]).await;

        let ops = UpdateOperators::new().inc("coins", 50).set("premium", true);
        let updated = f
            .users
            .update_by(&Filter::field("username", "someone"), &ops)
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);

        let premium = f.users.find_by(&Filter::field("premium", true)).await.unwrap();
        let coins: Vec<_> = premium.iter().map(|d| d.get("coins").cloned()).collect();
        assert_eq!(coins, [Some(json!(350)), Some(json!(150))]);

        let all = f
            .users
            .update_all(&UpdateOperators::new().push("tags", "v2"))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|d| d.get("tags") == Some(&json!(["v2"]))));
    }

    #[tokio::test]
    async fn test_update_by_is_best_effort() {
        let f = fixture(false, 100);
        f.users.create(&json!({"n": 1})).await.unwrap();
        f.users.create(&json!({"n": "two"})).await.unwrap();
        f.users.create(&json!({"n": 3})).await.unwrap();

        // Newest first: m3 succeeds, m2 fails, m1 is never reached
        let err = f
            .users
            .update_all(&UpdateOperators::new().inc("n", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotNumeric(_)));

        let m3 = f.users.find_by_id("m3").await.unwrap().unwrap();
        let m1 = f.users.find_by_id("m1").await.unwrap().unwrap();
        assert_eq!(m3.get("n"), Some(&json!(13)));
        assert_eq!(m1.get("n"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_delete_by_and_all() {
        let f = fixture(true, 100);
        seed(&f.users, &["a", "b", "a", "c"]).await;

        assert_eq!(f.users.delete_by(&Filter::field("username", "a")).await.unwrap(), 2);
        assert_eq!(f.channel.message_count(CHANNEL), 2);
        assert_eq!(f.users.cache_status().messages, 2);

        assert_eq!(f.users.delete_all().await.unwrap(), 2);
        assert!(f.users.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_failure_as_false() {
        let f = fixture(false, 100);

        assert!(!f.users.delete_by_id("m1").await.unwrap());

        seed(&f.users, &["a"]).await;
        f.channel.set_offline(true);
        assert!(!f.users.delete_by_id("m1").await.unwrap());
    }

    #[tokio::test]
    async fn test_content_limit() {
        let channel = Arc::new(MemoryChannel::new());
        let context = Arc::new(StoreContext::new(
            channel.clone(),
            EncryptionKey::from_bytes(vec![7u8; 32]),
            Algorithm::Aes256Gcm,
            100,
            Some(120),
        ));
        context.set_ready(true);
        let users = Collection::new("users", CHANNEL, context);

        assert_ok!(users.create(&json!({"a": 1})).await);

        let err = users
            .create(&json!({"bio": "x".repeat(200)}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ContentTooLarge { max: 120, .. }));
        assert_eq!(channel.message_count(CHANNEL), 1);
    }

    #[tokio::test]
    async fn test_remote_hooks() {
        let f = fixture(true, 100);
        let docs = seed(&f.users, &["a"]).await;

        // A remote edit replaces the cached document
        let sealed = f
            .context
            .seal(&json!({"username": "edited"}).as_object().cloned().unwrap())
            .unwrap();
        let edited = f.channel.patch_message(CHANNEL, docs[0].id(), &sealed).await.unwrap();
        f.users.apply_remote_upsert(edited).unwrap();

        let doc = f.users.find_by_id("m1").await.unwrap().unwrap();
        assert_eq!(doc.get("username"), Some(&json!("edited")));
        assert_eq!(f.channel.get_calls(), 0);

        // Undecodable pushed content evicts
        let garbage = f.channel.patch_message(CHANNEL, "m1", "garbage").await.unwrap();
        f.users.apply_remote_upsert(garbage).unwrap();
        assert_eq!(f.users.cache_status().messages, 0);

        f.users.apply_remote_delete("m1").unwrap();
    }

    #[tokio::test]
    async fn test_remote_hooks_require_caching() {
        let f = fixture(false, 100);

        assert!(matches!(
            f.users.apply_remote_delete("m1"),
            Err(Error::CacheDisabled(_))
        ));
    }

    /// Wraps a `MemoryChannel` with a page cap and an optional edit that
    /// lands right after the next listing
    struct WrappedChannel {
        inner: Arc<MemoryChannel>,
        page_cap: usize,
        edit_after_list: Mutex<Option<(String, String)>>,
    }

    impl WrappedChannel {
        fn new(inner: Arc<MemoryChannel>, page_cap: usize) -> Self {
            Self {
                inner,
                page_cap,
                edit_after_list: Mutex::new(None),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChannelTransport for WrappedChannel {
        async fn get_message(
            &self,
            channel_id: &str,
            message_id: &str,
        ) -> Result<Option<RawMessage>> {
            self.inner.get_message(channel_id, message_id).await
        }

        async fn list_messages(
            &self,
            channel_id: &str,
            mut query: ListQuery,
        ) -> Result<Vec<RawMessage>> {
            query.limit = query.limit.min(self.page_cap);
            let messages = self.inner.list_messages(channel_id, query).await?;

            let edit = self.edit_after_list.lock().take();
            if let Some((id, content)) = edit {
                self.inner.patch_message(channel_id, &id, &content).await?;
            }
            Ok(messages)
        }

        async fn post_message(&self, channel_id: &str, content: &str) -> Result<RawMessage> {
            self.inner.post_message(channel_id, content).await
        }

        async fn patch_message(
            &self,
            channel_id: &str,
            message_id: &str,
            content: &str,
        ) -> Result<RawMessage> {
            self.inner.patch_message(channel_id, message_id, content).await
        }

        async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
            self.inner.delete_message(channel_id, message_id).await
        }
    }

    fn wrapped_fixture(
        page_cap: usize,
    ) -> (
        Arc<MemoryChannel>,
        Arc<WrappedChannel>,
        Arc<StoreContext>,
        Collection,
    ) {
        let channel = Arc::new(MemoryChannel::new());
        let wrapped = Arc::new(WrappedChannel::new(channel.clone(), page_cap));
        let context = Arc::new(StoreContext::new(
            wrapped.clone(),
            EncryptionKey::from_bytes(vec![7u8; 32]),
            Algorithm::Aes256Gcm,
            MAX_PAGE_SIZE,
            None,
        ));
        context.set_ready(true);
        let users = Collection::new("users", CHANNEL, context.clone());
        (channel, wrapped, context, users)
    }

    #[tokio::test]
    async fn test_oversized_scan_does_not_exhaust_early() {
        let (_, _, context, users) = wrapped_fixture(MAX_PAGE_SIZE);

        for i in 0..150 {
            users.create(&json!({"n": i})).await.unwrap();
        }
        context.set_caching(true);

        let mut seen = 0;
        users
            .scan(200, |page| {
                seen += page.messages().len();
                ScanControl::Stop
            })
            .await
            .unwrap();
        assert_eq!(seen, MAX_PAGE_SIZE);
        assert!(!users.cache_status().exhausted);

        assert_eq!(users.find_all().await.unwrap().len(), 150);
        assert!(users.cache_status().exhausted);
    }

    #[tokio::test]
    async fn test_update_by_skips_targets_edited_after_scan() {
        let (channel, wrapped, context, users) = wrapped_fixture(MAX_PAGE_SIZE);
        seed(&users, &["a", "a"]).await;

        // m1 stops matching between the scan and its write
        let renamed = context
            .seal(&json!({"username": "b", "coins": 100}).as_object().cloned().unwrap())
            .unwrap();
        *wrapped.edit_after_list.lock() = Some(("m1".into(), renamed.clone()));

        let updated = users
            .update_by(&Filter::field("username", "a"), &UpdateOperators::new().inc("coins", 1))
            .await
            .unwrap();

        let ids: Vec<_> = updated.iter().map(Document::id).collect();
        assert_eq!(ids, ["m2"]);
        assert_eq!(updated[0].get("coins"), Some(&json!(201)));

        let m1 = channel.get_message(CHANNEL, "m1").await.unwrap().unwrap();
        assert_eq!(m1.content, renamed);
    }
}
