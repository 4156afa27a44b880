//! # Store
//!
//! Owns the configuration, the transport and every collection.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           STORE LIFECYCLE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. Store::new(config, transport)                                       │
//! │     └─► validate config, build one Collection per channel               │
//! │                                                                         │
//! │  2. store.start().await                                                 │
//! │     ├─► live sync off: mark ready                                       │
//! │     └─► live sync on:  enable caches, walk every channel concurrently,  │
//! │                        then mark ready                                  │
//! │                                                                         │
//! │  3. store.collection("users")?.find_all().await                         │
//! │                                                                         │
//! │  4. store.handle_feed_event(event)   (live sync only)                   │
//! │     └─► routed by channel id to the owning collection's cache           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Collection operations fail with [`Error::NotReady`] until `start()` has
//! completed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{info, trace};

use crate::channel::{ChannelTransport, FeedEvent, RawMessage};
use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::crypto::{encrypt, Algorithm, EncryptionKey, Envelope};
use crate::document::Document;
use crate::error::{Error, Result};

// ============================================================================
// SHARED CONTEXT
// ============================================================================

/// State shared by a store and its collections
pub(crate) struct StoreContext {
    transport: Arc<dyn ChannelTransport>,
    key: EncryptionKey,
    algorithm: Algorithm,
    page_size: usize,
    max_content_length: Option<usize>,
    ready: AtomicBool,
    caching: AtomicBool,
}

impl StoreContext {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        key: EncryptionKey,
        algorithm: Algorithm,
        page_size: usize,
        max_content_length: Option<usize>,
    ) -> Self {
        Self {
            transport,
            key,
            algorithm,
            page_size,
            max_content_length,
            ready: AtomicBool::new(false),
            caching: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &dyn ChannelTransport {
        self.transport.as_ref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    pub fn is_caching(&self) -> bool {
        self.caching.load(Ordering::Acquire)
    }

    pub fn set_caching(&self, caching: bool) {
        self.caching.store(caching, Ordering::Release);
    }

    /// Encrypt a document body into message content
    pub fn seal(&self, body: &Map<String, Value>) -> Result<String> {
        let plaintext = serde_json::to_string(body)?;
        let content = encrypt(&plaintext, &self.key, self.algorithm)?.to_json()?;

        if let Some(max) = self.max_content_length {
            if content.len() > max {
                return Err(Error::ContentTooLarge {
                    length: content.len(),
                    max,
                });
            }
        }

        Ok(content)
    }

    /// Decode message content into a document, `None` if it is not ours
    pub fn open(&self, message: &RawMessage) -> Option<Document> {
        let Some(plaintext) =
            Envelope::parse(&message.content).and_then(|e| e.open(&self.key, self.algorithm))
        else {
            trace!(id = %message.id, "Skipping message that does not decrypt");
            return None;
        };

        match serde_json::from_str::<Value>(&plaintext) {
            Ok(Value::Object(fields)) => Some(Document::from_parts(message.id.clone(), fields)),
            _ => {
                trace!(id = %message.id, "Skipping message that is not a JSON object");
                None
            }
        }
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Entry point: a set of encrypted collections over one transport
pub struct Store {
    context: Arc<StoreContext>,
    collections: IndexMap<String, Arc<Collection>>,
    /// channel id → collection name
    routes: HashMap<String, String>,
    live_sync: bool,
    started: AtomicBool,
}

impl Store {
    /// Build a store; call [`Store::start`] before using collections
    pub fn new(config: StoreConfig, transport: Arc<dyn ChannelTransport>) -> Result<Self> {
        config.validate()?;

        info!(
            algorithm = %config.algorithm,
            key = %config.key.fingerprint(),
            collections = config.collections.len(),
            live_sync = config.live_sync,
            "Creating store"
        );

        let context = Arc::new(StoreContext::new(
            transport,
            config.key,
            config.algorithm,
            config.page_size,
            config.max_content_length,
        ));

        let mut collections = IndexMap::new();
        let mut routes = HashMap::new();
        for entry in config.collections {
            routes.insert(entry.channel_id.clone(), entry.name.clone());
            let collection = Collection::new(entry.name.clone(), entry.channel_id, context.clone());
            collections.insert(entry.name, Arc::new(collection));
        }

        Ok(Self {
            context,
            collections,
            routes,
            live_sync: config.live_sync,
            started: AtomicBool::new(false),
        })
    }

    /// Make the store ready, warming every cache first when live sync is on
    ///
    /// A failed warm-up leaves the store unstarted so `start` can be retried.
    pub async fn start(&self) -> Result<()> {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::AlreadyStarted);
        }

        if self.live_sync {
            self.context.set_caching(true);

            let warm_ups = self.collections.values().map(|c| c.warm());
            if let Err(e) = try_join_all(warm_ups).await {
                self.context.set_caching(false);
                self.started.store(false, Ordering::Release);
                return Err(e);
            }
        }

        self.context.set_ready(true);
        info!(
            collections = self.collections.len(),
            live_sync = self.live_sync,
            "Store started"
        );
        Ok(())
    }

    /// Whether [`Store::start`] has completed
    pub fn is_ready(&self) -> bool {
        self.context.is_ready()
    }

    /// Whether caches are kept warm by push events
    pub fn is_live_sync(&self) -> bool {
        self.live_sync
    }

    /// Look a collection up by name
    pub fn collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .get(name)
            .cloned()
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))
    }

    /// Look a collection up by the channel it is stored in
    pub fn collection_by_channel(&self, channel_id: &str) -> Result<Arc<Collection>> {
        self.routes
            .get(channel_id)
            .and_then(|name| self.collections.get(name))
            .cloned()
            .ok_or_else(|| Error::ChannelNotRouted(channel_id.to_string()))
    }

    /// Configured collection names, in configuration order
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Apply a push-feed event to the owning collection's cache
    ///
    /// Events for channels no collection is bound to are ignored.
    pub fn handle_feed_event(&self, event: FeedEvent) -> Result<()> {
        if !self.live_sync {
            return Err(Error::LiveSyncDisabled);
        }

        let Ok(collection) = self.collection_by_channel(event.channel_id()) else {
            trace!(channel = %event.channel_id(), "Ignoring event for unrouted channel");
            return Ok(());
        };

        match event {
            FeedEvent::MessageCreated { message } | FeedEvent::MessageUpdated { message } => {
                collection.apply_remote_upsert(message)
            }
            FeedEvent::MessageDeleted { message_id, .. } => {
                collection.apply_remote_delete(&message_id)
            }
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .field("live_sync", &self.live_sync)
            .field("ready", &self.is_ready())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
