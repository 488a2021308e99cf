//! In-memory storage backend for tests and ephemeral stores.

use crate::backend::{KeyRequest, Pacing, StorageBackend};
use crate::error::StorageResult;
use crate::event::{EventFeed, EventReceiver, StorageEvent};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

type KeyResolver = Box<dyn Fn(&KeyRequest<'_>) -> String + Send + Sync>;

/// An in-memory storage backend.
///
/// This backend keeps all values in a map and implements every optional
/// capability of [`StorageBackend`]. It is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// The `external_*` methods mutate the map **and** notify subscribers, the
/// way a write from another process would be observed.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across tasks.
pub struct MemoryBackend {
    name: String,
    items: RwLock<HashMap<String, Value>>,
    feed: EventFeed,
    resolver: Option<KeyResolver>,
    pacing: Option<Pacing>,
    set_calls: AtomicUsize,
}

impl MemoryBackend {
    /// Creates a new empty backend named `"memory"`.
    #[must_use]
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Creates a new empty backend with the given name.
    ///
    /// Useful for exercising name-dependent behavior (e.g. the longer
    /// echo-suppression window for indexed-database names).
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(HashMap::new()),
            feed: EventFeed::new(),
            resolver: None,
            pacing: None,
            set_calls: AtomicUsize::new(0),
        }
    }

    /// Creates a backend pre-seeded with items.
    ///
    /// Useful for testing hydration scenarios.
    #[must_use]
    pub fn with_items(items: HashMap<String, Value>) -> Self {
        let backend = Self::new();
        *backend.items.write() = items;
        backend
    }

    /// Installs a custom key scheme.
    #[must_use]
    pub fn with_key_resolver(
        mut self,
        resolver: impl Fn(&KeyRequest<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Advertises a pacing preference.
    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Returns a copy of all stored items.
    #[must_use]
    pub fn items(&self) -> HashMap<String, Value> {
        self.items.read().clone()
    }

    /// Returns the stored value for `key`, if any.
    #[must_use]
    pub fn item(&self, key: &str) -> Option<Value> {
        self.items.read().get(key).cloned()
    }

    /// Returns how many times `set_item` has been called.
    ///
    /// Lets tests distinguish coalesced flushes from per-change writes.
    #[must_use]
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    /// Writes a value as another process would and notifies subscribers.
    pub fn external_set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.items.write().insert(key.clone(), value);
        self.feed.emit(StorageEvent::set(key));
    }

    /// Removes a value as another process would and notifies subscribers.
    pub fn external_remove(&self, key: &str) {
        self.items.write().remove(key);
        self.feed.emit(StorageEvent::remove(key));
    }

    /// Wipes the namespace as another process would and notifies subscribers.
    pub fn external_clear(&self) {
        self.items.write().clear();
        self.feed.emit(StorageEvent::clear());
    }

    /// Notifies subscribers without touching stored items.
    ///
    /// Lets tests emit notifications that disagree with the stored data,
    /// e.g. a set event whose key reads back absent.
    pub fn emit(&self, event: StorageEvent) {
        self.feed.emit(event);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: Value) -> StorageResult<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.items.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.items.write().remove(key);
        Ok(())
    }

    async fn get_all_keys(&self) -> StorageResult<Option<Vec<String>>> {
        Ok(Some(self.items.read().keys().cloned().collect()))
    }

    async fn clear(&self) -> StorageResult<()> {
        self.items.write().clear();
        Ok(())
    }

    fn subscribe(&self) -> Option<EventReceiver> {
        Some(self.feed.subscribe())
    }

    fn resolve_key(&self, request: &KeyRequest<'_>) -> Option<String> {
        self.resolver.as_ref().map(|resolve| resolve(request))
    }

    fn pacing(&self) -> Option<Pacing> {
        self.pacing.clone()
    }
}
