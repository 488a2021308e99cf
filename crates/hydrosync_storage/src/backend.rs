//! Storage backend trait definition.

use crate::error::{StorageError, StorageResult};
use crate::event::EventReceiver;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Kind of persistence unit a key is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// The unit covering the entire state.
    Entire,
    /// A unit covering one configured slice.
    Slice,
}

/// A request for the backend key of one persistence unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRequest<'a> {
    /// Stable store identifier.
    pub store_id: &'a str,
    /// Kind of unit the key is for.
    pub kind: UnitKind,
    /// Slice key, present only for [`UnitKind::Slice`].
    pub slice_key: Option<&'a str>,
}

/// Write pacing preference advertised by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pacing {
    /// No pacing: every enqueued write triggers an immediate flush.
    Immediate,
    /// Debounced flushing.
    Debounced {
        /// Quiet period that must elapse before a trailing flush.
        wait: Duration,
        /// Upper bound on how long a flush may be deferred by new changes.
        max_wait: Option<Duration>,
        /// Flush on the leading edge of a burst.
        leading: bool,
        /// Flush on the trailing edge of a burst.
        trailing: bool,
    },
}

impl Pacing {
    /// Trailing-only debounce with zero wait.
    ///
    /// Coalesces changes made within one scheduling turn into a single
    /// flush while keeping latency at one timer tick.
    pub fn default_debounce() -> Self {
        Self::Debounced {
            wait: Duration::ZERO,
            max_wait: None,
            leading: false,
            trailing: true,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::default_debounce()
    }
}

/// A pluggable key-value persistence backend.
///
/// Backends are **keyed value stores**. The core reads persisted values from
/// them during hydration, schedules writes back to them, and reconciles
/// change notifications they emit. Backends never interpret store semantics.
///
/// # Invariants
///
/// - `get_item` returns exactly the value last written under that key, or
///   `None` when the key is absent
/// - Required operations may suspend; once issued they run to completion or
///   failure, the core applies no timeout
/// - Backends must be `Send + Sync`; the core holds them behind `Arc`
///
/// # Optional capabilities
///
/// Every method past the three required ones has a default body declining
/// the capability; implementors override what they support.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend name.
    ///
    /// Consulted only to pick the default echo-suppression window: names
    /// suggesting an indexed/transactional backend get a longer window.
    fn name(&self) -> &str;

    /// Reads the value stored under `key`, or `None` when absent.
    async fn get_item(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Writes `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Removes the value stored under `key`. Removing an absent key is not
    /// an error.
    async fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Enumerates every key in the backend namespace.
    ///
    /// Returns `Ok(None)` when the backend cannot enumerate; callers fall
    /// back to the keys they already know about.
    async fn get_all_keys(&self) -> StorageResult<Option<Vec<String>>> {
        Ok(None)
    }

    /// Wipes the whole backend namespace.
    async fn clear(&self) -> StorageResult<()> {
        Err(StorageError::Unsupported("clear"))
    }

    /// Subscribes to backend-originated change notifications.
    ///
    /// Returns `None` when the backend cannot observe external writes.
    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Option<EventReceiver> {
        None
    }

    /// Backend-supplied key scheme.
    ///
    /// When this returns `Some`, it is used exclusively; `None` falls back
    /// to the default `<prefix>:<storeId>:...` scheme.
    fn resolve_key(&self, _request: &KeyRequest<'_>) -> Option<String> {
        None
    }

    /// Preferred write pacing; `None` falls back to the default debounce.
    fn pacing(&self) -> Option<Pacing> {
        None
    }
}
