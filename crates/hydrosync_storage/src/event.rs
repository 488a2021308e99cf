//! Backend-originated change notifications.
//!
//! Backends that can observe writes made outside the owning process (another
//! tab, another process, a different store instance) surface them through an
//! [`EventFeed`]. The core's reconciler consumes these events to keep
//! in-memory state in step with the backend.

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Kind of externally observed backend change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A key's value was written.
    Set,
    /// A key's value was deleted.
    Remove,
    /// The whole backend namespace was wiped.
    Clear,
}

/// A single backend-originated change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// What happened.
    pub kind: EventKind,
    /// The affected key. Present for `Set`/`Remove`, absent for `Clear`.
    pub key: Option<String>,
}

impl StorageEvent {
    /// Creates a set event for `key`.
    pub fn set(key: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Set,
            key: Some(key.into()),
        }
    }

    /// Creates a remove event for `key`.
    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Remove,
            key: Some(key.into()),
        }
    }

    /// Creates a clear event.
    pub fn clear() -> Self {
        Self {
            kind: EventKind::Clear,
            key: None,
        }
    }
}

/// Receiving half of an event subscription.
///
/// Events are delivered in emission order. Dropping the receiver
/// unsubscribes; the feed prunes disconnected subscribers on the next emit.
pub type EventReceiver = UnboundedReceiver<StorageEvent>;

/// Fan-out of storage events to any number of subscribers.
///
/// The feed:
/// - Preserves emission order per subscriber
/// - Supports multiple subscribers
/// - Is thread-safe
pub struct EventFeed {
    subscribers: RwLock<Vec<UnboundedSender<StorageEvent>>>,
}

impl EventFeed {
    /// Creates a new feed with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to the feed.
    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers, pruning disconnected ones.
    pub fn emit(&self, event: StorageEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_and_receive() {
        let feed = EventFeed::new();
        let mut rx = feed.subscribe();

        feed.emit(StorageEvent::set("a"));
        feed.emit(StorageEvent::remove("a"));
        feed.emit(StorageEvent::clear());

        assert_eq!(rx.try_recv().unwrap(), StorageEvent::set("a"));
        assert_eq!(rx.try_recv().unwrap(), StorageEvent::remove("a"));
        assert_eq!(rx.try_recv().unwrap(), StorageEvent::clear());
    }

    #[test]
    fn multiple_subscribers() {
        let feed = EventFeed::new();
        let mut rx1 = feed.subscribe();
        let mut rx2 = feed.subscribe();

        feed.emit(StorageEvent::set("k"));

        assert_eq!(rx1.try_recv().unwrap(), StorageEvent::set("k"));
        assert_eq!(rx2.try_recv().unwrap(), StorageEvent::set("k"));
    }

    #[test]
    fn subscriber_cleanup() {
        let feed = EventFeed::new();
        assert_eq!(feed.subscriber_count(), 0);

        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);

        // Emit - should clean up the disconnected subscriber
        feed.emit(StorageEvent::clear());
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn event_constructors() {
        assert_eq!(StorageEvent::set("k").key.as_deref(), Some("k"));
        assert_eq!(StorageEvent::remove("k").kind, EventKind::Remove);
        assert_eq!(StorageEvent::clear().key, None);
    }
}
