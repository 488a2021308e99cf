//! State container contract and in-memory reference implementation.

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Provenance of a state assignment.
///
/// Every assignment carries its origin so the persistence scheduler can tell
/// application mutations apart from the engine's own hydration and
/// reconciliation resets. This is an explicit per-call tag; there is no
/// shared flag to race on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Assigned by application code; eligible for persistence.
    Application,
    /// Assigned by the engine; must not re-enter the scheduler.
    Engine,
}

/// A single observed state transition.
#[derive(Debug, Clone)]
pub struct StateChange {
    /// The value before the assignment.
    pub previous: Value,
    /// The value after the assignment.
    pub current: Value,
    /// Who made the assignment.
    pub origin: Origin,
}

/// Error raised by a container rejecting an assignment.
#[derive(Debug, Clone, Error)]
#[error("state container rejected assignment: {0}")]
pub struct StateError(pub String);

/// The reactive state container the engine synchronizes.
///
/// The container owns the state value; all mutation goes through [`set`]
/// with an explicit [`Origin`]. Change delivery must be synchronous relative
/// to the assignment and preserve assignment order per subscriber.
///
/// [`set`]: StateContainer::set
pub trait StateContainer: Send + Sync {
    /// Returns the current state value.
    fn get(&self) -> Value;

    /// Assigns a new state value, tagged with its provenance.
    fn set(&self, next: Value, origin: Origin) -> Result<(), StateError>;

    /// Subscribes to state transitions.
    ///
    /// Dropping the receiver unsubscribes.
    fn changes(&self) -> UnboundedReceiver<StateChange>;
}

/// An in-memory state container.
///
/// Suitable for tests and embedders without a reactive framework of their
/// own. Thread-safe; disconnected subscribers are pruned on the next
/// assignment.
pub struct MemoryState {
    value: RwLock<Value>,
    subscribers: RwLock<Vec<UnboundedSender<StateChange>>>,
}

impl MemoryState {
    /// Creates a container holding `initial`.
    #[must_use]
    pub fn new(initial: Value) -> Self {
        Self {
            value: RwLock::new(initial),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Assigns a new value as application code.
    ///
    /// Convenience over [`StateContainer::set`] with [`Origin::Application`].
    pub fn update(&self, next: Value) {
        // MemoryState assignment is infallible
        let _ = self.set(next, Origin::Application);
    }

    /// Returns the number of active change subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl StateContainer for MemoryState {
    fn get(&self) -> Value {
        self.value.read().clone()
    }

    fn set(&self, next: Value, origin: Origin) -> Result<(), StateError> {
        let previous = {
            let mut value = self.value.write();
            std::mem::replace(&mut *value, next.clone())
        };

        let change = StateChange {
            previous,
            current: next,
            origin,
        };
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(change.clone()).is_ok());
        Ok(())
    }

    fn changes(&self) -> UnboundedReceiver<StateChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.write().push(tx);
        rx
    }
}
