//! Error types for the synchronization engine.

use crate::state::StateError;
use hydrosync_storage::StorageError;
use std::sync::Arc;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Callback receiving every recoverable error the engine encounters.
///
/// The sink must never block; it is invoked inline on the engine's tasks.
pub type ErrorSink = Arc<dyn Fn(&StoreError) + Send + Sync>;

/// Errors that can occur in a persisted store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A backend is configured but neither a store id nor a name was given.
    #[error("a backend is configured but no store id or name was provided")]
    MissingStoreId,

    /// The store name produced an empty id slug.
    #[error("store name {name:?} produces an empty id slug")]
    EmptyStoreId {
        /// The offending display name.
        name: String,
    },

    /// Two slice descriptors share the same key.
    #[error("duplicate slice key: {key}")]
    DuplicateSliceKey {
        /// The duplicated slice key.
        key: String,
    },

    /// A backend operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A persistence unit failed to hydrate; the unit keeps its initial
    /// value and other units are unaffected.
    #[error("hydration failed for unit {unit}: {source}")]
    Hydration {
        /// Unit label (`"entire"` or the slice key).
        unit: String,
        /// The underlying backend failure.
        #[source]
        source: StorageError,
    },

    /// A pending write failed to flush; the entry is dropped, other entries
    /// in the same cycle are unaffected.
    #[error("flush failed for key {key}: {source}")]
    Flush {
        /// The backend key whose write failed.
        key: String,
        /// The underlying backend failure.
        #[source]
        source: StorageError,
    },

    /// The state container rejected an engine-originated assignment.
    #[error("state apply failed: {0}")]
    Apply(#[from] StateError),

    /// Hydration finalization failed; the store never became ready.
    #[error("store failed to become ready: {0}")]
    ReadinessFailed(String),
}
