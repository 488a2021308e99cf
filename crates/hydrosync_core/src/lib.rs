//! # Hydrosync Core
//!
//! Synchronization engine between a mutable in-memory state value and an
//! asynchronous, pluggable key-value persistence backend.
//!
//! This crate provides:
//! - One-time asynchronous hydration of initial state from persisted data
//! - A write scheduler that coalesces state changes per backend key and
//!   flushes them under a pacing policy
//! - A reconciler for externally originated backend changes that suppresses
//!   echoes of the engine's own writes
//! - A one-shot readiness signal settling once hydration's outcome is known
//!
//! ## Architecture
//!
//! A [`PersistedStore`] wraps a [`StateContainer`] (the reactive value the
//! application mutates) and an optional [`StorageBackend`]. Construction
//! builds the persistence-unit set and key bindings, then hydration, the
//! scheduler and the reconciler run as tasks for the store's lifetime.
//!
//! ## Key Invariants
//!
//! - The persistence strategy (entire state vs. slices) is fixed per store
//! - Engine-originated state assignments never re-enter the scheduler
//! - The readiness signal settles exactly once, success or failure
//! - Per-unit hydration errors and per-entry flush errors are contained and
//!   reported to the error sink; only a failed final state application is
//!   fatal
//!
//! ## Example
//!
//! ```rust,ignore
//! use hydrosync_core::{MemoryState, PersistedStore, StoreConfig};
//! use hydrosync_storage::MemoryBackend;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let container = Arc::new(MemoryState::new(json!({"count": 0})));
//! let backend = Arc::new(MemoryBackend::new());
//! let store = PersistedStore::new(
//!     container.clone(),
//!     Some(backend),
//!     StoreConfig::new("counter"),
//! )?;
//! let report = store.ready().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod hydrate;
mod key;
mod merge;
mod readiness;
mod reconcile;
mod scheduler;
mod state;
mod status;
mod store;

pub use config::{
    Discard, MergeFn, SliceDescriptor, StoreConfig, Strategy, Validation, Validator,
};
pub use error::{ErrorSink, StoreError, StoreResult};
pub use key::{default_key, slugify, DEFAULT_KEY_PREFIX};
pub use merge::deep_merge;
pub use readiness::Readiness;
pub use state::{MemoryState, Origin, StateChange, StateContainer, StateError};
pub use status::{HydrationReport, UnitStatus};
pub use store::PersistedStore;

// Storage contract types embedders regularly need alongside the core.
pub use hydrosync_storage::{
    EventKind, KeyRequest, MemoryBackend, Pacing, StorageBackend, StorageError, StorageEvent,
    UnitKind,
};
