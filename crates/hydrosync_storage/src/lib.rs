//! # Hydrosync Storage
//!
//! Storage backend contract and implementations for Hydrosync.
//!
//! This crate defines the capability contract a persistence backend must
//! satisfy so that `hydrosync_core` can hydrate from it, flush to it, and
//! reconcile changes it observes from elsewhere. Backends are **keyed value
//! stores** - they read, write and remove structured values under string
//! keys and do not interpret store semantics.
//!
//! ## Design Principles
//!
//! - Backends expose three required operations (`get_item`, `set_item`,
//!   `remove_item`) plus optional capabilities (enumeration, clear,
//!   change notifications, key resolution, pacing preference)
//! - Must be `Send + Sync`; the core holds backends behind `Arc<dyn ...>`
//! - The core owns all hydration/merge/scheduling semantics
//!
//! ## Available Backends
//!
//! - [`MemoryBackend`] - For testing and ephemeral storage
//!
//! ## Example
//!
//! ```rust
//! use hydrosync_storage::{MemoryBackend, StorageBackend};
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//! backend.set_item("app:todo:entire", json!({"count": 1})).await.unwrap();
//! let value = backend.get_item("app:todo:entire").await.unwrap();
//! assert_eq!(value, Some(json!({"count": 1})));
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod event;
mod memory;

pub use backend::{KeyRequest, Pacing, StorageBackend, UnitKind};
pub use error::{StorageError, StorageResult};
pub use event::{EventFeed, EventKind, EventReceiver, StorageEvent};
pub use memory::MemoryBackend;
