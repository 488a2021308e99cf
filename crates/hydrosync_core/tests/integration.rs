//! Integration tests for the persisted store over the in-memory backend.

use hydrosync_core::{
    MemoryState, Origin, Pacing, PersistedStore, SliceDescriptor, StateChange, StateContainer,
    StateError, StoreConfig, UnitStatus,
};
use hydrosync_storage::{KeyRequest, MemoryBackend, StorageBackend, StorageError, StorageResult};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Lets spawned flush tasks and timers run under the paused clock.
async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn restart_restores_flushed_state() {
    let backend = Arc::new(MemoryBackend::new());

    // First run: mutate and let the scheduler flush.
    {
        let container = Arc::new(MemoryState::new(json!({"todos": [], "count": 0})));
        let store = PersistedStore::new(
            container.clone(),
            Some(backend.clone()),
            StoreConfig::new("todo"),
        )
        .unwrap();
        store.ready().await.unwrap();

        container.update(json!({"todos": ["milk"], "count": 1}));
        container.update(json!({"todos": ["milk", "eggs"], "count": 2}));
        settle(50).await;
    }

    // Second run over the same backend: hydration restores the last state.
    let container = Arc::new(MemoryState::new(json!({"todos": [], "count": 0})));
    let store = PersistedStore::new(
        container.clone(),
        Some(backend),
        StoreConfig::new("todo"),
    )
    .unwrap();

    let report = store.ready().await.unwrap();
    assert_eq!(report.overall, UnitStatus::Hydrated);
    assert_eq!(
        container.get(),
        json!({"todos": ["milk", "eggs"], "count": 2})
    );
}

#[tokio::test(start_paused = true)]
async fn snapshot_with_enumeration_skips_foreign_keys() {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .set_item("unrelated:key", json!("not ours"))
        .await
        .unwrap();

    let container = Arc::new(MemoryState::new(json!({"count": 0})));
    let store = PersistedStore::new(
        container.clone(),
        Some(backend.clone()),
        StoreConfig::new("app"),
    )
    .unwrap();
    store.ready().await.unwrap();

    container.update(json!({"count": 4}));
    settle(50).await;

    let snapshot = store.persisted_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot["persist:app:entire"], json!({"count": 4}));
}

#[tokio::test(start_paused = true)]
async fn snapshot_falls_back_to_known_keys() {
    // A backend without enumeration support.
    struct PlainBackend {
        inner: MemoryBackend,
    }

    #[async_trait::async_trait]
    impl StorageBackend for PlainBackend {
        fn name(&self) -> &str {
            "plain"
        }

        async fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: Value) -> StorageResult<()> {
            self.inner.set_item(key, value).await
        }

        async fn remove_item(&self, key: &str) -> StorageResult<()> {
            self.inner.remove_item(key).await
        }
        // get_all_keys keeps its default Ok(None) body.
    }

    let backend = Arc::new(PlainBackend {
        inner: MemoryBackend::new(),
    });
    backend
        .inner
        .set_item("persist:app:slice:cart", json!([1]))
        .await
        .unwrap();

    let container = Arc::new(MemoryState::new(json!({"cart": [], "prefs": {}})));
    let store = PersistedStore::new(
        container,
        Some(backend),
        StoreConfig::new("app").with_slices(vec![
            SliceDescriptor::new(
                "cart",
                |state| state["cart"].clone(),
                |mut state, value| {
                    state["cart"] = value;
                    state
                },
            ),
            SliceDescriptor::new(
                "prefs",
                |state| state["prefs"].clone(),
                |mut state, value| {
                    state["prefs"] = value;
                    state
                },
            ),
        ]),
    )
    .unwrap();
    store.ready().await.unwrap();

    // Only the key that actually exists shows up.
    let snapshot = store.persisted_snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot["persist:app:slice:cart"], json!([1]));
}

#[tokio::test(start_paused = true)]
async fn backend_pacing_preference_applies() {
    let backend = Arc::new(MemoryBackend::new().with_pacing(Pacing::Immediate));
    let container = Arc::new(MemoryState::new(json!({"count": 0})));
    let store = PersistedStore::new(
        container.clone(),
        Some(backend.clone()),
        StoreConfig::new("app"),
    )
    .unwrap();
    store.ready().await.unwrap();

    container.update(json!({"count": 1}));
    settle(1).await;
    container.update(json!({"count": 2}));
    settle(1).await;

    // No coalescing with the backend's immediate preference.
    assert_eq!(backend.set_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn config_pacing_overrides_backend_preference() {
    let backend = Arc::new(MemoryBackend::new().with_pacing(Pacing::Immediate));
    let container = Arc::new(MemoryState::new(json!({"count": 0})));
    let store = PersistedStore::new(
        container.clone(),
        Some(backend.clone()),
        StoreConfig::new("app").with_pacing(Pacing::Debounced {
            wait: Duration::from_millis(50),
            max_wait: None,
            leading: false,
            trailing: true,
        }),
    )
    .unwrap();
    store.ready().await.unwrap();

    container.update(json!({"count": 1}));
    container.update(json!({"count": 2}));
    settle(100).await;

    assert_eq!(backend.set_calls(), 1);
    assert_eq!(backend.item("persist:app:entire"), Some(json!({"count": 2})));
}

#[tokio::test(start_paused = true)]
async fn backend_key_scheme_is_used_end_to_end() {
    let backend = Arc::new(
        MemoryBackend::new().with_key_resolver(|request: &KeyRequest<'_>| {
            format!("v2/{}", request.store_id)
        }),
    );
    let container = Arc::new(MemoryState::new(json!({"count": 0})));
    let store = PersistedStore::new(
        container.clone(),
        Some(backend.clone()),
        StoreConfig::new("app"),
    )
    .unwrap();
    store.ready().await.unwrap();
    assert_eq!(store.unit_keys(), vec!["v2/app"]);

    container.update(json!({"count": 1}));
    settle(50).await;
    assert_eq!(backend.item("v2/app"), Some(json!({"count": 1})));

    // Events on the custom key are recognized.
    settle(600).await;
    backend.external_remove("v2/app");
    settle(10).await;
    assert_eq!(container.get(), json!({"count": 0}));
}

#[tokio::test(start_paused = true)]
async fn scheduler_flushes_remaining_writes_when_changes_close() {
    /// A container that can close its change stream on demand.
    struct ClosableState {
        inner: MemoryState,
        sender: RwLock<Option<UnboundedSender<StateChange>>>,
    }

    impl ClosableState {
        fn close(&self) {
            self.sender.write().take();
        }
    }

    impl StateContainer for ClosableState {
        fn get(&self) -> Value {
            self.inner.get()
        }

        fn set(&self, next: Value, origin: Origin) -> Result<(), StateError> {
            let previous = self.inner.get();
            self.inner.set(next.clone(), origin)?;
            if let Some(tx) = &*self.sender.read() {
                let _ = tx.send(StateChange {
                    previous,
                    current: next,
                    origin,
                });
            }
            Ok(())
        }

        fn changes(&self) -> UnboundedReceiver<StateChange> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.sender.write() = Some(tx);
            rx
        }
    }

    let backend = Arc::new(MemoryBackend::new());
    let container = Arc::new(ClosableState {
        inner: MemoryState::new(json!({"count": 0})),
        sender: RwLock::new(None),
    });
    let store = PersistedStore::new(
        container.clone(),
        Some(backend.clone()),
        // A wait long enough that only the close-triggered flush can run.
        StoreConfig::new("app").with_pacing(Pacing::Debounced {
            wait: Duration::from_secs(3600),
            max_wait: None,
            leading: false,
            trailing: true,
        }),
    )
    .unwrap();
    store.ready().await.unwrap();

    container
        .set(json!({"count": 9}), Origin::Application)
        .unwrap();
    settle(10).await;
    assert_eq!(backend.set_calls(), 0);

    container.close();
    settle(10).await;

    assert_eq!(backend.set_calls(), 1);
    assert_eq!(backend.item("persist:app:entire"), Some(json!({"count": 9})));
}

#[tokio::test(start_paused = true)]
async fn hydration_error_reports_but_store_keeps_working() {
    // Reads fail once at hydration, then recover.
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecoveringBackend {
        inner: MemoryBackend,
        failed_once: AtomicBool,
    }

    #[async_trait::async_trait]
    impl StorageBackend for RecoveringBackend {
        fn name(&self) -> &str {
            "recovering"
        }

        async fn get_item(&self, key: &str) -> StorageResult<Option<Value>> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(StorageError::backend("cold start"));
            }
            self.inner.get_item(key).await
        }

        async fn set_item(&self, key: &str, value: Value) -> StorageResult<()> {
            self.inner.set_item(key, value).await
        }

        async fn remove_item(&self, key: &str) -> StorageResult<()> {
            self.inner.remove_item(key).await
        }
    }

    let backend = Arc::new(RecoveringBackend {
        inner: MemoryBackend::new(),
        failed_once: AtomicBool::new(false),
    });
    let container = Arc::new(MemoryState::new(json!({"count": 0})));
    let store = PersistedStore::new(
        container.clone(),
        Some(backend.clone()),
        StoreConfig::new("app"),
    )
    .unwrap();

    // Hydration saw the failure but still settled.
    let report = store.ready().await.unwrap();
    assert_eq!(report.overall, UnitStatus::Error);
    assert_eq!(container.get(), json!({"count": 0}));

    // Writes keep flowing afterwards.
    container.update(json!({"count": 1}));
    settle(50).await;
    assert_eq!(
        backend.inner.item("persist:app:entire"),
        Some(json!({"count": 1}))
    );
}
