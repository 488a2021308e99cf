//! The persisted store façade.

use crate::config::{SliceDescriptor, StoreConfig, Strategy};
use crate::error::{StoreError, StoreResult};
use crate::key::{resolve_key, slugify};
use crate::readiness::{readiness, Readiness};
use crate::state::{Origin, StateContainer, StateError};
use crate::status::{HydrationReport, UnitStatus};
use crate::{hydrate, reconcile, scheduler};
use hydrosync_storage::{Pacing, StorageBackend, UnitKind};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One persistence unit: the smallest independently hydrated and flushed
/// piece of state. Identity is fixed for the store's lifetime.
pub(crate) struct PersistUnit {
    /// Resolved backend key.
    pub key: String,
    /// Label used in statuses: `"entire"` or the slice key.
    pub label: String,
    /// Slice descriptor; `None` for the entire unit.
    pub slice: Option<SliceDescriptor>,
}

/// Shared wiring between the store façade and its tasks.
pub(crate) struct EngineContext {
    pub container: Arc<dyn StateContainer>,
    pub backend: Option<Arc<dyn StorageBackend>>,
    pub config: StoreConfig,
    pub units: Vec<PersistUnit>,
    /// State value captured at construction; hydration and resets derive
    /// from this, never from later live mutations.
    pub initial: Value,
    /// Pending writes, latest payload per backend key.
    pub queue: Mutex<HashMap<String, Value>>,
    /// Timestamp of the last successful flush per backend key.
    pub ledger: Mutex<HashMap<String, Instant>>,
    pub suppression_window: Duration,
    pub pacing: Pacing,
}

impl EngineContext {
    /// Reports a recoverable error to the sink and the log.
    pub fn report_error(&self, error: &StoreError) {
        tracing::warn!(error = %error, "recoverable store error");
        if let Some(sink) = &self.config.error_sink {
            sink(error);
        }
    }

    /// Assigns state on behalf of the engine, so the change never re-enters
    /// the persistence scheduler.
    pub fn apply_engine_state(&self, next: Value) -> Result<(), StateError> {
        self.container.set(next, Origin::Engine)
    }

    pub fn unit_for_key(&self, key: &str) -> Option<&PersistUnit> {
        self.units.iter().find(|unit| unit.key == key)
    }

    /// True while `key` sits inside the echo-suppression window of one of
    /// the engine's own flushes.
    pub fn recently_written(&self, key: &str) -> bool {
        self.ledger
            .lock()
            .get(key)
            .map(|written| written.elapsed() < self.suppression_window)
            .unwrap_or(false)
    }
}

/// Default echo-suppression window.
const SUPPRESSION_WINDOW: Duration = Duration::from_millis(500);
/// Window for backends whose name suggests an indexed/transactional store,
/// which echo their own writes noticeably later.
const INDEXED_SUPPRESSION_WINDOW: Duration = Duration::from_millis(1000);

pub(crate) fn suppression_window_for(backend_name: &str) -> Duration {
    let name = backend_name.to_lowercase();
    if name.contains("indexed") || name.contains("idb") {
        INDEXED_SUPPRESSION_WINDOW
    } else {
        SUPPRESSION_WINDOW
    }
}

/// A store whose in-memory state is synchronized with a persistence backend.
///
/// Construction is synchronous: it resolves the store identity, builds the
/// persistence-unit set and key bindings, and spawns the hydration pass, the
/// write scheduler and the external-event reconciler. The store is usable
/// for awaiting readiness immediately; everything else once [`ready`]
/// resolves.
///
/// [`ready`]: PersistedStore::ready
///
/// # Example
///
/// ```rust
/// use hydrosync_core::{MemoryState, PersistedStore, StoreConfig};
/// use hydrosync_storage::MemoryBackend;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let container = Arc::new(MemoryState::new(json!({"count": 0})));
/// let backend = Arc::new(MemoryBackend::new());
/// let store =
///     PersistedStore::new(container, Some(backend), StoreConfig::new("counter")).unwrap();
/// let report = store.ready().await.unwrap();
/// # });
/// ```
pub struct PersistedStore {
    context: Arc<EngineContext>,
    readiness: Readiness,
}

impl PersistedStore {
    /// Creates the store and starts its tasks.
    ///
    /// # Errors
    ///
    /// Fails synchronously, before any asynchronous work begins, when a
    /// backend is present but no store identifier is resolvable, or when
    /// two slices share a key.
    pub fn new(
        container: Arc<dyn StateContainer>,
        backend: Option<Arc<dyn StorageBackend>>,
        config: StoreConfig,
    ) -> StoreResult<Self> {
        let store_id = resolve_store_id(&config, backend.is_some())?;

        if let Strategy::Slices(slices) = &config.strategy {
            let mut seen = HashSet::new();
            for slice in slices {
                if !seen.insert(slice.key.as_str()) {
                    return Err(StoreError::DuplicateSliceKey {
                        key: slice.key.clone(),
                    });
                }
            }
        }

        let units = match &backend {
            Some(backend) => build_units(backend.as_ref(), &config, &store_id),
            None => Vec::new(),
        };

        let suppression_window = backend
            .as_ref()
            .map(|backend| suppression_window_for(backend.name()))
            .unwrap_or(SUPPRESSION_WINDOW);

        let pacing = config
            .pacing
            .clone()
            .or_else(|| backend.as_ref().and_then(|backend| backend.pacing()))
            .unwrap_or_default();

        let initial = container.get();
        let context = Arc::new(EngineContext {
            container,
            backend,
            config,
            units,
            initial,
            queue: Mutex::new(HashMap::new()),
            ledger: Mutex::new(HashMap::new()),
            suppression_window,
            pacing,
        });

        let (handle, readiness) = readiness();

        match &context.backend {
            None => {
                // Nothing to hydrate; the container already holds the
                // initial state.
                handle.succeed(HydrationReport::not_configured());
            }
            Some(backend) => {
                let changes = context.container.changes();
                tokio::spawn(scheduler::run(Arc::clone(&context), changes));

                if let Some(events) = backend.subscribe() {
                    tokio::spawn(reconcile::run(
                        Arc::clone(&context),
                        events,
                        readiness.clone(),
                    ));
                }

                tokio::spawn(hydrate::run(Arc::clone(&context), handle));
            }
        }

        Ok(Self { context, readiness })
    }

    /// Waits for hydration to settle; returns the hydration report.
    pub async fn ready(&self) -> StoreResult<HydrationReport> {
        self.readiness.wait().await
    }

    /// Returns a cloneable readiness observer.
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Overall hydration status; `Pending` until readiness settles.
    pub fn status(&self) -> UnitStatus {
        self.readiness
            .report()
            .map(|report| report.overall)
            .unwrap_or(UnitStatus::Pending)
    }

    /// The hydration report, once readiness settled successfully.
    pub fn report(&self) -> Option<HydrationReport> {
        self.readiness.report()
    }

    /// Backend keys of this store's persistence units, in configured order.
    pub fn unit_keys(&self) -> Vec<String> {
        self.context
            .units
            .iter()
            .map(|unit| unit.key.clone())
            .collect()
    }

    /// Reads the store's persisted units back from the backend.
    ///
    /// Uses backend enumeration when available, restricted to this store's
    /// unit keys; otherwise reads the keys the store already knows about.
    /// Absent keys are omitted from the snapshot.
    pub async fn persisted_snapshot(&self) -> StoreResult<BTreeMap<String, Value>> {
        let Some(backend) = &self.context.backend else {
            return Ok(BTreeMap::new());
        };

        let keys: Vec<String> = match backend.get_all_keys().await? {
            Some(all) => all
                .into_iter()
                .filter(|key| self.context.unit_for_key(key).is_some())
                .collect(),
            None => self.unit_keys(),
        };

        let mut snapshot = BTreeMap::new();
        for key in keys {
            if let Some(value) = backend.get_item(&key).await? {
                snapshot.insert(key, value);
            }
        }
        Ok(snapshot)
    }

    /// True when no write is pending. Test-only introspection.
    #[cfg(test)]
    pub(crate) fn pending_is_empty(&self) -> bool {
        self.context.queue.lock().is_empty()
    }
}

fn resolve_store_id(config: &StoreConfig, has_backend: bool) -> StoreResult<String> {
    if let Some(id) = config.id.as_deref() {
        let id = id.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }
    if let Some(name) = config.name.as_deref() {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(StoreError::EmptyStoreId {
                name: name.to_string(),
            });
        }
        return Ok(slug);
    }
    if has_backend {
        Err(StoreError::MissingStoreId)
    } else {
        Ok(String::new())
    }
}

fn build_units(
    backend: &dyn StorageBackend,
    config: &StoreConfig,
    store_id: &str,
) -> Vec<PersistUnit> {
    match &config.strategy {
        Strategy::Entire => vec![PersistUnit {
            key: resolve_key(backend, &config.key_prefix, store_id, UnitKind::Entire, None),
            label: "entire".to_string(),
            slice: None,
        }],
        Strategy::Slices(slices) => slices
            .iter()
            .map(|slice| PersistUnit {
                key: resolve_key(
                    backend,
                    &config.key_prefix,
                    store_id,
                    UnitKind::Slice,
                    Some(&slice.key),
                ),
                label: slice.key.clone(),
                slice: Some(slice.clone()),
            })
            .collect(),
    }
}
