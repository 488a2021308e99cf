//! The external-event reconciler.
//!
//! Consumes backend-originated change notifications and reapplies them to
//! in-memory state. Events observed before hydration settles are buffered
//! and replayed in arrival order; notifications matching one of the engine's
//! own recent writes are ignored as echoes.

use crate::error::StoreError;
use crate::merge::deep_merge;
use crate::readiness::Readiness;
use crate::store::{EngineContext, PersistUnit};
use hydrosync_storage::{EventKind, EventReceiver, StorageEvent};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

/// Runs the reconciler until the backend's event feed closes.
pub(crate) async fn run(context: Arc<EngineContext>, mut events: EventReceiver, readiness: Readiness) {
    // Buffer whatever arrives before hydration settles.
    let mut buffered: VecDeque<StorageEvent> = VecDeque::new();
    {
        let ready = readiness.wait();
        tokio::pin!(ready);
        loop {
            tokio::select! {
                outcome = &mut ready => {
                    if outcome.is_err() {
                        // The store never became ready; there is no state to
                        // reconcile against.
                        return;
                    }
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => buffered.push_back(event),
                    None => return,
                }
            }
        }
    }

    // Replay strictly in arrival order, each event fully processed before
    // the next is considered.
    if !buffered.is_empty() {
        tracing::debug!(count = buffered.len(), "replaying buffered external events");
    }
    for event in buffered {
        handle_event(&context, &event).await;
    }

    while let Some(event) = events.recv().await {
        handle_event(&context, &event).await;
    }
}

async fn handle_event(context: &EngineContext, event: &StorageEvent) {
    match (event.kind, event.key.as_deref()) {
        (EventKind::Clear, _) => reset_all(context),
        (EventKind::Set, Some(key)) => {
            if let Some(unit) = target_unit(context, key) {
                apply_external_set(context, unit).await;
            }
        }
        (EventKind::Remove, Some(key)) => {
            if let Some(unit) = target_unit(context, key) {
                reset_unit(context, unit);
            }
        }
        // A keyed event without a key; nothing to act on.
        (_, None) => {}
    }
}

/// Looks up the unit a keyed external event targets. `None` for keys that
/// are not ours and for echoes of the engine's own recent writes.
fn target_unit<'a>(context: &'a EngineContext, key: &str) -> Option<&'a PersistUnit> {
    let unit = context.unit_for_key(key)?;
    if context.recently_written(key) {
        tracing::debug!(key, "ignored echo of our own recent write");
        return None;
    }
    Some(unit)
}

/// Resets state to the configured initial value without re-reading the
/// backend: wholesale for the entire strategy, slice by slice in configured
/// order otherwise.
fn reset_all(context: &EngineContext) {
    let mut next = context.initial.clone();
    let slices: Vec<&PersistUnit> = context
        .units
        .iter()
        .filter(|unit| unit.slice.is_some())
        .collect();

    if !slices.is_empty() {
        next = context.container.get();
        for unit in slices {
            if let Some(slice) = &unit.slice {
                let initial_projection = (slice.select)(&context.initial);
                next = (slice.apply)(next, initial_projection);
            }
        }
    }

    apply(context, next);
}

/// Resets one unit to its initial value: the whole state for the entire
/// unit, the slice's initial projection folded onto current state otherwise.
fn reset_unit(context: &EngineContext, unit: &PersistUnit) {
    let next = match &unit.slice {
        None => context.initial.clone(),
        Some(slice) => {
            let current = context.container.get();
            let initial_projection = (slice.select)(&context.initial);
            (slice.apply)(current, initial_projection)
        }
    };
    apply(context, next);
}

/// Re-reads an externally written unit and folds it into state. The entire
/// unit merges against the **initial** state (idempotent re-derivation); a
/// slice folds onto the **current** state.
async fn apply_external_set(context: &EngineContext, unit: &PersistUnit) {
    let Some(backend) = context.backend.as_ref() else {
        return;
    };

    match backend.get_item(&unit.key).await {
        Ok(None) => {}
        Ok(Some(value)) => {
            let next = match &unit.slice {
                None => match &context.config.merge {
                    Some(merge) => merge(&context.initial, &value),
                    None => deep_merge(&context.initial, &value),
                },
                Some(slice) => (slice.apply)(context.container.get(), value),
            };
            apply(context, next);
        }
        Err(source) => context.report_error(&StoreError::Storage(source)),
    }
}

fn apply(context: &EngineContext, next: Value) {
    if let Err(error) = context.apply_engine_state(next) {
        context.report_error(&StoreError::Apply(error));
    }
}
