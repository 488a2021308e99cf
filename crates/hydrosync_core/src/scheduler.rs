//! The persistence write scheduler.
//!
//! Observes every state change, enqueues the latest payload per backend key
//! (last-write-wins) and flushes the queue under the configured pacing
//! policy. A flush cycle snapshots and clears the whole queue, then writes
//! every entry concurrently and independently: one failed write is reported
//! and dropped without delaying or cancelling the others.

use crate::error::StoreError;
use crate::state::{Origin, StateChange};
use crate::store::EngineContext;
use hydrosync_storage::Pacing;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

/// Runs the scheduler until the container's change stream closes, then
/// performs a final flush of whatever is still queued.
pub(crate) async fn run(context: Arc<EngineContext>, mut changes: UnboundedReceiver<StateChange>) {
    // Trailing-edge deadline and the max-wait cap for the current burst.
    let mut deadline: Option<Instant> = None;
    let mut hard_deadline: Option<Instant> = None;

    loop {
        let timer = match (deadline, hard_deadline) {
            (Some(soft), Some(hard)) => Some(soft.min(hard)),
            (Some(soft), None) => Some(soft),
            (None, _) => None,
        };

        tokio::select! {
            // Drain pending changes before letting an expired timer fire, so
            // a zero-wait debounce still coalesces a synchronous burst.
            biased;
            change = changes.recv() => match change {
                Some(change) => {
                    if change.origin == Origin::Engine {
                        // Hydration and reconciliation resets never re-enter
                        // the scheduler.
                        continue;
                    }
                    if !enqueue(&context, &change) {
                        continue;
                    }
                    match context.pacing {
                        Pacing::Immediate => flush(&context),
                        Pacing::Debounced { wait, max_wait, leading, trailing } => {
                            let now = Instant::now();
                            let burst_started = deadline.is_none() && hard_deadline.is_none();
                            if leading && burst_started {
                                flush(&context);
                            }
                            deadline = Some(now + wait);
                            if let Some(max) = max_wait {
                                hard_deadline.get_or_insert(now + max);
                            }
                            let _ = trailing; // trailing decides at timer expiry
                        }
                    }
                }
                None => {
                    // Container gone; flush whatever is left and stop.
                    flush(&context);
                    break;
                }
            },
            _ = tokio::time::sleep_until(timer.unwrap_or_else(Instant::now)), if timer.is_some() => {
                let trailing = match context.pacing {
                    Pacing::Debounced { trailing, .. } => trailing,
                    Pacing::Immediate => false,
                };
                if trailing {
                    flush(&context);
                }
                // Leading-only: entries the leading flush did not cover stay
                // queued for the next flush.
                deadline = None;
                hard_deadline = None;
            }
        }
    }
}

/// Enqueues the persistence-relevant payloads of one state change.
/// Returns false when no unit changed.
fn enqueue(context: &EngineContext, change: &StateChange) -> bool {
    let mut queued = false;
    let mut queue = context.queue.lock();

    for unit in &context.units {
        match &unit.slice {
            None => {
                // Entire strategy: every emitted change persists the whole
                // current state.
                queue.insert(unit.key.clone(), change.current.clone());
                queued = true;
            }
            Some(slice) => {
                let previous = (slice.select)(&change.previous);
                let current = (slice.select)(&change.current);
                // Cheap projection comparison: the selector's output alone
                // decides whether the slice changed.
                if previous != current {
                    queue.insert(unit.key.clone(), current);
                    queued = true;
                }
            }
        }
    }

    queued
}

/// Snapshots and clears the pending queue, then writes every entry to the
/// backend concurrently and independently.
fn flush(context: &Arc<EngineContext>) {
    let snapshot: Vec<(String, Value)> = {
        let mut queue = context.queue.lock();
        queue.drain().collect()
    };
    if snapshot.is_empty() {
        return;
    }
    let Some(backend) = context.backend.clone() else {
        return;
    };

    tracing::debug!(entries = snapshot.len(), "flushing pending writes");

    for (key, value) in snapshot {
        let context = Arc::clone(context);
        let backend = Arc::clone(&backend);
        tokio::spawn(async move {
            match backend.set_item(&key, value).await {
                Ok(()) => {
                    context.ledger.lock().insert(key, Instant::now());
                }
                Err(source) => {
                    // Entry is dropped; no retry.
                    context.report_error(&StoreError::Flush { key, source });
                }
            }
        });
    }
}
