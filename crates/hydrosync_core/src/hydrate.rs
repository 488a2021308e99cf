//! The hydration pass: derives the store's starting state from persisted
//! data plus its initial value, exactly once per store instance.

use crate::config::Validation;
use crate::error::StoreError;
use crate::merge::deep_merge;
use crate::readiness::ReadinessHandle;
use crate::status::{HydrationReport, UnitStatus};
use crate::store::{EngineContext, PersistUnit};
use hydrosync_storage::{StorageBackend, StorageError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Runs hydration and settles the readiness signal.
///
/// Per-unit failures are contained: the unit keeps its initial value, the
/// error goes to the sink and the remaining units still hydrate. The one
/// fatal path is the final state application failing, which fails the
/// readiness signal.
pub(crate) async fn run(context: Arc<EngineContext>, readiness: ReadinessHandle) {
    let Some(backend) = context.backend.clone() else {
        readiness.succeed(HydrationReport::not_configured());
        return;
    };

    let initial = context.initial.clone();
    let mut next = initial.clone();
    let mut statuses = BTreeMap::new();

    for unit in &context.units {
        let status = match hydrate_unit(&context, backend.as_ref(), unit, &initial, &mut next).await
        {
            Ok(status) => status,
            Err(source) => {
                context.report_error(&StoreError::Hydration {
                    unit: unit.label.clone(),
                    source,
                });
                UnitStatus::Error
            }
        };
        statuses.insert(unit.label.clone(), status);
    }

    let report = HydrationReport::aggregate(statuses);
    tracing::debug!(overall = ?report.overall, units = report.units.len(), "hydration complete");

    match context.apply_engine_state(next) {
        Ok(()) => readiness.succeed(report),
        Err(apply) => {
            let error = StoreError::Apply(apply);
            context.report_error(&error);
            readiness.fail(error.to_string());
        }
    }
}

/// Hydrates one unit, folding its accepted value into `next`.
async fn hydrate_unit(
    context: &EngineContext,
    backend: &dyn StorageBackend,
    unit: &PersistUnit,
    initial: &Value,
    next: &mut Value,
) -> Result<UnitStatus, StorageError> {
    if context.config.discard.evaluate() {
        // Discard directive short-circuits: the backend is not read.
        tracing::debug!(unit = %unit.label, "persisted value discarded by directive");
        return Ok(UnitStatus::Discarded);
    }

    let Some(raw) = backend.get_item(&unit.key).await? else {
        // Nothing persisted; the initial value stands.
        return Ok(UnitStatus::Hydrated);
    };

    let accepted = match &context.config.validate {
        Some(validate) => match validate(&raw) {
            Validation::Accepted(Some(replacement)) => replacement,
            Validation::Accepted(None) => raw,
            Validation::Rejected => {
                tracing::debug!(unit = %unit.label, "persisted value rejected by validator");
                return Ok(UnitStatus::Discarded);
            }
        },
        None => raw,
    };

    match &unit.slice {
        None => {
            *next = match &context.config.merge {
                Some(merge) => merge(initial, &accepted),
                None => deep_merge(initial, &accepted),
            };
        }
        Some(slice) => {
            *next = (slice.apply)(next.clone(), accepted);
        }
    }

    Ok(UnitStatus::Hydrated)
}
