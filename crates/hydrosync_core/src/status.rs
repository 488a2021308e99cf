//! Hydration statuses and the hydration report.

use std::collections::BTreeMap;

/// Hydration status of a single persistence unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Hydration has not finished for this unit yet.
    Pending,
    /// The unit hydrated (including the nothing-persisted case).
    Hydrated,
    /// The persisted value was discarded; the initial value was kept.
    Discarded,
    /// Hydrating the unit failed; the initial value was kept.
    Error,
    /// No backend is attached to the store.
    NotConfigured,
}

impl UnitStatus {
    /// Returns true once the unit's hydration outcome is known.
    pub fn is_settled(&self) -> bool {
        !matches!(self, UnitStatus::Pending)
    }
}

/// Outcome of the hydration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationReport {
    /// Status aggregated across all units with precedence
    /// error > discarded > hydrated.
    pub overall: UnitStatus,
    /// Per-unit status, keyed by unit label (`"entire"` or the slice key).
    pub units: BTreeMap<String, UnitStatus>,
}

impl HydrationReport {
    /// Report for a store without a backend.
    pub fn not_configured() -> Self {
        Self {
            overall: UnitStatus::NotConfigured,
            units: BTreeMap::new(),
        }
    }

    /// Aggregates per-unit statuses into an overall status.
    pub fn aggregate(units: BTreeMap<String, UnitStatus>) -> Self {
        let statuses: Vec<UnitStatus> = units.values().copied().collect();
        let overall = if statuses.iter().any(|s| *s == UnitStatus::Error) {
            UnitStatus::Error
        } else if statuses.iter().any(|s| *s == UnitStatus::Discarded) {
            UnitStatus::Discarded
        } else {
            UnitStatus::Hydrated
        };
        Self { overall, units }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(statuses: &[(&str, UnitStatus)]) -> HydrationReport {
        HydrationReport::aggregate(
            statuses
                .iter()
                .map(|(k, s)| (k.to_string(), *s))
                .collect(),
        )
    }

    #[test]
    fn error_takes_precedence() {
        let report = report(&[
            ("a", UnitStatus::Hydrated),
            ("b", UnitStatus::Discarded),
            ("c", UnitStatus::Error),
        ]);
        assert_eq!(report.overall, UnitStatus::Error);
    }

    #[test]
    fn discarded_beats_hydrated() {
        let report = report(&[("a", UnitStatus::Hydrated), ("b", UnitStatus::Discarded)]);
        assert_eq!(report.overall, UnitStatus::Discarded);
    }

    #[test]
    fn all_hydrated() {
        let report = report(&[("a", UnitStatus::Hydrated), ("b", UnitStatus::Hydrated)]);
        assert_eq!(report.overall, UnitStatus::Hydrated);
    }

    #[test]
    fn settled_statuses() {
        assert!(!UnitStatus::Pending.is_settled());
        assert!(UnitStatus::Hydrated.is_settled());
        assert!(UnitStatus::Discarded.is_settled());
        assert!(UnitStatus::Error.is_settled());
        assert!(UnitStatus::NotConfigured.is_settled());
    }
}
