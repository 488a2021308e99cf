//! Configuration for a persisted store.

use crate::error::ErrorSink;
use crate::key::DEFAULT_KEY_PREFIX;
use hydrosync_storage::Pacing;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Normalized outcome of a persisted-value validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// Accept the persisted value. `Some` substitutes a transformed value
    /// for the raw persisted one before merge/apply.
    Accepted(Option<Value>),
    /// Reject the persisted value; the unit is discarded and the initial
    /// value kept.
    Rejected,
}

/// Validator invoked with the raw persisted value of each unit.
pub type Validator = Arc<dyn Fn(&Value) -> Validation + Send + Sync>;

/// Merge function for the entire-state strategy, receiving
/// `(initial, persisted)` and returning the new state.
pub type MergeFn = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// Directive deciding whether persisted data is discarded without reading
/// the backend, evaluated once per unit at hydration time.
#[derive(Clone, Default)]
pub enum Discard {
    /// Never discard.
    #[default]
    Never,
    /// Always discard; the backend is not read at all.
    Always,
    /// Discard when the predicate evaluates true at hydration time.
    When(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl Discard {
    pub(crate) fn evaluate(&self) -> bool {
        match self {
            Discard::Never => false,
            Discard::Always => true,
            Discard::When(predicate) => predicate(),
        }
    }
}

impl fmt::Debug for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discard::Never => f.write_str("Never"),
            Discard::Always => f.write_str("Always"),
            Discard::When(_) => f.write_str("When(..)"),
        }
    }
}

/// A named, independently persisted projection of state.
#[derive(Clone)]
pub struct SliceDescriptor {
    /// Unique key among the store's slices.
    pub key: String,
    /// Pure projection from state to the slice value.
    ///
    /// The scheduler compares this projection between the previous and
    /// current state to decide whether the slice changed; it must produce
    /// a different value whenever semantically relevant content changed.
    pub select: Arc<dyn Fn(&Value) -> Value + Send + Sync>,
    /// Pure reducer folding a slice value back into state.
    pub apply: Arc<dyn Fn(Value, Value) -> Value + Send + Sync>,
}

impl SliceDescriptor {
    /// Creates a slice descriptor.
    pub fn new(
        key: impl Into<String>,
        select: impl Fn(&Value) -> Value + Send + Sync + 'static,
        apply: impl Fn(Value, Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            key: key.into(),
            select: Arc::new(select),
            apply: Arc::new(apply),
        }
    }
}

impl fmt::Debug for SliceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceDescriptor")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Persistence strategy, fixed per store instance.
#[derive(Debug, Clone, Default)]
pub enum Strategy {
    /// One unit covering the whole state.
    #[default]
    Entire,
    /// One unit per slice, hydrated and reset in configured order.
    Slices(Vec<SliceDescriptor>),
}

/// Configuration for a persisted store.
#[derive(Clone)]
pub struct StoreConfig {
    /// Stable store identifier.
    pub id: Option<String>,
    /// Display name used to derive the identifier when `id` is absent.
    pub name: Option<String>,
    /// Prefix for the default key scheme.
    pub key_prefix: String,
    /// Persistence strategy.
    pub strategy: Strategy,
    /// Merge for accepted persisted values under the entire strategy;
    /// `None` uses the structural deep merge.
    pub merge: Option<MergeFn>,
    /// Validator for raw persisted values.
    pub validate: Option<Validator>,
    /// Discard directive.
    pub discard: Discard,
    /// Pacing override; `None` defers to the backend's preference, then to
    /// the default debounce.
    pub pacing: Option<Pacing>,
    /// Recoverable-error callback.
    pub error_sink: Option<ErrorSink>,
}

impl StoreConfig {
    /// Creates a configuration with an explicit store id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            strategy: Strategy::Entire,
            merge: None,
            validate: None,
            discard: Discard::Never,
            pacing: None,
            error_sink: None,
        }
    }

    /// Creates a configuration identified by a display name; the id slug is
    /// derived at construction.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            ..Self::new("")
        }
    }

    /// Sets the key-scheme prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Switches to the slice strategy.
    pub fn with_slices(mut self, slices: Vec<SliceDescriptor>) -> Self {
        self.strategy = Strategy::Slices(slices);
        self
    }

    /// Sets a caller-supplied merge for the entire strategy.
    pub fn with_merge(mut self, merge: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static) -> Self {
        self.merge = Some(Arc::new(merge));
        self
    }

    /// Sets a validator for raw persisted values.
    pub fn with_validator(
        mut self,
        validate: impl Fn(&Value) -> Validation + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Sets the discard directive.
    pub fn with_discard(mut self, discard: Discard) -> Self {
        self.discard = discard;
        self
    }

    /// Overrides the pacing policy.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Installs a recoverable-error callback.
    pub fn with_error_sink(mut self, sink: impl Fn(&crate::StoreError) + Send + Sync + 'static) -> Self {
        self.error_sink = Some(Arc::new(sink));
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("key_prefix", &self.key_prefix)
            .field("strategy", &self.strategy)
            .field("discard", &self.discard)
            .field("pacing", &self.pacing)
            .finish_non_exhaustive()
    }
}
