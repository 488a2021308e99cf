//! Structural merge of persisted values into initial state.

use serde_json::Value;

/// Deep-merges `persisted` over `initial`.
///
/// Mapping values merge key-by-key recursively; arrays and every other
/// value kind are replaced wholesale by the persisted side, never
/// concatenated or element-merged. Keys present only in `initial` survive.
///
/// This is the default merge used when the entire-state strategy has no
/// caller-supplied merge function, and by the reconciler when re-deriving
/// state from an external write.
pub fn deep_merge(initial: &Value, persisted: &Value) -> Value {
    match (initial, persisted) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                let next = match base.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        // Arrays, scalars and mismatched kinds: persisted wins wholesale.
        (_, persisted) => persisted.clone(),
    }
}
