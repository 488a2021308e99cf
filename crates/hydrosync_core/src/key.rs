//! Backend key resolution and store-id slugs.

use hydrosync_storage::{KeyRequest, StorageBackend, UnitKind};

/// Default prefix for the built-in key scheme.
pub const DEFAULT_KEY_PREFIX: &str = "persist";

/// Derives a stable store-id slug from a display name.
///
/// Trims, lowercases, collapses whitespace runs into single hyphens and
/// strips every character outside `[a-z0-9-_]`. The result may be empty
/// for names with no usable characters; callers must treat that as a
/// configuration error.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    for part in lowered.split_whitespace() {
        let cleaned: String = part
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_')
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&cleaned);
    }
    slug
}

/// Default key scheme: `<prefix>:<storeId>:entire` for the entire unit,
/// `<prefix>:<storeId>:slice:<sliceKey>` for a slice unit.
pub fn default_key(prefix: &str, store_id: &str, kind: UnitKind, slice_key: Option<&str>) -> String {
    match kind {
        UnitKind::Entire => format!("{prefix}:{store_id}:entire"),
        UnitKind::Slice => {
            let slice_key = slice_key.unwrap_or_default();
            format!("{prefix}:{store_id}:slice:{slice_key}")
        }
    }
}

/// Resolves the backend key for one persistence unit.
///
/// A backend-supplied resolver is used exclusively when present; otherwise
/// the default scheme applies. Deterministic and collision-free across the
/// units of one store as long as slice keys are unique.
pub fn resolve_key(
    backend: &dyn StorageBackend,
    prefix: &str,
    store_id: &str,
    kind: UnitKind,
    slice_key: Option<&str>,
) -> String {
    let request = KeyRequest {
        store_id,
        kind,
        slice_key,
    };
    match backend.resolve_key(&request) {
        Some(key) => key,
        None => default_key(prefix, store_id, kind, slice_key),
    }
}
