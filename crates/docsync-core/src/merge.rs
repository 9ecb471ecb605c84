// ── Merge engine ──
//
// Applies partial property patches to cached entities. The only path by
// which local field edits reach the cache before they are written through.

use serde_json::Value;

use docsync_api::{Document, DocumentKey};

use crate::error::CoreError;
use crate::model::{EntityRecord, NESTED_COLLECTIONS};

/// Merge `patch` into `record.data`.
///
/// New keys are set directly. An existing `NestedCollections` key is
/// deep-merged so child references added by other writers survive; any
/// other existing key is overwritten.
///
/// Fails with [`CoreError::EntityGone`] when the record has no data.
pub fn apply_update(
    record: &mut EntityRecord,
    key: &DocumentKey,
    patch: Document,
) -> Result<(), CoreError> {
    let Some(data) = record.data.as_mut() else {
        return Err(CoreError::EntityGone { key: key.clone() });
    };

    for (field, value) in patch {
        match data.get_mut(&field) {
            Some(existing) if field == NESTED_COLLECTIONS => deep_merge(existing, value),
            Some(existing) => *existing = value,
            None => {
                data.insert(field, value);
            }
        }
    }
    Ok(())
}

/// Structural merge of `incoming` into `existing`.
///
/// Objects merge key by key, arrays are unioned (existing order kept, new
/// values appended once), anything else is replaced.
pub fn deep_merge(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(target), Value::Object(source)) => {
            for (k, v) in source {
                match target.get_mut(&k) {
                    Some(slot) => deep_merge(slot, v),
                    None => {
                        target.insert(k, v);
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(source)) => {
            for v in source {
                if !target.contains(&v) {
                    target.push(v);
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

/// Drop `child` from `data.NestedCollections[child.collection]`.
///
/// Returns `true` if an entry was removed. The collection's array is kept
/// even when it becomes empty.
pub fn remove_nested_child(data: &mut Document, child: &DocumentKey) -> bool {
    let Some(Value::Array(docs)) = data
        .get_mut(NESTED_COLLECTIONS)
        .and_then(Value::as_object_mut)
        .and_then(|nested| nested.get_mut(child.collection.as_str()))
    else {
        return false;
    };

    let before = docs.len();
    docs.retain(|v| v.as_str() != Some(child.doc.as_str()));
    docs.len() != before
}
