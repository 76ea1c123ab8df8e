use serde_json::{Map, Value};

/// Recursively merge `patch` into `target`.
///
/// Objects are merged key by key; any other pairing replaces the target value
/// with the patch value, so the patch wins every conflict.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target_map), Value::Object(patch_map)) => {
            merge_maps(target_map, patch_map);
        }
        (target, patch) => {
            *target = patch.clone();
        }
    }
}

fn merge_maps(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, patch_value) in patch {
        match target.get_mut(key) {
            Some(existing) => deep_merge(existing, patch_value),
            None => {
                target.insert(key.clone(), patch_value.clone());
            }
        }
    }
}

/// Return a merged copy without touching either input.
pub fn deep_merged(base: &Value, patch: &Value) -> Value {
    let mut merged = base.clone();
    deep_merge(&mut merged, patch);
    merged
}

/// Read a string field from an object payload.
pub fn string_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}
