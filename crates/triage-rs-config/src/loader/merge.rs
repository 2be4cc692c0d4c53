//! Deep merge of one config layer over another.

use serde_json::Value;

/// Merge overlay values into the base; objects merge key by key, anything
/// else (including arrays) is replaced wholesale.
pub(super) fn merge_json_values(base: &mut Value, overlay: &Value) {
    let (Value::Object(target), Value::Object(patch)) = (&mut *base, overlay) else {
        *base = overlay.clone();
        return;
    };
    for (key, incoming) in patch {
        target
            .entry(key.as_str())
            .and_modify(|current| merge_json_values(current, incoming))
            .or_insert_with(|| incoming.clone());
    }
}
