use serde_json::Value;

/// Keeps only the entries of a browser export that belong to the top-level
/// page load.
///
/// An entry counts as main-frame if `requestInfo.type` is `"main_frame"` or
/// its own `type` is `"primaryRequest"`. Non-array payloads are returned
/// unchanged.
pub fn filter_main_frame(payload: Value) -> Value {
    match payload {
        Value::Array(entries) => Value::Array(
            entries
                .into_iter()
                .filter(|entry| {
                    entry.pointer("/requestInfo/type").and_then(Value::as_str) == Some("main_frame")
                        || entry.get("type").and_then(Value::as_str) == Some("primaryRequest")
                })
                .collect(),
        ),
        other => other,
    }
}
