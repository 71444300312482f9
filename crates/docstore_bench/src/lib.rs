//! Benchmark utilities.

#![warn(missing_docs)]

use serde_json::{json, Map, Value as Json};

/// A flat person record as JSON bytes.
pub fn person_payload(index: usize) -> Vec<u8> {
    let payload = json!({
        "Name": format!("person_{index}"),
        "Gender": if index % 2 == 0 { "female" } else { "male" },
        "Age": 20 + (index % 60),
    });
    serde_json::to_vec(&payload).expect("JSON always serializes")
}

/// A JSON object with `width` fields per level, nested `depth` levels.
pub fn nested_object(depth: usize, width: usize) -> Json {
    if depth == 0 {
        return json!("leaf");
    }
    let fields: Map<String, Json> = (0..width)
        .map(|i| (format!("key_{i}"), nested_object(depth - 1, width)))
        .collect();
    Json::Object(fields)
}

/// A JSON object with `count` scalar fields of mixed types.
pub fn wide_object(count: usize) -> Vec<u8> {
    let fields: Map<String, Json> = (0..count)
        .map(|i| {
            let value = match i % 4 {
                0 => json!(i),
                1 => json!(i as f64 + 0.5),
                2 => json!(format!("value_{i}")),
                _ => json!(i % 3 == 0),
            };
            (format!("field_{i}"), value)
        })
        .collect();
    serde_json::to_vec(&Json::Object(fields)).expect("JSON always serializes")
}
