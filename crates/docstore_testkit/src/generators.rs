//! Property-based test generators using proptest.
//!
//! Provides strategies for JSON payloads the store must accept and for
//! payloads it must reject before any backend call.

use crate::fixtures::Person;
use proptest::prelude::*;
use serde_json::{Map, Value as Json};

/// Strategy for field names that are plain keys: no `$` prefix, no dots.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for object keys, including `$`-prefixed ones and the names of
/// extended JSON literals.
pub fn json_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        6 => field_name_strategy(),
        1 => Just("$oid".to_string()),
        1 => Just("$date".to_string()),
        1 => "\\$[a-z]{1,8}",
    ]
}

/// Strategy for JSON scalars that survive a BSON round trip unchanged.
pub fn json_scalar_strategy() -> impl Strategy<Value = Json> {
    prop_oneof![
        Just(Json::Null),
        any::<bool>().prop_map(Json::Bool),
        any::<i64>().prop_map(Json::from),
        (-1.0e12..1.0e12f64).prop_map(Json::from),
        "\\PC{0,16}".prop_map(Json::String),
    ]
}

/// Strategy for JSON values nested up to three levels deep.
pub fn json_value_strategy() -> impl Strategy<Value = Json> {
    json_scalar_strategy().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Json::Array),
            prop::collection::btree_map(json_key_strategy(), inner, 0..6)
                .prop_map(|fields| Json::Object(fields.into_iter().collect())),
        ]
    })
}

/// Strategy for JSON objects, the only valid payload shape.
pub fn json_object_strategy() -> impl Strategy<Value = Map<String, Json>> {
    prop::collection::btree_map(json_key_strategy(), json_value_strategy(), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for valid JSON whose top level is not an object.
pub fn non_object_json_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        json_scalar_strategy(),
        prop::collection::vec(json_value_strategy(), 0..4).prop_map(Json::Array),
    ]
    .prop_map(|value| serde_json::to_vec(&value).expect("JSON always serializes"))
}

/// Strategy for bytes that do not parse as a JSON object.
pub fn invalid_json_strategy() -> impl Strategy<Value = Vec<u8>> {
    let truncated = json_object_strategy()
        .prop_filter("need at least one field", |object| !object.is_empty())
        .prop_map(|object| {
            let mut bytes = serde_json::to_vec(&object).expect("JSON always serializes");
            bytes.pop();
            bytes
        });
    let noise = prop::collection::vec(any::<u8>(), 0..64)
        .prop_filter("must not be a JSON object", |bytes| {
            serde_json::from_slice::<Map<String, Json>>(bytes).is_err()
        });
    prop_oneof![truncated, noise]
}

/// Strategy for every payload the store must reject as malformed.
pub fn malformed_payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![non_object_json_strategy(), invalid_json_strategy()]
}

/// Strategy for people with plausible fields.
pub fn person_strategy() -> impl Strategy<Value = Person> {
    (
        "[a-z]{1,12}",
        prop_oneof![Just("male"), Just("female")],
        0i64..120,
    )
        .prop_map(|(name, gender, age)| Person::new(name, gender, age))
}
