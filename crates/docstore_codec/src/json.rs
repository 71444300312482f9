//! JSON payload decoding.

use crate::error::{CodecError, CodecResult};
use crate::identifier::Identifier;
use crate::native::narrow_int;
use crate::value::Document;
use bson::Bson;
use serde_json::{Map, Number, Value as Json};

/// Converts a JSON payload into a native BSON document.
///
/// Field order follows the payload, which matters for driver calls such as
/// sort specifications and index keys.
///
/// Two extended JSON literals are recognised so identifiers and dates can
/// travel through JSON filters: `{"$oid": "<24 hex>"}` and
/// `{"$date": <millis>}`. Any other object, including a literal whose value
/// is not well formed, is taken verbatim, which keeps query operators like
/// `{"$eq": 44}` intact.
///
/// # Errors
///
/// Returns [`CodecError::InvalidJson`] for bytes that do not parse and
/// [`CodecError::NotAnObject`] when the payload is a scalar or array.
pub fn json_to_bson(payload: &[u8]) -> CodecResult<bson::Document> {
    let parsed: Json = serde_json::from_slice(payload)?;
    match parsed {
        Json::Object(map) => object_to_document(map),
        other => Err(CodecError::NotAnObject {
            found: json_kind(&other),
        }),
    }
}

/// Converts a JSON payload into a caller-facing [`Document`].
///
/// # Errors
///
/// Same as [`json_to_bson`].
pub fn json_to_document(payload: &[u8]) -> CodecResult<Document> {
    json_to_bson(payload).map(Document::from)
}

fn object_to_document(map: Map<String, Json>) -> CodecResult<bson::Document> {
    let mut doc = bson::Document::new();
    for (key, value) in map {
        let converted = json_value_to_bson(value)?;
        doc.insert(key, converted);
    }
    Ok(doc)
}

fn json_value_to_bson(value: Json) -> CodecResult<Bson> {
    match value {
        Json::Null => Ok(Bson::Null),
        Json::Bool(b) => Ok(Bson::Boolean(b)),
        Json::Number(n) => number_to_bson(&n),
        Json::String(s) => Ok(Bson::String(s)),
        Json::Array(items) => items
            .into_iter()
            .map(json_value_to_bson)
            .collect::<CodecResult<Vec<_>>>()
            .map(Bson::Array),
        Json::Object(map) => match extended_literal(&map) {
            Some(literal) => Ok(literal),
            None => object_to_document(map).map(Bson::Document),
        },
    }
}

fn number_to_bson(n: &Number) -> CodecResult<Bson> {
    if let Some(i) = n.as_i64() {
        return Ok(narrow_int(i));
    }
    if n.is_u64() {
        return Err(CodecError::IntegerOverflow {
            value: n.to_string(),
        });
    }
    n.as_f64()
        .map(Bson::Double)
        .ok_or_else(|| CodecError::invalid_json(format!("unrepresentable number {n}")))
}

fn extended_literal(map: &Map<String, Json>) -> Option<Bson> {
    if map.len() != 1 {
        return None;
    }
    match map.iter().next()? {
        (key, Json::String(hex)) if key == "$oid" => Identifier::parse_str(hex)
            .ok()
            .map(|id| Bson::ObjectId(id.to_object_id())),
        (key, millis) if key == "$date" => millis
            .as_i64()
            .map(|ms| Bson::DateTime(bson::DateTime::from_millis(ms))),
        _ => None,
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
