//! Conversions between caller values and native BSON.

use crate::identifier::Identifier;
use crate::value::{Document, Value};
use bson::spec::BinarySubtype;
use bson::{Binary, Bson};

impl From<Bson> for Value {
    /// Decodes a BSON value.
    ///
    /// Types with no caller-facing counterpart are mapped lossily:
    /// Decimal128 keeps its 16 raw bytes, regex and code become text,
    /// timestamps pack `time << 32 | increment`, and the deprecated or
    /// sentinel types become null.
    fn from(bson: Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined | Bson::MaxKey | Bson::MinKey | Bson::DbPointer(_) => {
                Value::Null
            }
            Bson::Boolean(b) => Value::Bool(b),
            Bson::Int32(n) => Value::Int(i64::from(n)),
            Bson::Int64(n) => Value::Int(n),
            Bson::Double(f) => Value::Float(f),
            Bson::String(s) | Bson::Symbol(s) | Bson::JavaScriptCode(s) => Value::Text(s),
            Bson::JavaScriptCodeWithScope(code) => Value::Text(code.code),
            Bson::RegularExpression(regex) => {
                Value::Text(format!("/{}/{}", regex.pattern, regex.options))
            }
            Bson::Timestamp(ts) => Value::Int((i64::from(ts.time) << 32) | i64::from(ts.increment)),
            Bson::Decimal128(d) => Value::Binary(d.bytes().to_vec()),
            Bson::Binary(bin) => Value::Binary(bin.bytes),
            Bson::ObjectId(oid) => Value::Identifier(Identifier::from(oid)),
            Bson::DateTime(dt) => Value::DateTime(dt.timestamp_millis()),
            Bson::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Bson::Document(doc) => Value::Document(Document::from(doc)),
        }
    }
}

impl Value {
    /// Encodes this value as BSON.
    ///
    /// Integers take the narrowest BSON width that holds them.
    pub fn to_bson(&self) -> Bson {
        match self {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(*b),
            Value::Int(n) => narrow_int(*n),
            Value::Float(f) => Bson::Double(*f),
            Value::Text(s) => Bson::String(s.clone()),
            Value::Binary(bytes) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: bytes.clone(),
            }),
            Value::Identifier(id) => Bson::ObjectId(id.to_object_id()),
            Value::DateTime(millis) => Bson::DateTime(bson::DateTime::from_millis(*millis)),
            Value::Array(items) => Bson::Array(items.iter().map(Value::to_bson).collect()),
            Value::Document(doc) => Bson::Document(doc.to_bson()),
        }
    }
}

impl From<bson::Document> for Document {
    fn from(doc: bson::Document) -> Self {
        doc.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
    }
}

impl Document {
    /// Encodes this document as a native BSON document.
    ///
    /// Fields are emitted in key order.
    pub fn to_bson(&self) -> bson::Document {
        self.iter().map(|(k, v)| (k.clone(), v.to_bson())).collect()
    }
}

pub(crate) fn narrow_int(n: i64) -> Bson {
    i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32)
}
