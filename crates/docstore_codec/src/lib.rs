//! # DocStore Codec
//!
//! Payload conversion for DocStore.
//!
//! Callers hand the store JSON bytes; the driver speaks BSON. This crate
//! sits between the two:
//! - JSON object payloads become ordered native BSON documents
//! - BSON query results become [`Document`]s of tagged [`Value`]s
//! - Documents render back to plain JSON
//!
//! ## Rules
//!
//! - The top-level payload must be a JSON object
//! - Integers use the narrowest BSON width (`Int32`, then `Int64`)
//! - Well-formed `{"$oid": ...}` and `{"$date": ...}` are the only extended
//!   JSON forms; anything else stays a plain object
//! - Conversion is pure: no I/O, deterministic output
//!
//! ## Usage
//!
//! ```
//! use docstore_codec::{json_to_bson, Document, Value};
//!
//! let native = json_to_bson(br#"{"Name":"john","Age":44}"#).unwrap();
//! let doc = Document::from(native);
//! assert_eq!(doc.get("Age"), Some(&Value::Int(44)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod identifier;
mod json;
mod native;
mod value;

pub use error::{CodecError, CodecResult};
pub use identifier::Identifier;
pub use json::{json_to_bson, json_to_document};
pub use value::{Document, Value};

/// Re-export of the BSON crate so callers build filters with the same version.
pub use bson;
