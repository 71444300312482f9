//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while converting a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The bytes are not valid JSON.
    #[error("invalid JSON: {message}")]
    InvalidJson {
        /// Parser message, including line and column.
        message: String,
    },

    /// The top-level JSON value is not an object.
    #[error("expected a JSON object at the top level, found {found}")]
    NotAnObject {
        /// Kind of the value that was found instead.
        found: &'static str,
    },

    /// An integer does not fit the signed 64-bit range.
    #[error("integer {value} does not fit a signed 64-bit BSON integer")]
    IntegerOverflow {
        /// The offending value, as written.
        value: String,
    },

    /// An identifier string is not 24 hex digits.
    #[error("invalid object identifier: {value:?}")]
    InvalidIdentifier {
        /// The rejected literal.
        value: String,
    },

    /// A field holds a value the caller-facing contract cannot carry.
    #[error("unsupported value in field {field:?}: {reason}")]
    UnsupportedValue {
        /// Field name holding the value.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl CodecError {
    /// Create an invalid JSON error.
    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::InvalidJson {
            message: message.into(),
        }
    }

    /// Create an invalid identifier error.
    pub fn invalid_identifier(value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
        }
    }

    /// Create an unsupported value error.
    pub fn unsupported_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_json(err.to_string())
    }
}
