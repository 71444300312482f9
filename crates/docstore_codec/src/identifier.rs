//! Server-assigned document identifiers.

use crate::error::{CodecError, CodecResult};
use bson::oid::ObjectId;
use std::fmt;
use std::str::FromStr;

/// A 12-byte document identifier assigned by the server on insert.
///
/// Wraps the BSON ObjectId so callers never handle driver types for
/// by-identifier lookups and updates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; 12]);

impl Identifier {
    /// Size of an identifier in bytes.
    pub const LEN: usize = 12;

    /// Creates an identifier from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Generates a fresh identifier locally.
    ///
    /// Uses the same timestamp/counter layout the server uses.
    pub fn generate() -> Self {
        Self(ObjectId::new().bytes())
    }

    /// Returns the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Returns true if every byte is zero.
    pub fn is_nil(&self) -> bool {
        self.0 == [0u8; 12]
    }

    /// Parses a 24 digit hex string.
    pub fn parse_str(s: &str) -> CodecResult<Self> {
        ObjectId::parse_str(s)
            .map(Self::from)
            .map_err(|_| CodecError::invalid_identifier(s))
    }

    /// Returns the lowercase hex form.
    pub fn to_hex(&self) -> String {
        ObjectId::from(*self).to_hex()
    }

    /// Returns the native ObjectId.
    pub fn to_object_id(&self) -> ObjectId {
        ObjectId::from(*self)
    }
}

impl From<ObjectId> for Identifier {
    fn from(oid: ObjectId) -> Self {
        Self(oid.bytes())
    }
}

impl From<Identifier> for ObjectId {
    fn from(id: Identifier) -> Self {
        ObjectId::from_bytes(id.0)
    }
}

impl FromStr for Identifier {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let id = Identifier::parse_str("5d678d799139918d230cfd41").unwrap();
        assert_eq!(id.to_hex(), "5d678d799139918d230cfd41");
        assert_eq!(id.to_string(), "5d678d799139918d230cfd41");
        assert_eq!("5d678d799139918d230cfd41".parse::<Identifier>().unwrap(), id);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(matches!(
            Identifier::parse_str("not-an-id"),
            Err(CodecError::InvalidIdentifier { .. })
        ));
        assert!(Identifier::parse_str("5d678d79").is_err());
    }

    #[test]
    fn generated_ids_differ() {
        let a = Identifier::generate();
        let b = Identifier::generate();
        assert_ne!(a, b);
        assert!(!a.is_nil());
        assert!(Identifier::from_bytes([0u8; 12]).is_nil());
    }

    #[test]
    fn object_id_conversion() {
        let oid = ObjectId::new();
        let id = Identifier::from(oid);
        assert_eq!(id.to_object_id(), oid);
        assert_eq!(id.as_bytes(), &oid.bytes());
    }
}
