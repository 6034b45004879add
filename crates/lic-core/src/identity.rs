//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier that appears in a license payload.
//! You cannot pass a `ProductId` where an `EditionId` is expected, which
//! matters because the edition/product relationship check compares exactly
//! these two.
//!
//! Catalog identifiers are opaque strings chosen by operators
//! (`cust-1001`, `prod-data-pipeline`). License identifiers are UUID-v4
//! values generated at issuance.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum length of a catalog identifier, in characters.
pub const MAX_ID_LEN: usize = 64;

/// Unique identifier for an issued license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseId(Uuid);

impl LicenseId {
    /// Generate a new random (v4) license identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse the hyphenated string form.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| ValidationError::InvalidIdentifier {
                kind: "license",
                reason: e.to_string(),
            })
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LicenseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LicenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl std::str::FromStr for LicenseId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_catalog_id(kind: &'static str, raw: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidIdentifier {
        kind,
        reason: reason.to_string(),
    };
    if raw.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if raw.chars().count() > MAX_ID_LEN {
        return Err(invalid("longer than 64 characters"));
    }
    if raw.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(invalid("must not contain whitespace or control characters"));
    }
    Ok(())
}

macro_rules! catalog_id {
    ($(#[$doc:meta])* $name:ident, $kind:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Validate and wrap a catalog identifier.
            pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
                let raw = raw.into();
                validate_catalog_id($kind, &raw)?;
                Ok(Self(raw))
            }

            /// Access the identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

catalog_id!(
    /// Identifier of a customer in the catalog.
    CustomerId,
    "customer"
);
catalog_id!(
    /// Identifier of a product in the catalog.
    ProductId,
    "product"
);
catalog_id!(
    /// Identifier of a product edition in the catalog.
    EditionId,
    "edition"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn license_id_is_v4_and_unique() {
        let a = LicenseId::new();
        let b = LicenseId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn license_id_serializes_as_hyphenated_string() {
        let id = LicenseId::parse("3f2c8a4e-9b1d-4c6e-8f0a-123456789abc").unwrap();
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"3f2c8a4e-9b1d-4c6e-8f0a-123456789abc\""
        );
        assert_eq!(id.to_string(), "3f2c8a4e-9b1d-4c6e-8f0a-123456789abc");
    }

    #[test]
    fn license_id_parse_rejects_garbage() {
        assert!(LicenseId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn catalog_id_accepts_typical_values() {
        assert_eq!(CustomerId::new("cust-1001").unwrap().as_str(), "cust-1001");
        assert!(ProductId::new("prod-data-pipeline").is_ok());
        assert!(EditionId::new("ed-enterprise").is_ok());
    }

    #[test]
    fn catalog_id_rejects_empty_and_whitespace() {
        assert!(CustomerId::new("").is_err());
        assert!(CustomerId::new("   ").is_err());
        assert!(CustomerId::new("cust 1").is_err());
    }

    #[test]
    fn catalog_id_rejects_overlong() {
        assert!(ProductId::new("p".repeat(64)).is_ok());
        let err = ProductId::new("p".repeat(65)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidIdentifier { kind: "product", .. }
        ));
    }

    #[test]
    fn catalog_id_deserialize_validates() {
        let ok: EditionId = serde_json::from_str("\"ed-pro\"").unwrap();
        assert_eq!(ok.as_str(), "ed-pro");
        assert!(serde_json::from_str::<EditionId>("\"\"").is_err());
    }
}
