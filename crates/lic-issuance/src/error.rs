//! Error types for the issuance pipeline.

use std::path::PathBuf;

use lic_core::{CanonicalizationError, LicenseId, ValidationError};
use lic_crypto::KeyError;
use thiserror::Error;

use crate::store::LicenseStatus;

/// Which catalog entity a lookup referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Customer,
    Product,
    Edition,
    Template,
    Key,
    License,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Product => "product",
            Self::Edition => "edition",
            Self::Template => "template",
            Self::Key => "signing key",
            Self::License => "license",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog loading and lookup failures.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog document is not valid YAML of the expected shape.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two entities of the same kind share an id.
    #[error("duplicate {kind} id {id:?}")]
    Duplicate { kind: EntityKind, id: String },

    /// The catalog violates a consistency rule.
    #[error("invalid catalog: {0}")]
    Invalid(String),

    /// A lookup backend failed.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// License record persistence failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A record with this license id already exists.
    #[error("license {0} already exists")]
    Conflict(LicenseId),

    /// No record exists for this license id.
    #[error("license {0} not found")]
    NotFound(LicenseId),

    /// The status change is not allowed from the current status.
    #[error("cannot change license status from {from} to {to}")]
    InvalidTransition {
        from: LicenseStatus,
        to: LicenseStatus,
    },

    /// Filesystem failure in a file-backed store.
    #[error("store I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be encoded or decoded.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Signing failures.
#[derive(Error, Debug)]
pub enum SignError {
    /// The signing key could not be obtained.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The payload has no canonical encoding.
    #[error(transparent)]
    Encoding(#[from] CanonicalizationError),

    /// The key id is missing from the catalog or retired.
    #[error("signing key id {key_id:?} {reason}")]
    UnusableKeyId { key_id: String, reason: &'static str },

    /// The key registry could not be consulted.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Invalid configuration values.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable held an unparseable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },
}

/// Everything that can go wrong while issuing a license.
///
/// `NotFound`, `Relationship` and `Validation` are client errors: the
/// request itself is wrong. The rest are operational and are never retried.
#[derive(Error, Debug)]
pub enum IssuanceError {
    /// A referenced entity does not exist.
    #[error("{entity} with id '{id}' does not exist")]
    NotFound { entity: EntityKind, id: String },

    /// The edition does not belong to the requested product.
    #[error("edition '{edition_id}' does not belong to product '{product_id}'")]
    Relationship {
        edition_id: String,
        product_id: String,
    },

    /// A field value or the validity window is invalid.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The signing key is missing or unusable.
    #[error("signing key unavailable: {0}")]
    Key(#[from] KeyError),

    /// The configured key id is not registered as an active key.
    #[error("signing key id {key_id:?} {reason}")]
    UnusableKeyId { key_id: String, reason: &'static str },

    /// The payload could not be canonicalized.
    #[error("payload encoding failed: {0}")]
    Encoding(#[from] CanonicalizationError),

    /// The record could not be stored; the signed license was discarded.
    #[error("license record could not be persisted: {0}")]
    Persistence(#[from] StoreError),

    /// The catalog backend failed.
    #[error("catalog lookup failed: {0}")]
    Catalog(#[from] CatalogError),
}

impl IssuanceError {
    /// Whether the caller caused this error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Relationship { .. } | Self::Validation(_)
        )
    }
}

impl From<SignError> for IssuanceError {
    fn from(err: SignError) -> Self {
        match err {
            SignError::Key(e) => Self::Key(e),
            SignError::Encoding(e) => Self::Encoding(e),
            SignError::UnusableKeyId { key_id, reason } => Self::UnusableKeyId { key_id, reason },
            SignError::Catalog(e) => Self::Catalog(e),
        }
    }
}
