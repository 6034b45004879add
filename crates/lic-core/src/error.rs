//! # Error Types
//!
//! Errors raised by the foundational types. All use `thiserror`.

use thiserror::Error;

/// Error during canonical serialization.
///
/// Any occurrence is a programming error on the producing side: the value
/// handed to the canonicalizer has no canonical representation.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// A float was NaN or infinite.
    #[error("non-finite number has no canonical representation: {0}")]
    NonFiniteNumber(String),

    /// Conversion to a JSON value tree failed (non-string map keys,
    /// failing `Serialize` impls).
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A value failed a domain validation rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Timestamp text could not be parsed or is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A required string field was empty or whitespace.
    #[error("field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// An identifier violated its format rules.
    #[error("invalid {kind} identifier: {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        reason: String,
    },

    /// A field held a value outside its allowed set.
    #[error("invalid value for `{field}`: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    /// The validity window is empty or inverted once both ends are truncated
    /// to whole seconds.
    #[error(
        "valid_from ({valid_from}) must be strictly before valid_until ({valid_until}); \
         timestamps are truncated to whole seconds before comparison"
    )]
    InvalidWindow {
        valid_from: String,
        valid_until: String,
    },
}
