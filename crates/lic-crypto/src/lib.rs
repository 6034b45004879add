//! # lic-crypto: Signing Primitives for License Issuance
//!
//! - **Ed25519** ([`ed25519`]): the signature newtype, base64url encoding,
//!   PEM key encoding, and verification helpers.
//! - **Key custody** ([`key_provider`]): the `KeyProvider` trait, the
//!   lazily-loaded `PemFileKeyProvider`, and the in-memory `LocalKeyProvider`.
//!
//! ## Crate Policy
//!
//! - Signing input is always `&CanonicalBytes`. Raw byte slices cannot be
//!   signed.
//! - Private keys are never serialized, logged, or returned as raw bytes.
//!   `SigningKeyHandle` has a redacted `Debug` and no byte accessors.

pub mod ed25519;
pub mod error;
pub mod key_provider;

pub use ed25519::{
    generate_pem_keypair, verify, verifying_key_from_pem, Ed25519Signature, KeyAlgorithm,
    PemKeyPair, VerifyingKey,
};
pub use error::{CryptoError, KeyError};
pub use key_provider::{KeyProvider, LocalKeyProvider, PemFileKeyProvider, SigningKeyHandle};
