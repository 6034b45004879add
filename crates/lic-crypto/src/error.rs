//! Error types for key custody and signature handling.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to obtain the signing key.
///
/// Every variant is an operational fault: the service cannot issue anything
/// until the key is fixed, so callers surface these loudly.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The configured key path does not exist.
    #[error("signing key not found at {}", path.display())]
    NotFound { path: PathBuf },

    /// The material is not a PEM-encoded PKCS#8 Ed25519 private key.
    #[error("signing key at {location} is not a PEM PKCS#8 Ed25519 private key: {reason}")]
    KeyType { location: String, reason: String },

    /// The key file exists but could not be read.
    #[error("failed to read signing key at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from signature encoding, public key handling, and verification.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature did not verify against the message and key.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Signature text was not 64 bytes of unpadded base64url.
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// Public key material could not be decoded.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// PEM encoding of generated key material failed.
    #[error("key encoding failed: {0}")]
    KeyEncoding(String),
}
