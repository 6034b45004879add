//! # Key Provider Abstraction
//!
//! Abstracts custody of the Ed25519 signing key behind a trait:
//!
//! - [`PemFileKeyProvider`]: reads a PEM PKCS#8 private key from a file on
//!   first use and caches it for the lifetime of the process.
//! - [`LocalKeyProvider`]: an in-memory key for tests and tooling.
//!
//! ## Security Invariants
//!
//! - The key is reachable only through [`SigningKeyHandle`], which can sign
//!   canonical bytes and report its public half. There is no accessor for
//!   the private key bytes, and `Debug` is redacted.
//! - Key material is zeroized on drop (`ed25519-dalek`'s `zeroize` feature),
//!   and the PEM text read from disk is held in `Zeroizing` while parsing.
//! - `KeyProvider` is `Send + Sync`; handles are shared as `Arc`.
//!
//! ## Single Initialization
//!
//! `PemFileKeyProvider` holds its cache behind a mutex that stays locked
//! for the duration of the first read. Concurrent first callers queue on
//! the mutex, so exactly one of them touches the filesystem and all of them
//! receive the same `Arc`. A failed load is not cached; the next call
//! retries.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer, SigningKey};
use lic_core::CanonicalBytes;
use parking_lot::Mutex;
use zeroize::Zeroizing;

use crate::ed25519::{Ed25519Signature, VerifyingKey};
use crate::error::KeyError;

/// The process-wide signing key.
///
/// Read-only after construction. Does not implement `Clone`, `Serialize`,
/// or any raw-bytes accessor.
pub struct SigningKeyHandle {
    key: SigningKey,
}

impl SigningKeyHandle {
    fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Parse a PEM PKCS#8 Ed25519 private key.
    ///
    /// `location` is used only in the error message.
    pub fn from_pkcs8_pem(pem: &str, location: &str) -> Result<Self, KeyError> {
        SigningKey::from_pkcs8_pem(pem)
            .map(Self::new)
            .map_err(|e| KeyError::KeyType {
                location: location.to_string(),
                reason: e.to_string(),
            })
    }

    /// Sign canonical bytes.
    ///
    /// Ed25519 is deterministic: the same bytes under the same key always
    /// produce the same signature.
    pub fn sign(&self, data: &CanonicalBytes) -> Ed25519Signature {
        Ed25519Signature::from_bytes(self.key.sign(data.as_bytes()).to_bytes())
    }

    /// Return the public half of the key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl std::fmt::Debug for SigningKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKeyHandle(<private>)")
    }
}

/// Source of the signing key.
///
/// Implementations must be `Send + Sync` for use from async handlers and
/// worker threads.
pub trait KeyProvider: Send + Sync {
    /// Return the signing key, loading it on first use.
    fn signing_key(&self) -> Result<Arc<SigningKeyHandle>, KeyError>;

    /// Human-readable name for this provider (for diagnostics/logging).
    fn provider_name(&self) -> &str;
}

// ─── PemFileKeyProvider ─────────────────────────────────────────────────

/// Loads a PEM PKCS#8 Ed25519 private key from a file, once.
///
/// Construction does not touch the filesystem.
pub struct PemFileKeyProvider {
    path: PathBuf,
    cached: Mutex<Option<Arc<SigningKeyHandle>>>,
    reads: AtomicUsize,
}

impl PemFileKeyProvider {
    /// Create a provider for the key at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: Mutex::new(None),
            reads: AtomicUsize::new(0),
        }
    }

    /// The configured key path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of times the key file has been read.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn load(&self) -> Result<SigningKeyHandle, KeyError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let bytes = std::fs::read(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                KeyError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                KeyError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;
        let location = self.path.display().to_string();
        let pem = Zeroizing::new(String::from_utf8(bytes).map_err(|_| KeyError::KeyType {
            location: location.clone(),
            reason: "file is not UTF-8 PEM text".to_string(),
        })?);
        warn_if_permissive(&self.path);
        SigningKeyHandle::from_pkcs8_pem(&pem, &location)
    }
}

impl KeyProvider for PemFileKeyProvider {
    fn signing_key(&self) -> Result<Arc<SigningKeyHandle>, KeyError> {
        let mut cached = self.cached.lock();
        if let Some(handle) = cached.as_ref() {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(self.load().map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "signing key load failed");
            e
        })?);
        tracing::info!(path = %self.path.display(), "signing key loaded");
        *cached = Some(Arc::clone(&handle));
        Ok(handle)
    }

    fn provider_name(&self) -> &str {
        "PemFileKeyProvider"
    }
}

impl std::fmt::Debug for PemFileKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemFileKeyProvider")
            .field("path", &self.path)
            .field("loaded", &self.cached.lock().is_some())
            .finish()
    }
}

#[cfg(unix)]
fn warn_if_permissive(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = %format!("{mode:o}"),
                "signing key file is readable by group or others; expected 0600"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_permissive(_path: &Path) {}

// ─── LocalKeyProvider ───────────────────────────────────────────────────

/// In-memory Ed25519 key provider for tests and tooling.
pub struct LocalKeyProvider {
    handle: Arc<SigningKeyHandle>,
}

impl LocalKeyProvider {
    /// Generate a new random key using the OS CSPRNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut rand_core::OsRng))
    }

    /// Create from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    /// Create from PEM PKCS#8 text already in memory.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, KeyError> {
        Ok(Self {
            handle: Arc::new(SigningKeyHandle::from_pkcs8_pem(pem, "<memory>")?),
        })
    }

    fn from_signing_key(key: SigningKey) -> Self {
        Self {
            handle: Arc::new(SigningKeyHandle::new(key)),
        }
    }
}

impl KeyProvider for LocalKeyProvider {
    fn signing_key(&self) -> Result<Arc<SigningKeyHandle>, KeyError> {
        Ok(Arc::clone(&self.handle))
    }

    fn provider_name(&self) -> &str {
        "LocalKeyProvider"
    }
}

impl std::fmt::Debug for LocalKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LocalKeyProvider(<private>)")
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────
