//! # Signer
//!
//! Turns a [`LicensePayload`] into the distributable license object:
//!
//! ```text
//! {
//!   "meta": { "version": 1, "alg": "Ed25519", "key_id": "main-v1" },
//!   "payload": { ... },
//!   "signature": "<base64url, no padding>"
//! }
//! ```
//!
//! The signature covers `CanonicalBytes::new(&payload)` and nothing else.
//! `meta` travels alongside unsigned so that verifiers can pick the public
//! key by `key_id` before checking anything.

use std::sync::Arc;

use lic_core::CanonicalBytes;
use lic_crypto::{verify, CryptoError, Ed25519Signature, KeyAlgorithm, KeyProvider, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, KeyMetadata};
use crate::error::{ConfigError, SignError};
use crate::payload::LicensePayload;

/// Default `meta.version`.
pub const DEFAULT_META_VERSION: u32 = 1;

/// Default `meta.key_id`.
pub const DEFAULT_KEY_ID: &str = "main-v1";

/// Unsigned metadata accompanying a signed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseMeta {
    pub version: u32,
    pub alg: KeyAlgorithm,
    /// Logical key name. Never key material.
    pub key_id: String,
}

/// The distributable license artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignedLicense {
    pub meta: LicenseMeta,
    pub payload: LicensePayload,
    pub signature: Ed25519Signature,
}

impl SignedLicense {
    /// Check the signature against the canonical payload bytes.
    pub fn verify(&self, key: &VerifyingKey) -> Result<(), CryptoError> {
        let canonical = CanonicalBytes::new(&self.payload)
            .map_err(|e| CryptoError::VerificationFailed(format!("payload not canonicalizable: {e}")))?;
        verify(&canonical, &self.signature, key)
    }
}

/// Settings that shape `meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerConfig {
    pub meta_version: u32,
    pub default_key_id: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            meta_version: DEFAULT_META_VERSION,
            default_key_id: DEFAULT_KEY_ID.to_string(),
        }
    }
}

impl SignerConfig {
    /// Load from the environment.
    ///
    /// Variables:
    /// - `LICENSE_META_VERSION` (default: 1)
    /// - `SIGNING_KEY_ID` (default: `main-v1`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let meta_version = match lookup("LICENSE_META_VERSION") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                var: "LICENSE_META_VERSION",
                reason: format!("{raw:?}: {e}"),
            })?,
            None => DEFAULT_META_VERSION,
        };
        let default_key_id = match lookup("SIGNING_KEY_ID") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::InvalidEnv {
                    var: "SIGNING_KEY_ID",
                    reason: "must not be empty".into(),
                })
            }
            Some(raw) => raw.trim().to_string(),
            None => DEFAULT_KEY_ID.to_string(),
        };
        Ok(Self {
            meta_version,
            default_key_id,
        })
    }
}

/// Produces signed licenses with the provider's key.
///
/// Holds no state besides its configuration and the shared provider;
/// signing has no side effects.
#[derive(Clone)]
pub struct Signer {
    provider: Arc<dyn KeyProvider>,
    config: SignerConfig,
}

impl Signer {
    pub fn new(provider: Arc<dyn KeyProvider>, config: SignerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn KeyProvider> {
        &self.provider
    }

    /// The id `sign` writes into `meta` for an optional override.
    pub fn effective_key_id<'a>(&'a self, key_id: Option<&'a str>) -> &'a str {
        key_id.unwrap_or(&self.config.default_key_id)
    }

    /// Sign a payload.
    ///
    /// `key_id` overrides the configured default label in `meta`. It does not
    /// select a different key: the provider's key is always used. No registry
    /// check happens here; see [`Signer::sign_registered`].
    pub fn sign(&self, payload: LicensePayload, key_id: Option<&str>) -> Result<SignedLicense, SignError> {
        let meta = LicenseMeta {
            version: self.config.meta_version,
            alg: KeyAlgorithm::Ed25519,
            key_id: self.effective_key_id(key_id).to_string(),
        };
        let canonical = CanonicalBytes::new(&payload)?;
        let key = self.provider.signing_key()?;
        let signature = key.sign(&canonical);
        tracing::debug!(
            license_id = %payload.license_id(),
            key_id = %meta.key_id,
            bytes = canonical.len(),
            "payload signed"
        );
        Ok(SignedLicense {
            meta,
            payload,
            signature,
        })
    }

    /// Sign after checking that the effective key id is registered in
    /// `catalog` and usable.
    pub fn sign_registered(
        &self,
        catalog: &dyn Catalog,
        payload: LicensePayload,
        key_id: Option<&str>,
    ) -> Result<SignedLicense, SignError> {
        check_key_id(catalog, self.effective_key_id(key_id))?;
        self.sign(payload, key_id)
    }
}

/// Require `key_id` to be registered in `catalog`, active and not retired.
pub fn check_key_id(catalog: &dyn Catalog, key_id: &str) -> Result<KeyMetadata, SignError> {
    let unusable = |reason: &'static str| SignError::UnusableKeyId {
        key_id: key_id.to_string(),
        reason,
    };
    match catalog.key_metadata(key_id)? {
        None => Err(unusable("is not registered in the catalog")),
        Some(meta) if meta.retired_at.is_some() => Err(unusable("is retired")),
        Some(meta) if !meta.is_active => Err(unusable("is inactive")),
        Some(meta) => Ok(meta),
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("provider", &self.provider.provider_name())
            .field("config", &self.config)
            .finish()
    }
}
