//! # License Records and Stores
//!
//! Every issued license leaves a [`LicenseRecord`]: an immutable snapshot of
//! what was signed plus an admin-visible status. Offline clients never see
//! the status; it does not alter the signed payload.
//!
//! ## Status Lifecycle
//!
//! ```text
//! active ──▶ revoked     (terminal)
//!    │
//!    ├────▶ superseded  (terminal)
//!    │
//!    └────▶ expired     (terminal)
//! ```
//!
//! ## Stores
//!
//! - [`InMemoryLicenseStore`]: a `RwLock`-guarded map. One write lock per
//!   insert, so an insert is all-or-nothing.
//! - [`FileLicenseStore`]: one `<license_id>.json` file per record, written
//!   to a temporary file and renamed into place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lic_core::{sha256_hex, CanonicalBytes, CanonicalizationError, CustomerId, EditionId, LicenseId, ProductId, Timestamp};
use lic_crypto::{Ed25519Signature, KeyAlgorithm};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::payload::{LicensePayload, LicenseType};
use crate::signer::{LicenseMeta, SignedLicense};

/// Admin-visible logical status of an issued license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Revoked,
    Superseded,
    /// Record-keeping only; the payload's validity window is authoritative.
    Expired,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Superseded => "superseded",
            Self::Expired => "expired",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Only `active` may move, and only to another status.
    pub fn can_transition_to(&self, to: LicenseStatus) -> bool {
        *self == Self::Active && to != Self::Active
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistence record for one issued license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub license_id: LicenseId,
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub edition_id: EditionId,
    pub license_type: LicenseType,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
    pub meta_version: u32,
    pub meta_alg: KeyAlgorithm,
    pub meta_key_id: String,
    /// The exact payload that was signed.
    pub payload: LicensePayload,
    pub signature: Ed25519Signature,
    /// SHA-256 hex of the canonical payload bytes.
    pub payload_digest: String,
    pub issued_at: Timestamp,
    pub issuer_id: String,
    pub issuer_username: String,
    pub status: LicenseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LicenseRecord {
    /// Build the record for a freshly signed license.
    pub fn from_signed(
        signed: &SignedLicense,
        note: Option<String>,
        now: Timestamp,
    ) -> Result<Self, CanonicalizationError> {
        let payload = &signed.payload;
        let digest = sha256_hex(&CanonicalBytes::new(payload)?);
        Ok(Self {
            license_id: payload.license_id(),
            customer_id: payload.customer().id.clone(),
            product_id: payload.product().id.clone(),
            edition_id: payload.edition().id.clone(),
            license_type: payload.license_type(),
            valid_from: payload.validity().valid_from(),
            valid_until: payload.validity().valid_until(),
            meta_version: signed.meta.version,
            meta_alg: signed.meta.alg,
            meta_key_id: signed.meta.key_id.clone(),
            payload: payload.clone(),
            signature: signed.signature.clone(),
            payload_digest: digest,
            issued_at: payload.issuer().issued_at,
            issuer_id: payload.issuer().issuer_id.clone(),
            issuer_username: payload.issuer().issuer_username.clone(),
            status: LicenseStatus::Active,
            notes: note.filter(|n| !n.trim().is_empty()),
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuild the downloadable artifact from the stored fields.
    pub fn to_signed_license(&self) -> SignedLicense {
        SignedLicense {
            meta: LicenseMeta {
                version: self.meta_version,
                alg: self.meta_alg,
                key_id: self.meta_key_id.clone(),
            },
            payload: self.payload.clone(),
            signature: self.signature.clone(),
        }
    }

    /// Move to `to`, appending `note` to the record's notes.
    pub fn transition(
        &mut self,
        to: LicenseStatus,
        note: Option<&str>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        if !self.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
            self.notes = Some(match self.notes.take() {
                Some(existing) => format!("{existing}\n{note}"),
                None => note.to_string(),
            });
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Record persistence consumed by the orchestrator and the API.
pub trait LicenseStore: Send + Sync {
    /// Store a new record. Fails with `Conflict` if the id exists.
    fn insert(&self, record: LicenseRecord) -> Result<(), StoreError>;

    fn get(&self, id: &LicenseId) -> Result<Option<LicenseRecord>, StoreError>;

    /// All records, newest first.
    fn list(&self) -> Result<Vec<LicenseRecord>, StoreError>;

    /// Change a record's status and return the updated record.
    fn update_status(
        &self,
        id: &LicenseId,
        status: LicenseStatus,
        note: Option<&str>,
    ) -> Result<LicenseRecord, StoreError>;
}

// ─── InMemoryLicenseStore ───────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryInner {
    records: HashMap<LicenseId, LicenseRecord>,
    order: Vec<LicenseId>,
}

/// Process-local store for tests and single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemoryLicenseStore {
    inner: RwLock<MemoryInner>,
}

impl InMemoryLicenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LicenseStore for InMemoryLicenseStore {
    fn insert(&self, record: LicenseRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.records.contains_key(&record.license_id) {
            return Err(StoreError::Conflict(record.license_id));
        }
        inner.order.push(record.license_id);
        inner.records.insert(record.license_id, record);
        Ok(())
    }

    fn get(&self, id: &LicenseId) -> Result<Option<LicenseRecord>, StoreError> {
        Ok(self.inner.read().records.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<LicenseRecord>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect())
    }

    fn update_status(
        &self,
        id: &LicenseId,
        status: LicenseStatus,
        note: Option<&str>,
    ) -> Result<LicenseRecord, StoreError> {
        let mut inner = self.inner.write();
        let record = inner.records.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        record.transition(status, note, Timestamp::now())?;
        Ok(record.clone())
    }
}

// ─── FileLicenseStore ───────────────────────────────────────────────────

/// One JSON file per record under a directory.
///
/// Writes go through a process-wide mutex so that the existence check and
/// the rename of an insert cannot interleave with another insert.
#[derive(Debug)]
pub struct FileLicenseStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLicenseStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &LicenseId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn read_record(path: &Path) -> Result<LicenseRecord, StoreError> {
        let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
    }

    fn write_record(&self, record: &LicenseRecord) -> Result<(), StoreError> {
        let path = self.record_path(&record.license_id);
        let temp_path = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(&temp_path, &data).map_err(|source| StoreError::Io {
            path: temp_path.clone(),
            source,
        })?;
        std::fs::rename(&temp_path, &path).map_err(|source| {
            let _ = std::fs::remove_file(&temp_path);
            StoreError::Io { path, source }
        })
    }
}

impl LicenseStore for FileLicenseStore {
    fn insert(&self, record: LicenseRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        if self.record_path(&record.license_id).exists() {
            return Err(StoreError::Conflict(record.license_id));
        }
        self.write_record(&record)?;
        tracing::debug!(license_id = %record.license_id, dir = %self.dir.display(), "license record written");
        Ok(())
    }

    fn get(&self, id: &LicenseId) -> Result<Option<LicenseRecord>, StoreError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_record(&path).map(Some)
    }

    fn list(&self) -> Result<Vec<LicenseRecord>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            records.push(Self::read_record(&path)?);
        }
        // Second-precision timestamps tie often; break ties by id for a
        // stable order.
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.license_id.cmp(&b.license_id))
        });
        Ok(records)
    }

    fn update_status(
        &self,
        id: &LicenseId,
        status: LicenseStatus,
        note: Option<&str>,
    ) -> Result<LicenseRecord, StoreError> {
        let _guard = self.write_lock.lock();
        let path = self.record_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound(*id));
        }
        let mut record = Self::read_record(&path)?;
        record.transition(status, note, Timestamp::now())?;
        self.write_record(&record)?;
        Ok(record)
    }
}
