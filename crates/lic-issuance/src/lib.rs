//! # lic-issuance: The License Issuance Pipeline
//!
//! ```text
//! IssueRequest ─▶ IssuanceService ─▶ Catalog (resolve customer/product/edition)
//!                        │
//!                        ├─▶ PayloadBuilder ─▶ LicensePayload
//!                        ├─▶ Signer ─▶ CanonicalBytes ─▶ KeyProvider ─▶ SignedLicense
//!                        └─▶ LicenseStore (record write; failure discards the license)
//! ```
//!
//! - [`catalog`]: customers, products, editions, and the YAML-backed catalog.
//! - [`template`]: license templates that expand into issue requests.
//! - [`payload`]: the signed payload value object and its builder.
//! - [`signer`]: `{meta, payload, signature}` assembly.
//! - [`store`]: license records, status lifecycle, in-memory and file stores.
//! - [`orchestrator`]: the issuance service tying it all together.
//!
//! The signature covers the canonical bytes of the payload only. `meta` is
//! never signed.

pub mod catalog;
pub mod error;
pub mod orchestrator;
pub mod payload;
pub mod signer;
pub mod store;
pub mod template;

pub use catalog::{
    Catalog, CatalogDocument, Customer, Edition, InMemoryCatalog, KeyMetadata, Product,
};
pub use error::{CatalogError, ConfigError, EntityKind, IssuanceError, SignError, StoreError};
pub use orchestrator::{IssuanceService, IssueRequest, IssuedLicense};
pub use payload::{
    Attributes, CustomerRef, EditionRef, IssuerIdentity, IssuerInfo, LicensePayload, LicenseType,
    PayloadBuilder, ProductRef, Validity,
};
pub use signer::{check_key_id, LicenseMeta, SignedLicense, Signer, SignerConfig};
pub use store::{FileLicenseStore, InMemoryLicenseStore, LicenseRecord, LicenseStatus, LicenseStore};
pub use template::{LicenseTemplate, TemplateIssueRequest};
