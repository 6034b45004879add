//! # Issuance Orchestrator
//!
//! [`IssuanceService::issue`] is the single entry point that turns a request
//! into a signed license:
//!
//! 1. Resolve customer, product and edition (`NotFound` if missing).
//! 2. Require `edition.product_id == product.id` (`Relationship`).
//! 3. Require `valid_from < valid_until` (`Validation`), re-checked here
//!    even when the request boundary already did.
//! 4. Generate a UUID-v4 license id.
//! 5. Build the payload, sign it under the configured key id (which must be
//!    registered and active in the catalog), build the record, store it.
//!
//! A signed license is never returned without its stored record. If the
//! store write fails, the signed object is dropped and the call fails.

use std::sync::Arc;

use lic_core::{CustomerId, EditionId, LicenseId, ProductId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{EntityKind, IssuanceError};
use crate::payload::{Attributes, IssuerIdentity, LicenseType, PayloadBuilder, Validity};
use crate::signer::{SignedLicense, Signer};
use crate::store::{LicenseRecord, LicenseStore};
use crate::template::TemplateIssueRequest;

/// Inputs for one issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueRequest {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub edition_id: EditionId,
    pub license_type: LicenseType,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
    #[serde(default)]
    pub features: Option<Attributes>,
    #[serde(default)]
    pub usage_limits: Option<Attributes>,
    #[serde(default)]
    pub deployment: Option<Attributes>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Result of a successful issuance.
#[derive(Debug, Clone)]
pub struct IssuedLicense {
    pub license: SignedLicense,
    pub record: LicenseRecord,
}

/// Drives catalog lookups, payload construction, signing and persistence.
#[derive(Clone)]
pub struct IssuanceService {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn LicenseStore>,
    signer: Signer,
}

impl IssuanceService {
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn LicenseStore>, signer: Signer) -> Self {
        Self {
            catalog,
            store,
            signer,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn LicenseStore> {
        &self.store
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Issue a license.
    pub fn issue(
        &self,
        request: &IssueRequest,
        issuer: &IssuerIdentity,
    ) -> Result<IssuedLicense, IssuanceError> {
        let result = self.issue_inner(request, issuer);
        match &result {
            Ok(issued) => tracing::info!(
                license_id = %issued.record.license_id,
                customer_id = %request.customer_id,
                product_id = %request.product_id,
                edition_id = %request.edition_id,
                key_id = %issued.license.meta.key_id,
                issuer_id = %issuer.id,
                "license issued"
            ),
            Err(e) if e.is_client_error() => tracing::warn!(
                customer_id = %request.customer_id,
                product_id = %request.product_id,
                edition_id = %request.edition_id,
                error = %e,
                "license issuance rejected"
            ),
            Err(e) => tracing::error!(
                customer_id = %request.customer_id,
                product_id = %request.product_id,
                edition_id = %request.edition_id,
                error = %e,
                "license issuance failed"
            ),
        }
        result
    }

    fn issue_inner(
        &self,
        request: &IssueRequest,
        issuer: &IssuerIdentity,
    ) -> Result<IssuedLicense, IssuanceError> {
        let customer = self
            .catalog
            .customer(&request.customer_id)?
            .ok_or_else(|| not_found(EntityKind::Customer, request.customer_id.as_str()))?;
        let product = self
            .catalog
            .product(&request.product_id)?
            .ok_or_else(|| not_found(EntityKind::Product, request.product_id.as_str()))?;
        let edition = self
            .catalog
            .edition(&request.edition_id)?
            .ok_or_else(|| not_found(EntityKind::Edition, request.edition_id.as_str()))?;

        if edition.product_id != product.id {
            return Err(IssuanceError::Relationship {
                edition_id: edition.id.to_string(),
                product_id: product.id.to_string(),
            });
        }

        let validity = Validity::new(request.valid_from, request.valid_until)?;

        let license_id = LicenseId::new();
        let issued_at = Timestamp::now();
        let payload = PayloadBuilder::new(
            license_id,
            &customer,
            &product,
            &edition,
            request.license_type,
            validity,
        )
        .features(request.features.clone())
        .usage_limits(request.usage_limits.clone())
        .deployment(request.deployment.clone())
        .build(issuer, issued_at)?;

        let license = self.signer.sign_registered(self.catalog.as_ref(), payload, None)?;
        let record = LicenseRecord::from_signed(&license, request.note.clone(), Timestamp::now())?;
        self.store.insert(record.clone())?;

        Ok(IssuedLicense { license, record })
    }

    /// Expand a catalog template and issue from it.
    pub fn issue_from_template(
        &self,
        template_id: &str,
        request: &TemplateIssueRequest,
        issuer: &IssuerIdentity,
    ) -> Result<IssuedLicense, IssuanceError> {
        let template = self
            .catalog
            .template(template_id)?
            .ok_or_else(|| not_found(EntityKind::Template, template_id))?;
        let issue_request = template.to_request(request)?;
        tracing::debug!(template_id, customer_id = %request.customer_id, "issuing from template");
        self.issue(&issue_request, issuer)
    }
}

impl std::fmt::Debug for IssuanceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceService")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

fn not_found(entity: EntityKind, id: &str) -> IssuanceError {
    IssuanceError::NotFound {
        entity,
        id: id.to_string(),
    }
}
