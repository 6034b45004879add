//! # License Payload
//!
//! The structured license content that gets signed. A `LicensePayload` is
//! built fresh for every issuance and never changes afterwards: fields are
//! private, and deserialization re-checks every invariant so a payload read
//! back from disk is as trustworthy as one built in-process.
//!
//! ## Invariants
//!
//! - `validity.valid_from < validity.valid_until` (strict).
//! - Required strings (names, codes, issuer id and username) are non-empty.
//! - `features`, `usage_limits` and `deployment` are always objects, possibly
//!   empty, never `null`.
//! - Timestamps are UTC, second precision, rendered with a `Z` suffix.

use std::fmt;
use std::str::FromStr;

use lic_core::{CustomerId, EditionId, LicenseId, ProductId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

use crate::catalog::{Customer, Edition, Product};

/// String-keyed JSON mapping used for features, usage limits and
/// deployment metadata.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Commercial license model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Trial,
    Subscription,
    Perpetual,
}

impl LicenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Subscription => "subscription",
            Self::Perpetual => "perpetual",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "subscription" => Ok(Self::Subscription),
            "perpetual" => Ok(Self::Perpetual),
            other => Err(ValidationError::InvalidValue {
                field: "license_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Customer as embedded in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerRef {
    pub id: CustomerId,
    pub name: String,
}

/// Product as embedded in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductRef {
    pub id: ProductId,
    pub code: String,
    pub name: String,
}

/// Edition as embedded in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditionRef {
    pub id: EditionId,
    pub code: String,
    pub name: String,
}

/// A non-empty validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawValidity")]
pub struct Validity {
    valid_from: Timestamp,
    valid_until: Timestamp,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawValidity {
    valid_from: Timestamp,
    valid_until: Timestamp,
}

impl TryFrom<RawValidity> for Validity {
    type Error = ValidationError;

    fn try_from(raw: RawValidity) -> Result<Self, Self::Error> {
        Self::new(raw.valid_from, raw.valid_until)
    }
}

impl Validity {
    /// Build a window, rejecting `valid_from >= valid_until`.
    ///
    /// The comparison runs on the second-truncated UTC values, which are
    /// exactly what ends up in the payload.
    pub fn new(valid_from: Timestamp, valid_until: Timestamp) -> Result<Self, ValidationError> {
        if valid_from >= valid_until {
            return Err(ValidationError::InvalidWindow {
                valid_from: valid_from.to_iso8601(),
                valid_until: valid_until.to_iso8601(),
            });
        }
        Ok(Self {
            valid_from,
            valid_until,
        })
    }

    pub fn valid_from(&self) -> Timestamp {
        self.valid_from
    }

    pub fn valid_until(&self) -> Timestamp {
        self.valid_until
    }
}

/// Issuer block of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssuerInfo {
    pub issued_at: Timestamp,
    pub issuer_id: String,
    pub issuer_username: String,
}

/// The authenticated operator performing an issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerIdentity {
    pub id: String,
    pub username: String,
}

impl IssuerIdentity {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}

/// The signed license content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPayload")]
pub struct LicensePayload {
    license_id: LicenseId,
    customer: CustomerRef,
    product: ProductRef,
    edition: EditionRef,
    license_type: LicenseType,
    validity: Validity,
    features: Attributes,
    usage_limits: Attributes,
    deployment: Attributes,
    issuer: IssuerInfo,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPayload {
    license_id: LicenseId,
    customer: CustomerRef,
    product: ProductRef,
    edition: EditionRef,
    license_type: LicenseType,
    validity: Validity,
    #[serde(default)]
    features: Option<Attributes>,
    #[serde(default)]
    usage_limits: Option<Attributes>,
    #[serde(default)]
    deployment: Option<Attributes>,
    issuer: IssuerInfo,
}

impl TryFrom<RawPayload> for LicensePayload {
    type Error = ValidationError;

    fn try_from(raw: RawPayload) -> Result<Self, Self::Error> {
        let payload = Self {
            license_id: raw.license_id,
            customer: raw.customer,
            product: raw.product,
            edition: raw.edition,
            license_type: raw.license_type,
            validity: raw.validity,
            features: raw.features.unwrap_or_default(),
            usage_limits: raw.usage_limits.unwrap_or_default(),
            deployment: raw.deployment.unwrap_or_default(),
            issuer: raw.issuer,
        };
        payload.check_required_strings()?;
        Ok(payload)
    }
}

impl LicensePayload {
    pub fn license_id(&self) -> LicenseId {
        self.license_id
    }

    pub fn customer(&self) -> &CustomerRef {
        &self.customer
    }

    pub fn product(&self) -> &ProductRef {
        &self.product
    }

    pub fn edition(&self) -> &EditionRef {
        &self.edition
    }

    pub fn license_type(&self) -> LicenseType {
        self.license_type
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn features(&self) -> &Attributes {
        &self.features
    }

    pub fn usage_limits(&self) -> &Attributes {
        &self.usage_limits
    }

    pub fn deployment(&self) -> &Attributes {
        &self.deployment
    }

    pub fn issuer(&self) -> &IssuerInfo {
        &self.issuer
    }

    fn check_required_strings(&self) -> Result<(), ValidationError> {
        let required = [
            ("customer.name", &self.customer.name),
            ("product.code", &self.product.code),
            ("product.name", &self.product.name),
            ("edition.code", &self.edition.code),
            ("edition.name", &self.edition.name),
            ("issuer.issuer_id", &self.issuer.issuer_id),
            ("issuer.issuer_username", &self.issuer.issuer_username),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyField(field));
            }
        }
        Ok(())
    }
}

/// Assembles a [`LicensePayload`] from already-resolved catalog records.
///
/// Pure: performs no lookups and reads no clock. The issuance instant is
/// passed in by the caller.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    license_id: LicenseId,
    customer: CustomerRef,
    product: ProductRef,
    edition: EditionRef,
    license_type: LicenseType,
    validity: Validity,
    features: Attributes,
    usage_limits: Attributes,
    deployment: Attributes,
}

impl PayloadBuilder {
    pub fn new(
        license_id: LicenseId,
        customer: &Customer,
        product: &Product,
        edition: &Edition,
        license_type: LicenseType,
        validity: Validity,
    ) -> Self {
        Self {
            license_id,
            customer: CustomerRef {
                id: customer.id.clone(),
                name: customer.name.clone(),
            },
            product: ProductRef {
                id: product.id.clone(),
                code: product.code.clone(),
                name: product.name.clone(),
            },
            edition: EditionRef {
                id: edition.id.clone(),
                code: edition.code.clone(),
                name: edition.name.clone(),
            },
            license_type,
            validity,
            features: Attributes::new(),
            usage_limits: Attributes::new(),
            deployment: Attributes::new(),
        }
    }

    /// Feature flags; `None` leaves the empty default.
    pub fn features(mut self, features: Option<Attributes>) -> Self {
        self.features = features.unwrap_or_default();
        self
    }

    pub fn usage_limits(mut self, usage_limits: Option<Attributes>) -> Self {
        self.usage_limits = usage_limits.unwrap_or_default();
        self
    }

    pub fn deployment(mut self, deployment: Option<Attributes>) -> Self {
        self.deployment = deployment.unwrap_or_default();
        self
    }

    /// Finish the payload with the issuer block.
    ///
    /// # Errors
    ///
    /// `ValidationError::EmptyField` if any required string is blank.
    pub fn build(
        self,
        issuer: &IssuerIdentity,
        issued_at: Timestamp,
    ) -> Result<LicensePayload, ValidationError> {
        let payload = LicensePayload {
            license_id: self.license_id,
            customer: self.customer,
            product: self.product,
            edition: self.edition,
            license_type: self.license_type,
            validity: self.validity,
            features: self.features,
            usage_limits: self.usage_limits,
            deployment: self.deployment,
            issuer: IssuerInfo {
                issued_at,
                issuer_id: issuer.id.clone(),
                issuer_username: issuer.username.clone(),
            },
        };
        payload.check_required_strings()?;
        Ok(payload)
    }
}
