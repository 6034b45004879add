//! # License Templates
//!
//! A template presets product, edition, license type, duration and default
//! feature/usage maps so that operators issue consistent licenses. A
//! template never signs anything itself: [`LicenseTemplate::to_request`]
//! expands it into an ordinary [`IssueRequest`], which then goes through the
//! full orchestrator path including the relationship and window checks.

use lic_core::{CustomerId, EditionId, ProductId, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

use crate::orchestrator::IssueRequest;
use crate::payload::{Attributes, LicenseType};

/// A catalog preset for issuing licenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseTemplate {
    pub id: String,
    pub name: String,
    pub product_id: ProductId,
    pub edition_id: EditionId,
    pub license_type: LicenseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_features: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_usage_limits: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Per-issuance inputs when issuing from a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateIssueRequest {
    pub customer_id: CustomerId,
    pub valid_from: Timestamp,
    /// Overrides `valid_from + duration_days` when present.
    #[serde(default)]
    pub valid_until: Option<Timestamp>,
    #[serde(default)]
    pub features: Option<Attributes>,
    #[serde(default)]
    pub usage_limits: Option<Attributes>,
    #[serde(default)]
    pub deployment: Option<Attributes>,
    #[serde(default)]
    pub note: Option<String>,
}

impl LicenseTemplate {
    /// Expand this template into an issue request.
    ///
    /// Request maps are merged over the template defaults key by key; request
    /// keys win.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidValue` when neither `valid_until` nor
    /// `duration_days` is available, or `InvalidTimestamp` if the computed
    /// end overflows.
    pub fn to_request(&self, req: &TemplateIssueRequest) -> Result<IssueRequest, ValidationError> {
        let valid_until = match (req.valid_until, self.duration_days) {
            (Some(until), _) => until,
            (None, Some(days)) => req.valid_from.checked_add_days(days)?,
            (None, None) => {
                return Err(ValidationError::InvalidValue {
                    field: "valid_until",
                    value: format!(
                        "required because template {} has no duration_days",
                        self.id
                    ),
                })
            }
        };

        Ok(IssueRequest {
            customer_id: req.customer_id.clone(),
            product_id: self.product_id.clone(),
            edition_id: self.edition_id.clone(),
            license_type: self.license_type,
            valid_from: req.valid_from,
            valid_until,
            features: merge(self.default_features.as_ref(), req.features.as_ref()),
            usage_limits: merge(self.default_usage_limits.as_ref(), req.usage_limits.as_ref()),
            deployment: req.deployment.clone(),
            note: req.note.clone(),
        })
    }
}

fn merge(defaults: Option<&Attributes>, overrides: Option<&Attributes>) -> Option<Attributes> {
    match (defaults, overrides) {
        (None, None) => None,
        (Some(d), None) => Some(d.clone()),
        (None, Some(o)) => Some(o.clone()),
        (Some(d), Some(o)) => {
            let mut merged = d.clone();
            for (k, v) in o {
                merged.insert(k.clone(), v.clone());
            }
            Some(merged)
        }
    }
}
