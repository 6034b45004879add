//! # Template API
//!
//! Issue a license from a catalog template. The template supplies product,
//! edition, license type, duration and default feature maps; the request
//! supplies the customer, start date and overrides.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use lic_core::{CustomerId, Timestamp};
use lic_issuance::{Attributes, TemplateIssueRequest};
use serde::Deserialize;
use utoipa::ToSchema;

use super::licenses::{validate_note, IssueLicenseResponse};
use super::run_blocking;
use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Request to issue from a template.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct TemplateIssueBody {
    #[schema(value_type = String, example = "cust-1001")]
    pub customer_id: CustomerId,
    #[schema(value_type = String, example = "2025-01-01T00:00:00Z")]
    pub valid_from: Timestamp,
    /// Defaults to `valid_from` plus the template's duration.
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub valid_until: Option<Timestamp>,
    /// Merged over the template's default features; request keys win.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub features: Option<Attributes>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub usage_limits: Option<Attributes>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub deployment: Option<Attributes>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Validate for TemplateIssueBody {
    fn validate(&self) -> Result<(), String> {
        validate_note(self.note.as_deref())
    }
}

impl From<TemplateIssueBody> for TemplateIssueRequest {
    fn from(body: TemplateIssueBody) -> Self {
        TemplateIssueRequest {
            customer_id: body.customer_id,
            valid_from: body.valid_from,
            valid_until: body.valid_until,
            features: body.features,
            usage_limits: body.usage_limits,
            deployment: body.deployment,
            note: body.note,
        }
    }
}

/// Build the templates router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/templates/:template_id/issue", post(issue_from_template))
}

/// POST /v1/templates/:template_id/issue: Issue a license from a template.
#[utoipa::path(
    post,
    path = "/v1/templates/{template_id}/issue",
    params(("template_id" = String, Path, description = "Template ID")),
    request_body = TemplateIssueBody,
    responses(
        (status = 201, description = "License issued", body = IssueLicenseResponse),
        (status = 404, description = "Template or customer not found", body = crate::error::ErrorBody),
        (status = 422, description = "No end date could be determined, or invalid window", body = crate::error::ErrorBody),
    ),
    tag = "templates"
)]
pub(crate) async fn issue_from_template(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(template_id): Path<String>,
    body: Result<Json<TemplateIssueBody>, JsonRejection>,
) -> Result<(StatusCode, Json<IssueLicenseResponse>), AppError> {
    require_role(&caller, Role::Issuer)?;
    let request: TemplateIssueRequest = extract_validated_json(body)?.into();

    let service = state.service.clone();
    let issuer = caller.issuer();
    let issued = run_blocking(move || {
        Ok(service.issue_from_template(&template_id, &request, &issuer)?)
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueLicenseResponse {
            license_id: issued.record.license_id,
            license: issued.license,
        }),
    ))
}
