//! # License API
//!
//! Issuance, record queries, artifact download and revocation.
//!
//! Issuing needs the `issuer` role, revoking needs `admin`, everything else
//! needs `auditor`.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use lic_core::{CustomerId, EditionId, LicenseId, ProductId, Timestamp};
use lic_issuance::{Attributes, IssueRequest, LicenseRecord, LicenseStatus, LicenseType, SignedLicense};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::run_blocking;
use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, optional_json, Validate};
use crate::state::AppState;

/// Longest accepted free-text note.
pub const MAX_NOTE_LEN: usize = 2000;

/// Request to issue a license.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct IssueLicenseRequest {
    #[schema(value_type = String, example = "cust-1001")]
    pub customer_id: CustomerId,
    #[schema(value_type = String, example = "prod-data-pipeline")]
    pub product_id: ProductId,
    #[schema(value_type = String, example = "ed-enterprise")]
    pub edition_id: EditionId,
    /// One of `trial`, `subscription`, `perpetual`.
    #[schema(value_type = String, example = "subscription")]
    pub license_type: LicenseType,
    /// ISO-8601; offsets are normalized to UTC, naive values are taken as UTC.
    #[schema(value_type = String, example = "2025-01-01T00:00:00Z")]
    pub valid_from: Timestamp,
    #[schema(value_type = String, example = "2026-01-01T00:00:00Z")]
    pub valid_until: Timestamp,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub features: Option<Attributes>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub usage_limits: Option<Attributes>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub deployment: Option<Attributes>,
    /// Internal note stored on the record, never signed.
    #[serde(default)]
    pub note: Option<String>,
}

impl Validate for IssueLicenseRequest {
    fn validate(&self) -> Result<(), String> {
        if self.valid_from >= self.valid_until {
            return Err(format!(
                "valid_from ({}) must be earlier than valid_until ({}); \
                 timestamps are truncated to whole seconds before comparison",
                self.valid_from, self.valid_until
            ));
        }
        validate_note(self.note.as_deref())
    }
}

impl From<IssueLicenseRequest> for IssueRequest {
    fn from(req: IssueLicenseRequest) -> Self {
        IssueRequest {
            customer_id: req.customer_id,
            product_id: req.product_id,
            edition_id: req.edition_id,
            license_type: req.license_type,
            valid_from: req.valid_from,
            valid_until: req.valid_until,
            features: req.features,
            usage_limits: req.usage_limits,
            deployment: req.deployment,
            note: req.note,
        }
    }
}

pub(crate) fn validate_note(note: Option<&str>) -> Result<(), String> {
    match note {
        Some(n) if n.chars().count() > MAX_NOTE_LEN => {
            Err(format!("note must not exceed {MAX_NOTE_LEN} characters"))
        }
        _ => Ok(()),
    }
}

/// Response to a successful issuance.
#[derive(Debug, Serialize, ToSchema)]
pub struct IssueLicenseResponse {
    /// The signed license: `{meta, payload, signature}`.
    #[schema(value_type = Object)]
    pub license: SignedLicense,
    #[schema(value_type = String)]
    pub license_id: LicenseId,
}

/// Optional body of a revocation.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RevokeLicenseRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// Filters for listing records.
#[derive(Debug, Default, Deserialize)]
pub struct ListLicensesQuery {
    pub customer_id: Option<String>,
    pub status: Option<LicenseStatus>,
}

/// Build the licenses router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/licenses", get(list_licenses))
        .route("/v1/licenses/issue", post(issue_license))
        .route("/v1/licenses/:license_id", get(get_license))
        .route("/v1/licenses/:license_id/download", get(download_license))
        .route("/v1/licenses/:license_id/revoke", post(revoke_license))
}

/// POST /v1/licenses/issue: Issue and sign a license.
#[utoipa::path(
    post,
    path = "/v1/licenses/issue",
    request_body = IssueLicenseRequest,
    responses(
        (status = 201, description = "License issued", body = IssueLicenseResponse),
        (status = 404, description = "Customer, product or edition not found", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid window or edition/product mismatch", body = crate::error::ErrorBody),
    ),
    tag = "licenses"
)]
pub(crate) async fn issue_license(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<IssueLicenseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IssueLicenseResponse>), AppError> {
    require_role(&caller, Role::Issuer)?;
    let request: IssueRequest = extract_validated_json(body)?.into();

    let service = state.service.clone();
    let issuer = caller.issuer();
    let issued = run_blocking(move || Ok(service.issue(&request, &issuer)?)).await?;

    Ok((
        StatusCode::CREATED,
        Json(IssueLicenseResponse {
            license_id: issued.record.license_id,
            license: issued.license,
        }),
    ))
}

/// GET /v1/licenses: List license records, newest first.
#[utoipa::path(
    get,
    path = "/v1/licenses",
    params(
        ("customer_id" = Option<String>, Query, description = "Only this customer's licenses"),
        ("status" = Option<String>, Query, description = "active, revoked, superseded or expired"),
    ),
    responses(
        (status = 200, description = "License records"),
    ),
    tag = "licenses"
)]
pub(crate) async fn list_licenses(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<ListLicensesQuery>,
) -> Result<Json<Vec<LicenseRecord>>, AppError> {
    require_role(&caller, Role::Auditor)?;
    let store = state.service.store().clone();
    let records = run_blocking(move || Ok(store.list()?)).await?;

    let filtered = records
        .into_iter()
        .filter(|r| {
            query
                .customer_id
                .as_deref()
                .map_or(true, |c| r.customer_id.as_str() == c)
        })
        .filter(|r| query.status.map_or(true, |s| r.status == s))
        .collect();
    Ok(Json(filtered))
}

/// GET /v1/licenses/:license_id: Fetch one license record.
#[utoipa::path(
    get,
    path = "/v1/licenses/{license_id}",
    params(("license_id" = String, Path, description = "License UUID")),
    responses(
        (status = 200, description = "License record"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "licenses"
)]
pub(crate) async fn get_license(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(license_id): Path<LicenseId>,
) -> Result<Json<LicenseRecord>, AppError> {
    require_role(&caller, Role::Auditor)?;
    Ok(Json(load_record(&state, license_id).await?))
}

/// GET /v1/licenses/:license_id/download: The signed license artifact.
///
/// Rebuilt from the stored meta, payload and signature. Served regardless of
/// record status: status never alters the signed artifact.
#[utoipa::path(
    get,
    path = "/v1/licenses/{license_id}/download",
    params(("license_id" = String, Path, description = "License UUID")),
    responses(
        (status = 200, description = "Signed license file", content_type = "application/json"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "licenses"
)]
pub(crate) async fn download_license(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(license_id): Path<LicenseId>,
) -> Result<impl IntoResponse, AppError> {
    require_role(&caller, Role::Auditor)?;
    let record = load_record(&state, license_id).await?;
    let disposition = format!("attachment; filename=\"{license_id}.license\"");
    tracing::info!(license_id = %license_id, issuer_id = %caller.issuer_id, "license downloaded");
    Ok((
        [(header::CONTENT_DISPOSITION, disposition)],
        Json(record.to_signed_license()),
    ))
}

/// POST /v1/licenses/:license_id/revoke: Mark a license revoked.
#[utoipa::path(
    post,
    path = "/v1/licenses/{license_id}/revoke",
    params(("license_id" = String, Path, description = "License UUID")),
    request_body(content = RevokeLicenseRequest, description = "Optional note; the body may be empty"),
    responses(
        (status = 200, description = "Updated license record"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
        (status = 409, description = "License is not active", body = crate::error::ErrorBody),
    ),
    tag = "licenses"
)]
pub(crate) async fn revoke_license(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(license_id): Path<LicenseId>,
    body: Bytes,
) -> Result<Json<LicenseRecord>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req: RevokeLicenseRequest = optional_json(&body)?;
    validate_note(req.note.as_deref()).map_err(AppError::Validation)?;

    let store = state.service.store().clone();
    let record = run_blocking(move || {
        Ok(store.update_status(&license_id, LicenseStatus::Revoked, req.note.as_deref())?)
    })
    .await?;

    tracing::info!(license_id = %license_id, issuer_id = %caller.issuer_id, "license revoked");
    Ok(Json(record))
}

async fn load_record(state: &AppState, license_id: LicenseId) -> Result<LicenseRecord, AppError> {
    let store = state.service.store().clone();
    run_blocking(move || Ok(store.get(&license_id)?))
        .await?
        .ok_or_else(|| AppError::not_found(format!("license {license_id} not found")))
}
