//! # OpenAPI Document Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "License Issuance API",
        version = "0.1.0",
        description = "Issue, download, list and revoke Ed25519-signed software licenses.",
        license(name = "Apache-2.0")
    ),
    paths(
        crate::routes::licenses::issue_license,
        crate::routes::licenses::list_licenses,
        crate::routes::licenses::get_license,
        crate::routes::licenses::download_license,
        crate::routes::licenses::revoke_license,
        crate::routes::templates::issue_from_template,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::auth::Role,
        crate::routes::licenses::IssueLicenseRequest,
        crate::routes::licenses::IssueLicenseResponse,
        crate::routes::licenses::RevokeLicenseRequest,
        crate::routes::templates::TemplateIssueBody,
    )),
    tags(
        (name = "licenses", description = "License issuance and records"),
        (name = "templates", description = "Template-based issuance"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
