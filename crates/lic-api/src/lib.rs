//! # lic-api: HTTP Service for License Issuance
//!
//! A thin Axum layer over [`lic_issuance::IssuanceService`].
//!
//! ## API Surface
//!
//! | Route                                    | Role      |
//! |------------------------------------------|-----------|
//! | `POST /v1/licenses/issue`                | issuer    |
//! | `POST /v1/templates/{template_id}/issue` | issuer    |
//! | `GET  /v1/licenses`                      | auditor   |
//! | `GET  /v1/licenses/{license_id}`         | auditor   |
//! | `GET  /v1/licenses/{license_id}/download`| auditor   |
//! | `POST /v1/licenses/{license_id}/revoke`  | admin     |
//! | `GET  /openapi.json`                     | auditor   |
//! | `GET  /health/liveness`, `/health/readiness` | none  |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the application router.
///
/// Health probes are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Always 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// 200 once the signing key loads; 503 otherwise.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let provider = state.service.signer().provider().clone();
    match tokio::task::spawn_blocking(move || provider.signing_key().map(|_| ())).await {
        Ok(Ok(())) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "readiness check failed: signing key unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "signing key unavailable").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "readiness check task failed");
            (StatusCode::SERVICE_UNAVAILABLE, "readiness check failed").into_response()
        }
    }
}
