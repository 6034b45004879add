//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{issuer_id}:{username}:{secret}
//! Bearer {secret}                                  (admin, issuer "system")
//! ```
//!
//! The secret is compared in constant time. The caller's issuer id and
//! username are what ends up in `payload.issuer` of every license they issue.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lic_issuance::IssuerIdentity;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use crate::error::AppError;

/// Issuer id and username of callers using a bare-secret token.
pub const SYSTEM_ISSUER: &str = "system";

/// Issuer id and username injected when auth is disabled.
pub const DEV_ISSUER: &str = "dev";

// ── Role ────────────────────────────────────────────────────────────────────

/// Roles ordered by privilege: `Auditor < Issuer < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access to license records and artifacts.
    Auditor,
    /// May issue licenses.
    Issuer,
    /// May also revoke.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auditor => "auditor",
            Self::Issuer => "issuer",
            Self::Admin => "admin",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "auditor" => Some(Self::Auditor),
            "issuer" => Some(Self::Issuer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    pub issuer_id: String,
    pub username: String,
}

impl CallerIdentity {
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    /// The identity recorded in issued payloads.
    pub fn issuer(&self) -> IssuerIdentity {
        IssuerIdentity::new(self.issuer_id.clone(), self.username.clone())
    }

    fn system() -> Self {
        Self {
            role: Role::Admin,
            issuer_id: SYSTEM_ISSUER.to_string(),
            username: SYSTEM_ISSUER.to_string(),
        }
    }
}

/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role (403 otherwise).
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        tracing::warn!(
            issuer_id = %caller.issuer_id,
            role = caller.role.as_str(),
            required = minimum.as_str(),
            "request forbidden"
        );
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// `token: None` disables authentication.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets. A length mismatch still
/// performs a comparison so timing does not reveal the expected length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token in `{role}:{issuer_id}:{username}:{secret}` or
/// `{secret}` form.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(4, ':').collect();

    match parts.as_slice() {
        [secret] => {
            if constant_time_token_eq(secret, expected_secret) {
                Ok(CallerIdentity::system())
            } else {
                Err("invalid bearer token".into())
            }
        }
        [role, issuer_id, username, secret] => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }
            let role = Role::parse(role).ok_or_else(|| format!("unknown role: {role}"))?;
            if issuer_id.trim().is_empty() {
                return Err("issuer_id must not be empty".into());
            }
            if username.trim().is_empty() {
                return Err("username must not be empty".into());
            }
            Ok(CallerIdentity {
                role,
                issuer_id: issuer_id.to_string(),
                username: username.to_string(),
            })
        }
        _ => Err(
            "invalid token format, expected {role}:{issuer_id}:{username}:{secret} or {secret}"
                .into(),
        ),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the Bearer token and inject the caller's [`CallerIdentity`].
///
/// When `AuthConfig.token` is `None`, every request runs as an admin with
/// the `dev` issuer identity.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.map(|h| h.strip_prefix("Bearer ")) {
                Some(Some(provided)) => match parse_bearer_token(provided, expected) {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        AppError::Unauthorized(msg).into_response()
                    }
                },
                Some(None) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    AppError::Unauthorized("authorization header must use Bearer scheme".into())
                        .into_response()
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    AppError::Unauthorized("missing authorization header".into()).into_response()
                }
            }
        }
        _ => {
            request.extensions_mut().insert(CallerIdentity {
                role: Role::Admin,
                issuer_id: DEV_ISSUER.to_string(),
                username: DEV_ISSUER.to_string(),
            });
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(token: Option<String>) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|caller: CallerIdentity| async move {
                    format!("{}:{}:{}", caller.role.as_str(), caller.issuer_id, caller.username)
                }),
            )
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(AuthConfig { token }))
    }

    async fn call(app: Router, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = auth {
            builder = builder.header("Authorization", value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn bare_secret_is_system_admin() {
        let (status, body) = call(test_app(Some("s3cret".into())), Some("Bearer s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin:system:system");
    }

    #[tokio::test]
    async fn scoped_token_carries_issuer_identity() {
        let (status, body) = call(
            test_app(Some("s3cret".into())),
            Some("Bearer issuer:u-42:alice:s3cret"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "issuer:u-42:alice");
    }

    #[tokio::test]
    async fn missing_header_rejected() {
        let (status, body) = call(test_app(Some("s3cret".into())), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("missing authorization header"));
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let (status, body) = call(
            test_app(Some("s3cret".into())),
            Some("Bearer admin:u-1:root:nope"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("invalid bearer token"));
    }

    #[tokio::test]
    async fn non_bearer_scheme_rejected() {
        let (status, body) = call(test_app(Some("s3cret".into())), Some("Basic czNjcmV0")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Bearer scheme"));
    }

    #[tokio::test]
    async fn auth_disabled_injects_dev_admin() {
        let (status, body) = call(test_app(None), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin:dev:dev");
    }

    #[test]
    fn unknown_role_rejected() {
        let err = parse_bearer_token("owner:u-1:bob:s3cret", "s3cret").unwrap_err();
        assert!(err.contains("unknown role"));
    }

    #[test]
    fn unknown_role_with_wrong_secret_reports_invalid_token() {
        let err = parse_bearer_token("owner:u-1:bob:wrong", "s3cret").unwrap_err();
        assert_eq!(err, "invalid bearer token");
    }

    #[test]
    fn blank_issuer_fields_rejected() {
        assert!(parse_bearer_token("issuer::bob:s3cret", "s3cret").is_err());
        assert!(parse_bearer_token("issuer:u-1: :s3cret", "s3cret").is_err());
    }

    #[test]
    fn two_or_three_part_tokens_rejected() {
        assert!(parse_bearer_token("issuer:s3cret", "s3cret").is_err());
        assert!(parse_bearer_token("issuer:u-1:s3cret", "s3cret").is_err());
    }

    #[test]
    fn role_ordering() {
        assert!(Role::Auditor < Role::Issuer);
        assert!(Role::Issuer < Role::Admin);
        let auditor = CallerIdentity {
            role: Role::Auditor,
            issuer_id: "a".into(),
            username: "a".into(),
        };
        assert!(require_role(&auditor, Role::Auditor).is_ok());
        assert!(matches!(
            require_role(&auditor, Role::Issuer),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn constant_time_eq() {
        assert!(constant_time_token_eq("abc", "abc"));
        assert!(!constant_time_token_eq("abc", "abd"));
        assert!(!constant_time_token_eq("ab", "abc"));
    }

    #[test]
    fn auth_config_debug_redacts() {
        let dbg = format!("{:?}", AuthConfig { token: Some("s3cret".into()) });
        assert!(!dbg.contains("s3cret"));
        assert!(dbg.contains("REDACTED"));
    }
}
