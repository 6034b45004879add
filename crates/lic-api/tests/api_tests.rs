//! # Integration Tests for lic-api
//!
//! Drives the full router with `oneshot`: issuance, download, listing,
//! revocation, template issuance, role checks, health probes and the
//! OpenAPI document.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use lic_api::state::{AppConfig, AppState};
use lic_crypto::{KeyProvider, LocalKeyProvider, PemFileKeyProvider, VerifyingKey};
use lic_issuance::{
    InMemoryCatalog, InMemoryLicenseStore, IssuanceService, LicenseStore, SignedLicense, Signer,
    SignerConfig,
};

const CATALOG: &str = r#"
customers:
  - id: cust-1001
    name: Acme Analytics GmbH
products:
  - id: prod-data-pipeline
    code: data-pipeline-app
    name: Data Pipeline
  - id: prod-viz
    code: viz
    name: Visualizer
editions:
  - id: ed-enterprise
    product_id: prod-data-pipeline
    code: enterprise
    name: Enterprise
  - id: ed-viz-pro
    product_id: prod-viz
    code: pro
    name: Pro
templates:
  - id: tmpl-trial
    name: Pipeline Trial
    product_id: prod-data-pipeline
    edition_id: ed-enterprise
    license_type: trial
    duration_days: 14
    default_features:
      export: false
keys:
  - key_id: main-v1
    alg: Ed25519
"#;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    store: Arc<InMemoryLicenseStore>,
    verifying_key: VerifyingKey,
}

fn config(auth_token: Option<&str>) -> AppConfig {
    AppConfig {
        port: 0,
        auth_token: auth_token.map(str::to_string),
        private_key_path: PathBuf::from("unused.pem"),
        catalog_path: None,
        license_store_dir: None,
        json_logs: false,
        signer: SignerConfig::default(),
    }
}

fn build(provider: Arc<dyn KeyProvider>, auth_token: Option<&str>) -> TestApp {
    let catalog = Arc::new(InMemoryCatalog::from_yaml_str(CATALOG).unwrap());
    let store = Arc::new(InMemoryLicenseStore::new());
    let verifying_key = LocalKeyProvider::from_seed(&[5u8; 32])
        .signing_key()
        .unwrap()
        .verifying_key();
    let signer = Signer::new(provider, SignerConfig::default());
    let service = IssuanceService::new(catalog, store.clone(), signer);
    TestApp {
        router: lic_api::app(AppState::new(service, config(auth_token))),
        store,
        verifying_key,
    }
}

fn test_app() -> TestApp {
    build(Arc::new(LocalKeyProvider::from_seed(&[5u8; 32])), None)
}

fn test_app_with_auth() -> TestApp {
    build(Arc::new(LocalKeyProvider::from_seed(&[5u8; 32])), Some(SECRET))
}

fn issue_body() -> Value {
    json!({
        "customer_id": "cust-1001",
        "product_id": "prod-data-pipeline",
        "edition_id": "ed-enterprise",
        "license_type": "subscription",
        "valid_from": "2025-01-01T00:00:00Z",
        "valid_until": "2026-01-01T00:00:00Z",
        "features": {"advanced_export": true},
        "note": "initial contract"
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

fn post_json(uri: &str, body: &Value, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn issue(app: &TestApp) -> (String, Value) {
    let (status, body) = send(&app.router, post_json("/v1/licenses/issue", &issue_body(), None)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (body["license_id"].as_str().unwrap().to_string(), body)
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn liveness_probe() {
    let app = test_app_with_auth();
    let (status, body) = send(&app.router, get("/health/liveness", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn readiness_probe_with_key() {
    let app = test_app_with_auth();
    let (status, body) = send(&app.router, get("/health/readiness", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

#[tokio::test]
async fn readiness_probe_without_key() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(PemFileKeyProvider::new(dir.path().join("absent.pem")));
    let app = build(provider, None);
    let (status, _) = send(&app.router, get("/health/readiness", None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// -- Issuance -----------------------------------------------------------------

#[tokio::test]
async fn issue_returns_signed_license() {
    let app = test_app();
    let (license_id, body) = issue(&app).await;

    let license = &body["license"];
    assert_eq!(license["meta"]["alg"], "Ed25519");
    assert_eq!(license["meta"]["key_id"], "main-v1");
    assert_eq!(license["meta"]["version"], 1);
    assert_eq!(license["payload"]["license_id"], license_id.as_str());
    assert_eq!(license["payload"]["license_type"], "subscription");
    assert_eq!(license["payload"]["validity"]["valid_from"], "2025-01-01T00:00:00Z");
    assert_eq!(license["payload"]["features"], json!({"advanced_export": true}));
    assert_eq!(license["payload"]["usage_limits"], json!({}));
    assert_eq!(license["payload"]["issuer"]["issuer_id"], "dev");
    assert!(license["payload"].get("note").is_none());

    let signed: SignedLicense = serde_json::from_value(license.clone()).unwrap();
    assert!(signed.verify(&app.verifying_key).is_ok());
    assert_eq!(app.store.len(), 1);
}

#[tokio::test]
async fn issue_records_authenticated_issuer() {
    let app = test_app_with_auth();
    let token = format!("issuer:u-77:carol:{SECRET}");
    let (status, body) = send(
        &app.router,
        post_json("/v1/licenses/issue", &issue_body(), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["license"]["payload"]["issuer"]["issuer_id"], "u-77");
    assert_eq!(body["license"]["payload"]["issuer"]["issuer_username"], "carol");
}

#[tokio::test]
async fn issue_with_equal_window_is_422() {
    let app = test_app();
    let mut body = issue_body();
    body["valid_until"] = json!("2025-01-01T00:00:00Z");
    let (status, err) = send(&app.router, post_json("/v1/licenses/issue", &body, None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["error"]["code"], "VALIDATION_ERROR");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn issue_with_sub_second_window_explains_truncation() {
    let app = test_app();
    let mut body = issue_body();
    body["valid_from"] = json!("2025-01-01T00:00:00.5Z");
    body["valid_until"] = json!("2025-01-01T00:00:00.9Z");
    let (status, err) = send(&app.router, post_json("/v1/licenses/issue", &body, None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = err["error"]["message"].as_str().unwrap();
    assert!(message.contains("truncated to whole seconds"), "{message}");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn issue_with_unregistered_default_key_is_500() {
    let catalog = Arc::new(InMemoryCatalog::from_yaml_str(CATALOG).unwrap());
    let store = Arc::new(InMemoryLicenseStore::new());
    let signer_config = SignerConfig {
        default_key_id: "rotated-v2".into(),
        ..SignerConfig::default()
    };
    let signer = Signer::new(Arc::new(LocalKeyProvider::from_seed(&[5u8; 32])), signer_config);
    let service = IssuanceService::new(catalog, store.clone(), signer);
    let router = lic_api::app(AppState::new(service, config(None)));
    let (status, err) = send(&router, post_json("/v1/licenses/issue", &issue_body(), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["error"]["code"], "INTERNAL_ERROR");
    assert!(store.is_empty());
}

#[tokio::test]
async fn issue_with_mismatched_edition_is_422() {
    let app = test_app();
    let mut body = issue_body();
    body["edition_id"] = json!("ed-viz-pro");
    let (status, err) = send(&app.router, post_json("/v1/licenses/issue", &body, None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["error"]["message"].as_str().unwrap().contains("ed-viz-pro"));
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn issue_for_unknown_customer_is_404() {
    let app = test_app();
    let mut body = issue_body();
    body["customer_id"] = json!("cust-9999");
    let (status, err) = send(&app.router, post_json("/v1/licenses/issue", &body, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["details"]["entity"], "customer");
    assert_eq!(err["error"]["details"]["id"], "cust-9999");
}

#[tokio::test]
async fn issue_with_bad_license_type_is_400() {
    let app = test_app();
    let mut body = issue_body();
    body["license_type"] = json!("lifetime");
    let (status, err) = send(&app.router, post_json("/v1/licenses/issue", &body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn issue_with_missing_key_is_500_without_leaking_path() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(PemFileKeyProvider::new(dir.path().join("absent.pem")));
    let app = build(provider, None);
    let (status, err) = send(&app.router, post_json("/v1/licenses/issue", &issue_body(), None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err["error"]["code"], "INTERNAL_ERROR");
    assert!(!err["error"]["message"].as_str().unwrap().contains("absent.pem"));
    assert!(app.store.is_empty());
}

// -- Records ------------------------------------------------------------------

#[tokio::test]
async fn get_and_list_records() {
    let app = test_app();
    let (first, _) = issue(&app).await;
    let (second, _) = issue(&app).await;

    let (status, record) = send(&app.router, get(&format!("/v1/licenses/{first}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["license_id"], first.as_str());
    assert_eq!(record["status"], "active");
    assert_eq!(record["notes"], "initial contract");
    assert_eq!(record["meta_key_id"], "main-v1");
    assert_eq!(record["payload_digest"].as_str().unwrap().len(), 64);

    let (status, list) = send(&app.router, get("/v1/licenses", None)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["license_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![second.as_str(), first.as_str()]);
}

#[tokio::test]
async fn list_filters_by_status_and_customer() {
    let app = test_app();
    let (revoked, _) = issue(&app).await;
    let (active, _) = issue(&app).await;
    let (status, _) = send(
        &app.router,
        post_json(&format!("/v1/licenses/{revoked}/revoke"), &json!({}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = send(&app.router, get("/v1/licenses?status=active", None)).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["license_id"], active.as_str());

    let (_, list) = send(&app.router, get("/v1/licenses?customer_id=cust-2002", None)).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_license_is_404() {
    let app = test_app();
    let id = "9b2c1d0e-5f4a-4b3c-8d2e-1f0a9b8c7d6e";
    let (status, err) = send(&app.router, get(&format!("/v1/licenses/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn download_is_byte_identical_to_issued_license() {
    let app = test_app();
    let (license_id, body) = issue(&app).await;

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/v1/licenses/{license_id}/download"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, format!("attachment; filename=\"{license_id}.license\""));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let downloaded: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(downloaded, body["license"]);

    let signed: SignedLicense = serde_json::from_slice(&bytes).unwrap();
    assert!(signed.verify(&app.verifying_key).is_ok());
}

// -- Revocation ---------------------------------------------------------------

#[tokio::test]
async fn revoke_with_note_then_conflict() {
    let app = test_app();
    let (license_id, issued) = issue(&app).await;
    let uri = format!("/v1/licenses/{license_id}/revoke");

    let (status, record) = send(&app.router, post_json(&uri, &json!({"note": "chargeback"}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "revoked");
    assert_eq!(record["notes"], "initial contract\nchargeback");

    let (status, err) = send(&app.router, post_json(&uri, &json!({}), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"]["code"], "CONFLICT");

    // The artifact itself is unchanged by revocation.
    let (status, downloaded) = send(&app.router, get(&format!("/v1/licenses/{license_id}/download"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(downloaded, issued["license"]);
}

#[tokio::test]
async fn revoke_without_body() {
    let app = test_app();
    let (license_id, _) = issue(&app).await;
    let request = Request::builder()
        .method("POST")
        .uri(format!("/v1/licenses/{license_id}/revoke"))
        .body(Body::empty())
        .unwrap();
    let (status, record) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "revoked");
}

#[tokio::test]
async fn revoke_unknown_license_is_404() {
    let app = test_app();
    let uri = "/v1/licenses/9b2c1d0e-5f4a-4b3c-8d2e-1f0a9b8c7d6e/revoke";
    let (status, _) = send(&app.router, post_json(uri, &json!({}), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// -- Templates ----------------------------------------------------------------

#[tokio::test]
async fn issue_from_template() {
    let app = test_app();
    let body = json!({
        "customer_id": "cust-1001",
        "valid_from": "2025-03-01T00:00:00Z",
        "features": {"export": true}
    });
    let (status, resp) = send(&app.router, post_json("/v1/templates/tmpl-trial/issue", &body, None)).await;
    assert_eq!(status, StatusCode::CREATED, "{resp}");
    let payload = &resp["license"]["payload"];
    assert_eq!(payload["license_type"], "trial");
    assert_eq!(payload["validity"]["valid_until"], "2025-03-15T00:00:00Z");
    assert_eq!(payload["features"], json!({"export": true}));
    assert_eq!(payload["edition"]["id"], "ed-enterprise");
}

#[tokio::test]
async fn unknown_template_is_404() {
    let app = test_app();
    let body = json!({"customer_id": "cust-1001", "valid_from": "2025-03-01T00:00:00Z"});
    let (status, err) = send(&app.router, post_json("/v1/templates/tmpl-none/issue", &body, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"]["details"]["entity"], "template");
}

// -- Authorization ------------------------------------------------------------

#[tokio::test]
async fn missing_token_is_401() {
    let app = test_app_with_auth();
    let (status, err) = send(&app.router, get("/v1/licenses", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(err["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn auditor_can_read_but_not_issue() {
    let app = test_app_with_auth();
    let auditor = format!("auditor:u-1:audrey:{SECRET}");

    let (status, _) = send(&app.router, get("/v1/licenses", Some(&auditor))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, err) = send(
        &app.router,
        post_json("/v1/licenses/issue", &issue_body(), Some(&auditor)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"]["code"], "FORBIDDEN");
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn only_admin_can_revoke() {
    let app = test_app_with_auth();
    let issuer = format!("issuer:u-2:ivan:{SECRET}");
    let (status, body) = send(
        &app.router,
        post_json("/v1/licenses/issue", &issue_body(), Some(&issuer)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/v1/licenses/{}/revoke", body["license_id"].as_str().unwrap());

    let (status, _) = send(&app.router, post_json(&uri, &json!({}), Some(&issuer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, record) = send(&app.router, post_json(&uri, &json!({}), Some(SECRET))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["status"], "revoked");
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn openapi_document_served() {
    let app = test_app();
    let (status, doc) = send(&app.router, get("/openapi.json", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/v1/licenses/issue"].is_object());
    assert_eq!(doc["info"]["title"], "License Issuance API");
}

#[tokio::test]
async fn store_is_shared_with_service() {
    let app = test_app();
    let (license_id, _) = issue(&app).await;
    let id = lic_core::LicenseId::parse(&license_id).unwrap();
    assert!(app.store.get(&id).unwrap().is_some());
}
