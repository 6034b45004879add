//! # lic-api: Binary Entry Point
//!
//! Reads configuration from the environment, loads the signing key, and
//! serves the license API.

use anyhow::Context;
use lic_api::state::{AppConfig, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(config = ?config, "starting license API");
    if config.auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set, authentication is disabled");
    }

    let port = config.port;
    let state = AppState::from_config(config)?;

    // A bad key must fail startup rather than the first issuance.
    state
        .warm_signing_key()
        .context("signing key could not be loaded")?;

    let app = lic_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "license API listening");

    axum::serve(listener, app).await?;
    Ok(())
}
