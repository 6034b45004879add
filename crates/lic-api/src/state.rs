//! # Application State
//!
//! [`AppConfig`] is read from the environment once at startup. [`AppState`]
//! wraps the issuance service that every handler shares; it is cheap to
//! clone.

use std::path::PathBuf;
use std::sync::Arc;

use lic_crypto::PemFileKeyProvider;
use lic_issuance::{
    check_key_id, Catalog, ConfigError, FileLicenseStore, InMemoryCatalog, InMemoryLicenseStore,
    IssuanceService, LicenseStore, Signer, SignerConfig,
};

/// Service configuration.
///
/// Variables:
/// - `PORT` (default 8080)
/// - `AUTH_TOKEN` (absent disables authentication; must not contain `:`)
/// - `PRIVATE_KEY_PATH` (required; PKCS#8 PEM)
/// - `CATALOG_PATH` (YAML catalog; absent means an empty catalog)
/// - `LICENSE_STORE_DIR` (file store directory; absent means in-memory)
/// - `LOG_FORMAT` (`json` for JSON logs)
/// - `LICENSE_META_VERSION`, `SIGNING_KEY_ID` (see [`SignerConfig`])
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub auth_token: Option<String>,
    pub private_key_path: PathBuf,
    pub catalog_path: Option<PathBuf>,
    pub license_store_dir: Option<PathBuf>,
    pub json_logs: bool,
    pub signer: SignerConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("private_key_path", &self.private_key_path)
            .field("catalog_path", &self.catalog_path)
            .field("license_store_dir", &self.license_store_dir)
            .field("json_logs", &self.json_logs)
            .field("signer", &self.signer)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                var: "PORT",
                reason: format!("{raw:?}: {e}"),
            })?,
            None => 8080,
        };
        let private_key_path =
            non_empty("PRIVATE_KEY_PATH")
                .map(PathBuf::from)
                .ok_or(ConfigError::InvalidEnv {
                    var: "PRIVATE_KEY_PATH",
                    reason: "must be set".into(),
                })?;
        let json_logs = non_empty("LOG_FORMAT")
            .map(|f| f.trim().eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        // The bare `{secret}` bearer form is split on ':' and could never match.
        let auth_token = non_empty("AUTH_TOKEN");
        if auth_token.as_deref().is_some_and(|t| t.contains(':')) {
            return Err(ConfigError::InvalidEnv {
                var: "AUTH_TOKEN",
                reason: "must not contain ':'".into(),
            });
        }

        let signer = SignerConfig::from_lookup(&lookup)?;

        Ok(Self {
            port,
            auth_token,
            private_key_path,
            catalog_path: non_empty("CATALOG_PATH").map(PathBuf::from),
            license_store_dir: non_empty("LICENSE_STORE_DIR").map(PathBuf::from),
            json_logs,
            signer,
        })
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: IssuanceService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(service: IssuanceService, config: AppConfig) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }

    /// Wire catalog, store and key provider from configuration.
    ///
    /// The key file is not read here; see [`AppState::warm_signing_key`].
    /// When a catalog is configured, the default key id must be registered
    /// and active in it.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let catalog: Arc<dyn Catalog> = match &config.catalog_path {
            Some(path) => {
                let catalog = InMemoryCatalog::from_yaml_file(path)
                    .with_context(|| format!("loading catalog {}", path.display()))?;
                check_key_id(&catalog, &config.signer.default_key_id)
                    .context("checking SIGNING_KEY_ID against the catalog key registry")?;
                Arc::new(catalog)
            }
            None => {
                tracing::warn!("CATALOG_PATH not set, serving an empty catalog");
                Arc::new(InMemoryCatalog::default())
            }
        };

        let store: Arc<dyn LicenseStore> = match &config.license_store_dir {
            Some(dir) => Arc::new(
                FileLicenseStore::open(dir)
                    .with_context(|| format!("opening license store {}", dir.display()))?,
            ),
            None => {
                tracing::warn!("LICENSE_STORE_DIR not set, records are kept in memory only");
                Arc::new(InMemoryLicenseStore::new())
            }
        };

        let provider = Arc::new(PemFileKeyProvider::new(config.private_key_path.clone()));
        let signer = Signer::new(provider, config.signer.clone());

        Ok(Self::new(IssuanceService::new(catalog, store, signer), config))
    }

    /// Load the signing key now so that a bad key fails startup instead of
    /// the first issuance.
    pub fn warm_signing_key(&self) -> Result<(), lic_crypto::KeyError> {
        let provider = self.service.signer().provider();
        provider.signing_key()?;
        tracing::info!(provider = provider.provider_name(), "signing key loaded");
        Ok(())
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.service)
            .field("config", &self.config)
            .finish()
    }
}
