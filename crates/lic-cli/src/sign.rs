//! # Sign Subcommand
//!
//! Signs an existing license payload document. The document must be a
//! complete, valid payload; it is canonicalized and signed as-is, and the
//! output is the `{meta, payload, signature}` object. The key id must be
//! registered and active in the catalog's `keys` section.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use lic_crypto::PemFileKeyProvider;
use lic_issuance::{InMemoryCatalog, LicensePayload, SignedLicense, Signer, SignerConfig};

/// Arguments for `licctl sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// PKCS#8 PEM private key.
    #[arg(long)]
    pub key: PathBuf,

    /// YAML catalog whose `keys` section registers the key id.
    #[arg(long)]
    pub catalog: PathBuf,

    /// Key id recorded in `meta.key_id` (default: `SIGNING_KEY_ID` or `main-v1`).
    #[arg(long)]
    pub key_id: Option<String>,

    /// Format version recorded in `meta.version` (default: `LICENSE_META_VERSION` or 1).
    #[arg(long)]
    pub meta_version: Option<u32>,

    /// Payload JSON document.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Write the signed license here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Execute `licctl sign`.
pub fn run_sign(args: &SignArgs) -> Result<u8> {
    let license = sign_file(args)?;
    crate::emit_license(&license, args.out.as_deref())?;
    Ok(0)
}

/// Sign the payload at `args.file`.
pub fn sign_file(args: &SignArgs) -> Result<SignedLicense> {
    let payload = read_payload(&args.file)?;
    let catalog = InMemoryCatalog::from_yaml_file(&args.catalog)
        .with_context(|| format!("failed to load catalog: {}", args.catalog.display()))?;

    let mut config = SignerConfig::from_env().context("invalid signer configuration")?;
    if let Some(version) = args.meta_version {
        config.meta_version = version;
    }
    if let Some(key_id) = &args.key_id {
        config.default_key_id = key_id.clone();
    }

    let signer = Signer::new(Arc::new(PemFileKeyProvider::new(&args.key)), config);
    let license = signer
        .sign_registered(&catalog, payload, None)
        .with_context(|| format!("failed to sign with {}", args.key.display()))?;

    tracing::info!(
        license_id = %license.payload.license_id(),
        key_id = %license.meta.key_id,
        "payload signed"
    );
    Ok(license)
}

fn read_payload(path: &Path) -> Result<LicensePayload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payload: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("not a valid license payload: {}", path.display()))
}
