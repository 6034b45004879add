//! # Issue Subcommand
//!
//! Runs the complete issuance pipeline offline: catalog lookup, relationship
//! and window checks, payload construction, signing, and the record write.
//! With `--store-dir` the record lands in a file store; without it the
//! record only lives for the duration of the command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use lic_core::{CustomerId, EditionId, ProductId, Timestamp};
use lic_crypto::PemFileKeyProvider;
use lic_issuance::{
    Attributes, FileLicenseStore, InMemoryCatalog, InMemoryLicenseStore, IssuanceService,
    IssueRequest, IssuedLicense, IssuerIdentity, LicenseStore, LicenseType, Signer, SignerConfig,
};

/// Arguments for `licctl issue`.
#[derive(Args, Debug)]
pub struct IssueArgs {
    /// YAML catalog with customers, products and editions.
    #[arg(long)]
    pub catalog: PathBuf,

    /// PKCS#8 PEM private key.
    #[arg(long)]
    pub key: PathBuf,

    #[arg(long)]
    pub customer: String,

    #[arg(long)]
    pub product: String,

    #[arg(long)]
    pub edition: String,

    /// trial, subscription or perpetual.
    #[arg(long)]
    pub license_type: String,

    /// ISO-8601 start of validity.
    #[arg(long)]
    pub valid_from: String,

    /// ISO-8601 end of validity; must be after `--valid-from`.
    #[arg(long)]
    pub valid_until: String,

    /// Feature flags as a JSON object.
    #[arg(long)]
    pub features: Option<String>,

    /// Usage limits as a JSON object.
    #[arg(long)]
    pub usage_limits: Option<String>,

    /// Deployment constraints as a JSON object.
    #[arg(long)]
    pub deployment: Option<String>,

    /// Internal note stored on the record, never signed.
    #[arg(long)]
    pub note: Option<String>,

    #[arg(long)]
    pub issuer_id: String,

    #[arg(long)]
    pub issuer_username: String,

    /// Persist the record as `<license_id>.json` in this directory.
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Write the signed license here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Execute `licctl issue`.
pub fn run_issue(args: &IssueArgs) -> Result<u8> {
    let issued = issue_license(args)?;
    crate::emit_license(&issued.license, args.out.as_deref())?;
    Ok(0)
}

/// Build the service from the arguments and issue one license.
pub fn issue_license(args: &IssueArgs) -> Result<IssuedLicense> {
    let request = build_request(args)?;

    let catalog = InMemoryCatalog::from_yaml_file(&args.catalog)
        .with_context(|| format!("failed to load catalog: {}", args.catalog.display()))?;
    let store: Arc<dyn LicenseStore> = match &args.store_dir {
        Some(dir) => Arc::new(
            FileLicenseStore::open(dir)
                .with_context(|| format!("failed to open license store: {}", dir.display()))?,
        ),
        None => Arc::new(InMemoryLicenseStore::new()),
    };
    let config = SignerConfig::from_env().context("invalid signer configuration")?;
    let signer = Signer::new(Arc::new(PemFileKeyProvider::new(&args.key)), config);
    let service = IssuanceService::new(Arc::new(catalog), store, signer);

    let issuer = IssuerIdentity::new(args.issuer_id.trim(), args.issuer_username.trim());
    let issued = service
        .issue(&request, &issuer)
        .context("license issuance failed")?;

    if let Some(dir) = &args.store_dir {
        println!(
            "OK: issued license {} (record in {})",
            issued.record.license_id,
            dir.display()
        );
    }
    Ok(issued)
}

/// Parse and check the command-line inputs into an issue request.
pub fn build_request(args: &IssueArgs) -> Result<IssueRequest> {
    let license_type: LicenseType = args
        .license_type
        .parse()
        .context("--license-type must be trial, subscription or perpetual")?;

    Ok(IssueRequest {
        customer_id: CustomerId::new(args.customer.as_str()).context("invalid --customer")?,
        product_id: ProductId::new(args.product.as_str()).context("invalid --product")?,
        edition_id: EditionId::new(args.edition.as_str()).context("invalid --edition")?,
        license_type,
        valid_from: Timestamp::parse_lenient(&args.valid_from).context("invalid --valid-from")?,
        valid_until: Timestamp::parse_lenient(&args.valid_until)
            .context("invalid --valid-until")?,
        features: parse_object("--features", args.features.as_deref())?,
        usage_limits: parse_object("--usage-limits", args.usage_limits.as_deref())?,
        deployment: parse_object("--deployment", args.deployment.as_deref())?,
        note: args.note.clone(),
    })
}

fn parse_object(flag: &str, raw: Option<&str>) -> Result<Option<Attributes>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("{flag} is not valid JSON"))?;
    match value {
        serde_json::Value::Object(map) => Ok(Some(map)),
        other => bail!("{flag} must be a JSON object, got {other}"),
    }
}
