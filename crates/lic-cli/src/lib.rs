//! # lic-cli: The `licctl` Command-Line Tool
//!
//! ## Subcommands
//!
//! - `licctl keygen`: Generate an Ed25519 keypair as PEM files.
//! - `licctl sign`: Sign a license payload document.
//! - `licctl issue`: Run the full issuance pipeline offline against a
//!   YAML catalog.
//!
//! ```bash
//! licctl keygen --key-id main-v1 --output-dir keys
//! licctl sign --key keys/main-v1-private.pem payload.json --out license.json
//! licctl issue --catalog catalog.yaml --key keys/main-v1-private.pem \
//!     --customer cust-1001 --product prod-data-pipeline --edition ed-enterprise \
//!     --license-type subscription \
//!     --valid-from 2025-01-01T00:00:00Z --valid-until 2026-01-01T00:00:00Z \
//!     --issuer-id 42 --issuer-username alice
//! ```
//!
//! Handlers return `Ok(exit_code)`; operational failures are `Err` and
//! exit with status 1.

pub mod issue;
pub mod keygen;
pub mod sign;

use std::path::Path;

use anyhow::{Context, Result};
use lic_issuance::SignedLicense;

/// Write a signed license as pretty JSON to `out`, or to stdout.
pub(crate) fn emit_license(license: &SignedLicense, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(license).context("failed to serialize license")?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write license: {}", path.display()))?;
            println!("OK: wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
