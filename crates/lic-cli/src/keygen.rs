//! # Keygen Subcommand
//!
//! Writes `<key_id>-private.pem` (PKCS#8) and `<key_id>-public.pem` (SPKI).
//! The private key file is created with mode 0600 on Unix. Existing files
//! are never overwritten.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use lic_crypto::generate_pem_keypair;

/// Arguments for `licctl keygen`.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Logical key name; also the file name prefix.
    #[arg(long)]
    pub key_id: String,

    /// Directory to write the PEM files into.
    #[arg(long, default_value = "keys")]
    pub output_dir: PathBuf,
}

/// Paths of a freshly written keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPaths {
    pub private: PathBuf,
    pub public: PathBuf,
}

impl KeyPaths {
    pub fn for_key_id(dir: &Path, key_id: &str) -> Self {
        Self {
            private: dir.join(format!("{key_id}-private.pem")),
            public: dir.join(format!("{key_id}-public.pem")),
        }
    }
}

/// Execute `licctl keygen`.
pub fn run_keygen(args: &KeygenArgs) -> Result<u8> {
    let paths = write_keypair(&args.output_dir, &args.key_id)?;
    println!("OK: generated Ed25519 keypair '{}'", args.key_id);
    println!("  Private key: {}", paths.private.display());
    println!("  Public key:  {}", paths.public.display());
    Ok(0)
}

/// Generate a keypair and write it under `dir`.
pub fn write_keypair(dir: &Path, key_id: &str) -> Result<KeyPaths> {
    validate_key_id(key_id)?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;

    let paths = KeyPaths::for_key_id(dir, key_id);
    for path in [&paths.private, &paths.public] {
        if path.exists() {
            bail!("refusing to overwrite existing key file: {}", path.display());
        }
    }

    let pair = generate_pem_keypair().context("failed to generate keypair")?;

    write_new_file(&paths.private, pair.private_pem.as_bytes(), true)?;
    write_new_file(&paths.public, pair.public_pem.as_bytes(), false)?;

    tracing::info!(key_id, path = %paths.private.display(), "keypair written");
    Ok(paths)
}

/// Key ids become file names, so keep them to a safe alphabet.
fn validate_key_id(key_id: &str) -> Result<()> {
    if key_id.is_empty() {
        bail!("key id must not be empty");
    }
    if key_id.starts_with('.') {
        bail!("key id must not start with '.'");
    }
    if let Some(c) = key_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(*c, '-' | '_' | '.')))
    {
        bail!("key id contains unsupported character {c:?}");
    }
    Ok(())
}

fn write_new_file(path: &Path, contents: &[u8], private: bool) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    if private {
        owner_only(&mut options);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn owner_only(options: &mut std::fs::OpenOptions) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o600);
}

#[cfg(not(unix))]
fn owner_only(_options: &mut std::fs::OpenOptions) {}
